// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ADDON_BASE_URL` | Add-on's own base URL (audience + QSH context path) | Required |
//! | `ADDON_KEY` | Add-on identity key, issuer of session tokens | Required |
//! | `ADDON_SIGNED_INSTALL` | Require RS256-signed install callbacks | `false` |
//! | `INSTALL_KEYS_URL` | Installation key-distribution endpoint | `https://connect-install-keys.atlassian.com` |
//! | `KEY_CACHE_TTL_SECS` | Fallback key freshness window | `14400` |
//! | `KEY_CACHE_SWEEP_SECS` | Fallback key sweep interval | `3600` |
//! | `TENANT_DB_PATH` | redb file for tenant records (in-memory if unset) | unset |
//! | `ROUTE_PREFIX` | Path prefix for the lifecycle routes | `/` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::keys::{DEFAULT_FALLBACK_TTL, DEFAULT_INSTALL_KEYS_URL, DEFAULT_SWEEP_INTERVAL};

pub const ADDON_BASE_URL_ENV: &str = "ADDON_BASE_URL";
pub const ADDON_KEY_ENV: &str = "ADDON_KEY";
pub const ADDON_SIGNED_INSTALL_ENV: &str = "ADDON_SIGNED_INSTALL";
pub const INSTALL_KEYS_URL_ENV: &str = "INSTALL_KEYS_URL";
pub const KEY_CACHE_TTL_ENV: &str = "KEY_CACHE_TTL_SECS";
pub const KEY_CACHE_SWEEP_ENV: &str = "KEY_CACHE_SWEEP_SECS";

/// Environment variable name for the tenant database path.
///
/// When unset, tenants live in process memory and are lost on restart.
pub const TENANT_DB_PATH_ENV: &str = "TENANT_DB_PATH";
pub const ROUTE_PREFIX_ENV: &str = "ROUTE_PREFIX";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Add-on identity and authentication settings.
#[derive(Debug, Clone)]
pub struct AddonConfig {
    /// Add-on's own base URL, expected as `aud` of signed installs
    pub base_url: String,
    /// Add-on identity key, `iss` of minted session tokens
    pub addon_key: String,
    /// Whether install callbacks must be RS256-signed
    pub signed_install: bool,
    /// Key-distribution endpoint base
    pub install_keys_url: String,
    /// Fallback key freshness window
    pub key_cache_ttl: Duration,
    /// Fallback key sweep interval
    pub key_cache_sweep: Duration,
    /// Tenant database file, in-memory store when `None`
    pub tenant_db_path: Option<PathBuf>,
    /// Path prefix the lifecycle routes are mounted under
    pub route_prefix: String,
}

impl AddonConfig {
    /// Configuration with defaults for everything but identity.
    pub fn new(base_url: impl Into<String>, addon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            addon_key: addon_key.into(),
            signed_install: false,
            install_keys_url: DEFAULT_INSTALL_KEYS_URL.to_string(),
            key_cache_ttl: DEFAULT_FALLBACK_TTL,
            key_cache_sweep: DEFAULT_SWEEP_INTERVAL,
            tenant_db_path: None,
            route_prefix: "/".to_string(),
        }
    }

    pub fn with_signed_install(mut self, signed_install: bool) -> Self {
        self.signed_install = signed_install;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let seconds = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::Invalid { name, value }),
                None => Ok(default),
            }
        };

        let base_url = required(ADDON_BASE_URL_ENV)?;
        if url::Url::parse(&base_url).is_err() {
            return Err(ConfigError::Invalid {
                name: ADDON_BASE_URL_ENV,
                value: base_url,
            });
        }

        let signed_install = match lookup(ADDON_SIGNED_INSTALL_ENV) {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: ADDON_SIGNED_INSTALL_ENV,
                value,
            })?,
            None => false,
        };

        Ok(Self {
            base_url,
            addon_key: required(ADDON_KEY_ENV)?,
            signed_install,
            install_keys_url: lookup(INSTALL_KEYS_URL_ENV)
                .unwrap_or_else(|| DEFAULT_INSTALL_KEYS_URL.to_string()),
            key_cache_ttl: seconds(KEY_CACHE_TTL_ENV, DEFAULT_FALLBACK_TTL)?,
            key_cache_sweep: seconds(KEY_CACHE_SWEEP_ENV, DEFAULT_SWEEP_INTERVAL)?,
            tenant_db_path: lookup(TENANT_DB_PATH_ENV).map(PathBuf::from),
            route_prefix: lookup(ROUTE_PREFIX_ENV).unwrap_or_else(|| "/".to_string()),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_identity_is_set() {
        let config = AddonConfig::from_lookup(lookup(&[
            (ADDON_BASE_URL_ENV, "https://addon.example"),
            (ADDON_KEY_ENV, "com.example.addon"),
        ]))
        .unwrap();

        assert!(!config.signed_install);
        assert_eq!(config.install_keys_url, DEFAULT_INSTALL_KEYS_URL);
        assert_eq!(config.key_cache_ttl, Duration::from_secs(4 * 60 * 60));
        assert_eq!(config.key_cache_sweep, Duration::from_secs(60 * 60));
        assert!(config.tenant_db_path.is_none());
        assert_eq!(config.route_prefix, "/");
    }

    #[test]
    fn missing_identity_is_an_error() {
        let result = AddonConfig::from_lookup(lookup(&[(ADDON_BASE_URL_ENV, "https://a")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing(ADDON_KEY_ENV));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = AddonConfig::from_lookup(lookup(&[
            (ADDON_BASE_URL_ENV, "https://addon.example"),
            (ADDON_KEY_ENV, "k"),
            (ADDON_SIGNED_INSTALL_ENV, "maybe"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let result = AddonConfig::from_lookup(lookup(&[
            (ADDON_BASE_URL_ENV, "not a url"),
            (ADDON_KEY_ENV, "k"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn signed_install_and_cache_windows_parse() {
        let config = AddonConfig::from_lookup(lookup(&[
            (ADDON_BASE_URL_ENV, "https://addon.example"),
            (ADDON_KEY_ENV, "k"),
            (ADDON_SIGNED_INSTALL_ENV, "true"),
            (KEY_CACHE_TTL_ENV, "60"),
            (KEY_CACHE_SWEEP_ENV, "10"),
        ]))
        .unwrap();
        assert!(config.signed_install);
        assert_eq!(config.key_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.key_cache_sweep, Duration::from_secs(10));
    }
}
