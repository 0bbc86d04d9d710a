// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Tenant & Lifecycle Models
//!
//! This module defines the persisted tenant record and the lifecycle payload
//! the host platform posts to the `installed`/`uninstalled` callbacks.
//!
//! ## Model Categories
//!
//! - **Tenant**: one row per installed host instance, keyed by `clientKey`
//! - **Lifecycle payloads**: install/uninstall/enable/disable callback bodies
//! - **Install peek**: the permissive view the handshake middleware reads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

// =============================================================================
// Tenant
// =============================================================================

/// One installed instance of the add-on for one host account.
///
/// `client_key` is unique across all tenants. The record is fully overwritten
/// on every lifecycle callback and only removed by an explicit delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Stable identifier issued by the host platform at install time.
    pub client_key: String,
    /// Callback base address of the host instance.
    pub base_url: String,
    /// Symmetric signing secret; empty until the first successful install.
    #[serde(default)]
    pub shared_secret: String,
    /// Host-specific metadata captured at install time, stored verbatim.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub install_context: Value,
    /// Whether the add-on is currently enabled for this tenant.
    #[serde(default)]
    pub addon_installed: bool,
}

impl Tenant {
    /// Create an enabled tenant with an empty install context.
    pub fn new(
        client_key: impl Into<String>,
        base_url: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_key: client_key.into(),
            base_url: base_url.into(),
            shared_secret: shared_secret.into(),
            install_context: Value::Object(Map::new()),
            addon_installed: true,
        }
    }
}

// =============================================================================
// Lifecycle Payloads
// =============================================================================

/// Lifecycle event named in the callback body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    #[default]
    Installed,
    Uninstalled,
    Enabled,
    Disabled,
}

impl LifecycleEvent {
    /// Whether a tenant is considered installed after this event.
    pub fn leaves_installed(self) -> bool {
        !matches!(self, LifecycleEvent::Uninstalled | LifecycleEvent::Disabled)
    }
}

/// Body of an install/uninstall/enable/disable callback.
///
/// Unknown fields are kept in `extra` so the full host payload can be stored
/// as the tenant's install context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePayload {
    /// Add-on key the host believes it is talking to.
    #[serde(default)]
    pub key: Option<String>,
    pub client_key: String,
    pub base_url: String,
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: LifecycleEvent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LifecyclePayload {
    /// Build the full tenant record for this callback.
    ///
    /// The shared secret never lands in the install context. When the
    /// payload carries no secret (uninstall callbacks) `previous_secret` is
    /// kept.
    pub fn into_tenant(self, previous_secret: Option<String>) -> Tenant {
        let addon_installed = self.event_type.leaves_installed();
        let shared_secret = self
            .shared_secret
            .filter(|s| !s.is_empty())
            .or(previous_secret)
            .unwrap_or_default();

        let mut context = self.extra;
        if let Some(key) = self.key {
            context.insert("key".to_string(), Value::String(key));
        }
        if let Some(product_type) = self.product_type {
            context.insert("productType".to_string(), Value::String(product_type));
        }
        if let Some(description) = self.description {
            context.insert("description".to_string(), Value::String(description));
        }
        context.remove("sharedSecret");

        Tenant {
            client_key: self.client_key,
            base_url: self.base_url,
            shared_secret,
            install_context: Value::Object(context),
            addon_installed,
        }
    }
}

/// Permissive view over an install body, read before authentication.
///
/// Every field is optional: the handshake middleware decides what a missing
/// field means.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPeek {
    #[serde(default)]
    pub base_url: Option<Value>,
    #[serde(default)]
    pub client_key: Option<Value>,
}

impl InstallPeek {
    /// The body's `baseUrl` as a non-empty string, if it is one.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_ref()
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// The body's `clientKey` as a non-empty string, if it is one.
    pub fn client_key(&self) -> Option<&str> {
        self.client_key
            .as_ref()
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn install_payload_becomes_tenant_without_secret_in_context() {
        let payload: LifecyclePayload = serde_json::from_value(json!({
            "key": "my-addon",
            "clientKey": "tenantB",
            "baseUrl": "https://host.example",
            "sharedSecret": "s3cret",
            "productType": "jira",
            "eventType": "installed",
            "serverVersion": "100"
        }))
        .unwrap();

        let tenant = payload.into_tenant(None);
        assert_eq!(tenant.client_key, "tenantB");
        assert_eq!(tenant.base_url, "https://host.example");
        assert_eq!(tenant.shared_secret, "s3cret");
        assert!(tenant.addon_installed);
        assert_eq!(tenant.install_context["productType"], "jira");
        assert_eq!(tenant.install_context["serverVersion"], "100");
        assert!(tenant.install_context.get("sharedSecret").is_none());
    }

    #[test]
    fn uninstall_keeps_previous_secret() {
        let payload: LifecyclePayload = serde_json::from_value(json!({
            "clientKey": "tenantB",
            "baseUrl": "https://host.example",
            "eventType": "uninstalled"
        }))
        .unwrap();

        let tenant = payload.into_tenant(Some("old".to_string()));
        assert_eq!(tenant.shared_secret, "old");
        assert!(!tenant.addon_installed);
    }

    #[test]
    fn install_peek_tolerates_missing_fields() {
        let peek: InstallPeek = serde_json::from_str(r#"{"baseUrl":"https://h"}"#).unwrap();
        assert!(peek.base_url.is_some());
        assert!(peek.client_key().is_none());
    }

    #[test]
    fn tenant_serializes_with_camel_case_keys() {
        let tenant = Tenant::new("k", "https://h", "s");
        let value = serde_json::to_value(&tenant).unwrap();
        assert_eq!(value["clientKey"], "k");
        assert_eq!(value["baseUrl"], "https://h");
        assert_eq!(value["addonInstalled"], true);
    }
}
