// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the verified identity attached to a request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// `aud` claim: hosts send either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims carried by a host-signed JWT.
///
/// The same shape is read twice: once unverified (routing only) and once
/// after signature verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostClaims {
    /// Issuer: the tenant's client key
    #[serde(default)]
    pub iss: Option<String>,

    /// Subject: host-side account identifier
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: Option<i64>,

    /// Not before timestamp
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: Option<i64>,

    /// Query string hash binding the token to one request
    #[serde(default)]
    pub qsh: Option<String>,

    /// Host-specific context claim, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl HostClaims {
    /// Non-empty issuer, if any.
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref().filter(|iss| !iss.is_empty())
    }

    /// Non-empty query string hash, if any.
    pub fn query_hash(&self) -> Option<&str> {
        self.qsh.as_deref().filter(|qsh| !qsh.is_empty())
    }

    /// Non-empty subject, if any.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|sub| !sub.is_empty())
    }
}

/// Claims of a session token minted for downstream use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The add-on's own identity key
    pub iss: String,
    /// The tenant's client key
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iat: i64,
}

/// Identity of a tenant request that passed authentication.
///
/// Inserted into the request extensions by the authentication middleware and
/// read back through the [`Verified`](super::Verified) extractor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    /// Tenant client key (verified `iss`)
    pub client_key: String,

    /// Tenant's host base URL from the tenant store
    pub host_base_url: String,

    /// Host account identifier (verified `sub`), when the host sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Freshly minted session token, also returned in `X-acpt`
    pub session_token: String,

    /// Install context stored for the tenant
    #[schema(value_type = Object)]
    pub install_context: Value,
}

/// Issuer of an RS256-signed install callback that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallIssuer(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_accepts_string_or_list() {
        let one: Audience = serde_json::from_str(r#""https://addon.example""#).unwrap();
        assert!(one.contains("https://addon.example"));

        let many: Audience =
            serde_json::from_str(r#"["https://other", "https://addon.example"]"#).unwrap();
        assert!(many.contains("https://addon.example"));
        assert!(!many.contains("https://nope"));
    }

    #[test]
    fn empty_issuer_and_qsh_are_treated_as_missing() {
        let claims: HostClaims = serde_json::from_str(r#"{"iss":"","qsh":""}"#).unwrap();
        assert!(claims.issuer().is_none());
        assert!(claims.query_hash().is_none());
    }
}
