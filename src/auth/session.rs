// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuance.
//!
//! After a successful steady-state authentication the add-on mints a new
//! HS256 token for the tenant: `iss` is the add-on key, `aud` the tenant's
//! client key, `sub` the host account carried over from the verified claims.
//! The token is returned in the `X-acpt` response header and never stored.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use super::claims::{HostClaims, SessionClaims};
use super::AuthError;
use crate::models::Tenant;

/// Response header carrying the freshly minted session token.
pub const SESSION_TOKEN_HEADER: &str = "x-acpt";

/// Mint a session token for `tenant`, signed with its shared secret.
pub fn issue_session_token(
    addon_key: &str,
    verified: &HostClaims,
    tenant: &Tenant,
) -> Result<String, AuthError> {
    if tenant.shared_secret.is_empty() {
        return Err(AuthError::SessionIssueFailed(
            "tenant has no shared secret".to_string(),
        ));
    }

    let claims = SessionClaims {
        iss: addon_key.to_string(),
        aud: tenant.client_key.clone(),
        sub: verified.subject().map(str::to_string),
        iat: chrono::Utc::now().timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(tenant.shared_secret.as_bytes()),
    )
    .map_err(|e| AuthError::SessionIssueFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn verified_claims(sub: Option<&str>) -> HostClaims {
        HostClaims {
            iss: Some("tenantA".to_string()),
            sub: sub.map(str::to_string),
            ..Default::default()
        }
    }

    fn decode_session(token: &str, secret: &str, audience: &str) -> SessionClaims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.set_audience(&[audience]);
        decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn session_token_is_scoped_to_tenant() {
        let tenant = Tenant::new("tenantA", "https://a.example", "secret-a");
        let token =
            issue_session_token("com.example.addon", &verified_claims(Some("acct-1")), &tenant)
                .unwrap();

        let claims = decode_session(&token, "secret-a", "tenantA");
        assert_eq!(claims.iss, "com.example.addon");
        assert_eq!(claims.aud, "tenantA");
        assert_eq!(claims.sub.as_deref(), Some("acct-1"));
    }

    #[test]
    fn subject_is_optional() {
        let tenant = Tenant::new("tenantA", "https://a.example", "secret-a");
        let token = issue_session_token("addon", &verified_claims(None), &tenant).unwrap();
        assert!(decode_session(&token, "secret-a", "tenantA").sub.is_none());
    }

    #[test]
    fn empty_secret_fails_to_issue() {
        let tenant = Tenant::new("tenantA", "https://a.example", "");
        let result = issue_session_token("addon", &verified_claims(None), &tenant);
        assert!(matches!(result, Err(AuthError::SessionIssueFailed(_))));
    }
}
