// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token codec: two-phase decoding of host-signed JWTs.
//!
//! 1. [`decode_unverified`] reads the header and claims without checking the
//!    signature. Its output only decides *which* tenant and key to use.
//! 2. [`verify`] re-parses the token against the selected
//!    [`VerificationKey`] and checks signature, `exp`/`nbf` and (for
//!    installation keys) the audience.
//!
//! Only HS256 and RS256 are accepted. Everything else, `none` included, fails
//! with [`AuthError::UnsupportedAlgorithm`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Deserialize};

use super::claims::HostClaims;
use super::AuthError;

/// Clock skew tolerance. Expired tokens are rejected immediately.
pub const CLOCK_SKEW_LEEWAY: u64 = 0;

/// JOSE header fields the codec routes on.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
}

impl TokenHeader {
    /// Map the declared algorithm onto the allow-list.
    pub fn algorithm(&self) -> Result<Algorithm, AuthError> {
        match self.alg.as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "RS256" => Ok(Algorithm::RS256),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn is_asymmetric(&self) -> bool {
        self.alg == "RS256"
    }

    /// Non-empty key id, if any.
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// Header and claims read without signature verification.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: TokenHeader,
    pub claims: HostClaims,
}

/// Key material selected for the verified decode.
#[derive(Clone)]
pub enum VerificationKey {
    /// Tenant shared secret (HS256)
    Symmetric(String),
    /// PEM-encoded installation public key (RS256)
    Asymmetric(String),
}

impl VerificationKey {
    fn algorithm(&self) -> Algorithm {
        match self {
            VerificationKey::Symmetric(_) => Algorithm::HS256,
            VerificationKey::Asymmetric(_) => Algorithm::RS256,
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self {
            VerificationKey::Symmetric(secret) => Ok(DecodingKey::from_secret(secret.as_bytes())),
            VerificationKey::Asymmetric(pem) => DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AuthError::Internal(format!("installation key is not a valid RSA PEM: {e}"))),
        }
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        match self {
            VerificationKey::Symmetric(_) => write!(f, "Symmetric(..)"),
            VerificationKey::Asymmetric(_) => write!(f, "Asymmetric(..)"),
        }
    }
}

/// Decode a base64url JWT segment into a JSON value of type `T`.
fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

/// Phase one: read header and claims without checking the signature.
///
/// The result must never be used for an authorization decision.
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(claims), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken);
    };

    Ok(UnverifiedToken {
        header: decode_segment(header)?,
        claims: decode_segment(claims)?,
    })
}

/// Phase two: verify signature and time claims with the selected key.
///
/// When `expected_audience` is set, the verified `aud` claim must contain it.
pub fn verify(
    token: &str,
    key: &VerificationKey,
    expected_audience: Option<&str>,
) -> Result<HostClaims, AuthError> {
    let header = decode_unverified(token)?.header;
    let declared = header.algorithm()?;
    if declared != key.algorithm() {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let mut validation = Validation::new(declared);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data =
        decode::<HostClaims>(token, &key.decoding_key()?, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm(header.alg.clone())
            }
            _ => AuthError::MalformedToken,
        })?;

    let claims = token_data.claims;
    if let Some(expected) = expected_audience {
        let matches = claims.aud.as_ref().is_some_and(|aud| aud.contains(expected));
        if !matches {
            return Err(AuthError::AudienceMismatch);
        }
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{
        hs256_token, none_token, now, rs256_token, INSTALL_PUBLIC_PEM, OTHER_PUBLIC_PEM,
    };
    use serde_json::json;

    #[test]
    fn unverified_decode_reads_header_and_claims() {
        let token = hs256_token(&json!({"iss": "tenantA", "qsh": "abc"}), "secret");
        let unverified = decode_unverified(&token).unwrap();
        assert_eq!(unverified.header.alg, "HS256");
        assert_eq!(unverified.claims.issuer(), Some("tenantA"));
        assert_eq!(unverified.claims.query_hash(), Some("abc"));
    }

    #[test]
    fn unverified_decode_rejects_garbage() {
        for garbage in ["not-a-jwt", "a.b.c", "a.b.c.d", ""] {
            assert_eq!(
                decode_unverified(garbage).unwrap_err(),
                AuthError::MalformedToken,
                "{garbage}"
            );
        }
    }

    #[test]
    fn symmetric_token_verifies_with_its_secret() {
        let token = hs256_token(&json!({"iss": "tenantA", "exp": now() + 300}), "secret");
        let claims = verify(&token, &VerificationKey::Symmetric("secret".into()), None).unwrap();
        assert_eq!(claims.issuer(), Some("tenantA"));
    }

    #[test]
    fn wrong_secret_is_signature_invalid() {
        let token = hs256_token(&json!({"iss": "tenantA", "exp": now() + 300}), "tenantB-secret");
        let result = verify(&token, &VerificationKey::Symmetric("tenantA-secret".into()), None);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let token = hs256_token(&json!({"iss": "tenantA", "exp": now() - 3600}), "secret");
        let result = verify(&token, &VerificationKey::Symmetric("secret".into()), None);
        assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn recently_expired_token_is_rejected() {
        let token = hs256_token(&json!({"iss": "tenantA", "exp": now() - 30}), "secret");
        let result = verify(&token, &VerificationKey::Symmetric("secret".into()), None);
        assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn not_yet_valid_token_is_rejected() {
        let token = hs256_token(&json!({"iss": "tenantA", "nbf": now() + 3600}), "secret");
        let result = verify(&token, &VerificationKey::Symmetric("secret".into()), None);
        assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn alg_none_is_unsupported() {
        let token = none_token(&json!({"iss": "tenantA"}));
        let result = verify(&token, &VerificationKey::Symmetric("secret".into()), None);
        assert_eq!(
            result.unwrap_err(),
            AuthError::UnsupportedAlgorithm("none".to_string())
        );
    }

    #[test]
    fn algorithm_must_match_key_family() {
        let token = hs256_token(&json!({"iss": "tenantA"}), "secret");
        let result = verify(&token, &VerificationKey::Asymmetric(INSTALL_PUBLIC_PEM.into()), None);
        assert!(matches!(result, Err(AuthError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn asymmetric_token_checks_audience() {
        let token = rs256_token(
            &json!({"iss": "tenantB", "aud": "https://addon.example", "exp": now() + 300}),
            "k1",
        );
        let key = VerificationKey::Asymmetric(INSTALL_PUBLIC_PEM.into());

        let claims = verify(&token, &key, Some("https://addon.example")).unwrap();
        assert_eq!(claims.issuer(), Some("tenantB"));

        let result = verify(&token, &key, Some("https://someone-else.example"));
        assert_eq!(result.unwrap_err(), AuthError::AudienceMismatch);
    }

    #[test]
    fn asymmetric_token_with_other_key_is_signature_invalid() {
        let token = rs256_token(&json!({"iss": "tenantB", "exp": now() + 300}), "k1");
        let key = VerificationKey::Asymmetric(OTHER_PUBLIC_PEM.into());
        assert_eq!(verify(&token, &key, None).unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn debug_output_hides_secret() {
        let key = VerificationKey::Symmetric("super-secret".into());
        assert!(!format!("{key:?}").contains("super-secret"));
    }
}
