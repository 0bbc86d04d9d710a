// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};

/// Authentication and installation handshake failure.
///
/// Every variant is terminal to the current request. Caller-side failures
/// map to 401, data-layer and signing failures map to 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token in query, form body, or `Authorization: JWT` header
    MissingToken,
    /// Token present in both query string and form body
    AmbiguousToken,
    /// Token could not be decoded at all
    MalformedToken,
    /// Token has no `iss` claim
    MissingIssuer,
    /// Token has no `qsh` claim and the route requires one
    MissingQsh,
    /// Tenant record for the issuer could not be loaded
    TenantLookupFailed(String),
    /// Tenant exists but has no shared secret yet
    NoSharedSecret,
    /// Declared algorithm is neither HS256 nor RS256
    UnsupportedAlgorithm(String),
    /// Token signature does not verify against the key material
    SignatureInvalid,
    /// Token is expired or not yet valid
    TokenExpired,
    /// Token audience is not this add-on
    AudienceMismatch,
    /// Query string hash does not match the request
    QshMismatch,
    /// Verified issuer differs from the `clientKey` in the install body
    ClientKeyMismatch,
    /// Installation public key could not be fetched nor found in the fallback cache
    KeyUnavailable(String),
    /// Install request without a body
    MissingRegistration,
    /// Install body is not a JSON document
    InvalidRegistration,
    /// Install body has no `baseUrl`
    MissingBaseUrl,
    /// Session token could not be signed
    SessionIssueFailed(String),
    /// Anything else that is our fault
    Internal(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::AmbiguousToken => "ambiguous_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::MissingIssuer => "missing_issuer",
            AuthError::MissingQsh => "missing_qsh",
            AuthError::TenantLookupFailed(_) => "tenant_lookup_failed",
            AuthError::NoSharedSecret => "no_shared_secret",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::QshMismatch => "qsh_mismatch",
            AuthError::ClientKeyMismatch => "client_key_mismatch",
            AuthError::KeyUnavailable(_) => "key_unavailable",
            AuthError::MissingRegistration => "missing_registration",
            AuthError::InvalidRegistration => "invalid_registration",
            AuthError::MissingBaseUrl => "missing_base_url",
            AuthError::SessionIssueFailed(_) => "session_issue_failed",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::TenantLookupFailed(_)
            | AuthError::SessionIssueFailed(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Could not find auth data on request"),
            AuthError::AmbiguousToken => {
                write!(f, "JWT found in both query string and request body")
            }
            AuthError::MalformedToken => write!(f, "JWT could not be decoded"),
            AuthError::MissingIssuer => {
                write!(f, "JWT claim did not contain the issuer (iss) claim")
            }
            AuthError::MissingQsh => {
                write!(f, "JWT claim did not contain the query string hash (qsh) claim")
            }
            AuthError::TenantLookupFailed(_) => {
                write!(f, "Could not lookup stored client data for clientKey")
            }
            AuthError::NoSharedSecret => {
                write!(f, "Could not find JWT sharedSecret in stored client data")
            }
            AuthError::UnsupportedAlgorithm(alg) => {
                write!(f, "Unexpected JWT signing algorithm: {alg}")
            }
            AuthError::SignatureInvalid => write!(f, "Could not verify JWT signature"),
            AuthError::TokenExpired => write!(f, "Authentication request has expired"),
            AuthError::AudienceMismatch => {
                write!(f, "JWT claim did not contain the correct audience (aud) claim")
            }
            AuthError::QshMismatch => write!(f, "Auth failure: Query hash mismatch"),
            AuthError::ClientKeyMismatch => {
                write!(f, "clientKey in install payload did not match authenticated client")
            }
            AuthError::KeyUnavailable(kid) => {
                write!(f, "Could not retrieve public key {kid} from key service or fallback cache")
            }
            AuthError::MissingRegistration => write!(f, "No registration info provided"),
            AuthError::InvalidRegistration => write!(f, "Registration info is not valid JSON"),
            AuthError::MissingBaseUrl => write!(f, "No baseUrl provided for registration info"),
            AuthError::SessionIssueFailed(msg) => {
                write!(f, "Could not create new access token: {msg}")
            }
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        match &self {
            AuthError::TenantLookupFailed(detail)
            | AuthError::SessionIssueFailed(detail)
            | AuthError::Internal(detail) => {
                tracing::error!(error_code = code, status = %status, detail = %detail, "{self}");
            }
            _ => tracing::warn!(error_code = code, status = %status, "{self}"),
        }

        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
