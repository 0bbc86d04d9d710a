// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for steady-state tenant requests.
//!
//! ## Flow
//!
//! 1. Extract the token (query `jwt`, form `jwt`, `Authorization: JWT ...`)
//! 2. Decode unverified, read `iss` as the candidate client key
//! 3. Require a `qsh` claim unless the route is token-only
//! 4. Load the tenant (a lookup failure is a server error)
//! 5. Require a non-empty shared secret
//! 6. Verify the signature: HS256 with the shared secret, or RS256 through the
//!    legacy installation-key branch
//! 7. Check `exp`/`nbf`
//! 8. Check the QSH against the original request URI
//! 9. Mint a session token, attach [`VerifiedIdentity`] and forward
//!
//! The session token is returned to the caller in the `X-acpt` header.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/resource", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::{HostClaims, VerifiedIdentity};
use super::extractor::{extract_token, original_uri};
use super::session::{issue_session_token, SESSION_TOKEN_HEADER};
use super::token::{decode_unverified, verify, UnverifiedToken, VerificationKey};
use super::AuthError;
use crate::state::AppState;

/// Whether a route enforces the `qsh` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QshPolicy {
    /// Token must carry a `qsh` that matches the request
    Required,
    /// Token-only route, `qsh` is not checked
    Skip,
}

/// Authentication middleware requiring a matching query string hash.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    authenticate_with(state, QshPolicy::Required, request, next).await
}

/// Authentication middleware for token-only routes (no QSH enforcement).
pub async fn authenticate_token_only(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    authenticate_with(state, QshPolicy::Skip, request, next).await
}

async fn authenticate_with(
    state: AppState,
    policy: QshPolicy,
    request: Request,
    next: Next,
) -> Response {
    let (request, session_token) = match authenticate_request(&state, policy, request).await {
        Ok(authenticated) => authenticated,
        Err(e) => return e.into_response(),
    };

    let mut response = next.run(request).await;
    match HeaderValue::from_str(&session_token) {
        Ok(value) => {
            response.headers_mut().insert(SESSION_TOKEN_HEADER, value);
        }
        Err(e) => tracing::error!(error = %e, "Session token is not a valid header value"),
    }
    response
}

/// Run the authentication state machine.
///
/// Returns the request (identity attached) and the minted session token.
async fn authenticate_request(
    state: &AppState,
    policy: QshPolicy,
    request: Request,
) -> Result<(Request, String), AuthError> {
    let (token, mut request) = extract_token(request).await?;

    let unverified = decode_unverified(&token)?;
    let client_key = unverified
        .claims
        .issuer()
        .ok_or(AuthError::MissingIssuer)?
        .to_string();

    if policy == QshPolicy::Required && unverified.claims.query_hash().is_none() {
        return Err(AuthError::MissingQsh);
    }

    let tenant = state.tenants.get(&client_key).map_err(|e| {
        tracing::error!(client_key = %client_key, error = %e, "Tenant lookup failed");
        AuthError::TenantLookupFailed(e.to_string())
    })?;

    if tenant.shared_secret.is_empty() {
        return Err(AuthError::NoSharedSecret);
    }

    let verified = match unverified.header.algorithm()? {
        jsonwebtoken::Algorithm::RS256 => legacy_install_key(state, &token, &unverified).await?,
        _ => verify(
            &token,
            &VerificationKey::Symmetric(tenant.shared_secret.clone()),
            None,
        )?,
    };

    if policy == QshPolicy::Required {
        let uri = original_uri(request.extensions(), request.uri());
        let claim = verified.query_hash().ok_or(AuthError::MissingQsh)?;
        if !state.qsh.matches(claim, request.method(), &uri) {
            tracing::debug!(
                client_key = %client_key,
                expected = %state.qsh.hash(request.method(), &uri, false),
                "QSH mismatch"
            );
            return Err(AuthError::QshMismatch);
        }
    }

    let session_token = issue_session_token(&state.config.addon_key, &verified, &tenant)?;

    tracing::debug!(client_key = %tenant.client_key, "Request authenticated");
    request.extensions_mut().insert(VerifiedIdentity {
        client_key: tenant.client_key,
        host_base_url: tenant.base_url,
        account_id: verified.subject().map(str::to_string),
        session_token: session_token.clone(),
        install_context: tenant.install_context,
    });

    Ok((request, session_token))
}

/// Legacy re-installation edge case: an RS256 token on a steady-state route.
///
/// The key is resolved by `kid` like an install callback and the audience must
/// be the add-on's own base URL.
async fn legacy_install_key(
    state: &AppState,
    token: &str,
    unverified: &UnverifiedToken,
) -> Result<HostClaims, AuthError> {
    let kid = unverified
        .header
        .key_id()
        .ok_or_else(|| AuthError::KeyUnavailable(String::new()))?;

    tracing::warn!(
        kid = %kid,
        client_key = unverified.claims.issuer().unwrap_or_default(),
        "RS256 token on a steady-state route, verifying with installation key"
    );

    let pem = state.keys.resolve(kid).await?;
    verify(
        token,
        &VerificationKey::Asymmetric(pem),
        Some(&state.config.base_url),
    )
}
