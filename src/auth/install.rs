// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Installation handshake middleware.
//!
//! Install callbacks arrive unsigned, HMAC-signed or RSA-signed depending on
//! the host version and whether this is a re-installation. The body is
//! buffered once, peeked as an [`InstallPeek`] and handed to the wrapped
//! handler byte-for-byte.
//!
//! ## Paths
//!
//! | Body / token | Outcome |
//! |--------------|---------|
//! | no body | `MissingRegistration` |
//! | no `baseUrl` | `MissingBaseUrl` |
//! | no `clientKey` | forwarded unauthenticated |
//! | signed installs required, RS256 token | installation key verification |
//! | anything else | forwarded |
//!
//! An RS256 install attaches [`InstallIssuer`] to the request. When signed
//! installs are required but the callback was not RSA-signed, the response
//! carries `x-unexpected-symmetric-hook: true`.
//!
//! The wrapped handler persists the tenant; this middleware writes nothing.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::InstallIssuer;
use super::extractor::{find_token, original_uri, MAX_BUFFERED_BODY};
use super::token::{decode_unverified, verify, UnverifiedToken, VerificationKey};
use super::AuthError;
use crate::models::InstallPeek;
use crate::state::AppState;

/// Response header flagging an unsigned/HMAC install while signed installs
/// are required.
pub const UNEXPECTED_SYMMETRIC_HOOK_HEADER: &str = "x-unexpected-symmetric-hook";

/// Installation handshake middleware for the `installed` callback.
pub async fn verify_installation(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read install body");
            return AuthError::InvalidRegistration.into_response();
        }
    };

    let outcome = handshake(&state, parts, &bytes).await;
    match outcome {
        Ok((parts, unexpected_symmetric)) => {
            let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
            if unexpected_symmetric {
                response.headers_mut().insert(
                    UNEXPECTED_SYMMETRIC_HOOK_HEADER,
                    HeaderValue::from_static("true"),
                );
            }
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Decide the install path. Returns the request parts to forward and whether
/// the callback was unexpectedly not RSA-signed.
async fn handshake(
    state: &AppState,
    mut parts: Parts,
    body: &Bytes,
) -> Result<(Parts, bool), AuthError> {
    if body.is_empty() {
        return Err(AuthError::MissingRegistration);
    }

    let peek: InstallPeek =
        serde_json::from_slice(body).map_err(|_| AuthError::InvalidRegistration)?;
    if peek.base_url().is_none() {
        return Err(AuthError::MissingBaseUrl);
    }
    let Some(client_key) = peek.client_key() else {
        tracing::warn!(
            base_url = peek.base_url().unwrap_or_default(),
            "Install callback without clientKey, forwarding unauthenticated"
        );
        return Ok((parts, false));
    };

    if !state.config.signed_install {
        return Ok((parts, false));
    }

    let asymmetric = find_token(&parts, body)
        .ok()
        .and_then(|token| decode_unverified(&token).ok().map(|decoded| (token, decoded)))
        .filter(|(_, decoded)| decoded.header.is_asymmetric());

    match asymmetric {
        Some((token, unverified)) => {
            let issuer = verify_signed_install(state, &parts, &token, &unverified, client_key).await?;
            tracing::info!(client_key = %issuer.0, "Signed install verified");
            parts.extensions.insert(issuer);
            Ok((parts, false))
        }
        None => {
            tracing::warn!(
                client_key = %client_key,
                "Signed installs required but callback is not RSA-signed"
            );
            Ok((parts, true))
        }
    }
}

/// Asymmetric sub-path: installation key, audience, QSH, then issuer must
/// equal the body's `clientKey`.
async fn verify_signed_install(
    state: &AppState,
    parts: &Parts,
    token: &str,
    unverified: &UnverifiedToken,
    body_client_key: &str,
) -> Result<InstallIssuer, AuthError> {
    if unverified.claims.issuer().is_none() {
        return Err(AuthError::MissingIssuer);
    }
    let kid = unverified
        .header
        .key_id()
        .ok_or_else(|| AuthError::KeyUnavailable(String::new()))?;

    let pem = state.keys.resolve(kid).await?;
    let verified = verify(
        token,
        &VerificationKey::Asymmetric(pem),
        Some(&state.config.base_url),
    )?;

    let claim = verified.query_hash().ok_or(AuthError::MissingQsh)?;
    let uri = original_uri(&parts.extensions, &parts.uri);
    if !state.qsh.matches(claim, &parts.method, &uri) {
        return Err(AuthError::QshMismatch);
    }

    let issuer = verified.issuer().ok_or(AuthError::MissingIssuer)?;
    if issuer != body_client_key {
        tracing::warn!(
            issuer = %issuer,
            client_key = %body_client_key,
            "Install token issuer does not match body clientKey"
        );
        return Err(AuthError::ClientKeyMismatch);
    }

    Ok(InstallIssuer(issuer.to_string()))
}
