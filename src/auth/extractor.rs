// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token extraction and typed identity extractors.
//!
//! Handlers behind the authentication middleware read the verified identity
//! with the `Verified` extractor:
//!
//! ```rust,ignore
//! async fn my_handler(Verified(identity): Verified) -> impl IntoResponse {
//!     // identity.client_key is the authenticated tenant
//! }
//! ```

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, OriginalUri, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        Extensions, HeaderMap, Uri,
    },
};

use super::claims::{InstallIssuer, VerifiedIdentity};
use super::qsh::JWT_PARAM;
use super::AuthError;

/// Largest request body buffered while looking for a form `jwt` field.
pub const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// `Authorization` scheme used by host platforms.
const AUTH_SCHEME: &str = "JWT ";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn find_jwt(encoded: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(name, _)| name == JWT_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE))
}

/// Find the token in request parts and an already buffered body.
///
/// Looks at the `jwt` query parameter, the `jwt` form field, then the
/// `Authorization: JWT <token>` header. A token in both query and form body
/// is ambiguous. The header is only used when neither carried one. `body` is
/// only inspected for form-encoded requests.
pub fn find_token(parts: &Parts, body: &[u8]) -> Result<String, AuthError> {
    let in_query = parts
        .uri
        .query()
        .and_then(|query| find_jwt(query.as_bytes()));
    let in_body = if is_form(&parts.headers) {
        find_jwt(body)
    } else {
        None
    };

    let token = match (in_query, in_body) {
        (Some(_), Some(_)) => return Err(AuthError::AmbiguousToken),
        (Some(token), None) | (None, Some(token)) => Some(token),
        (None, None) => parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix(AUTH_SCHEME))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty()),
    };

    token.ok_or(AuthError::MissingToken)
}

/// Pull the token off a request.
///
/// Same lookup order as [`find_token`]. A form body is buffered and handed
/// back untouched in the returned request.
pub async fn extract_token(request: Request) -> Result<(String, Request), AuthError> {
    let (parts, body) = request.into_parts();
    let (token, body) = if is_form(&parts.headers) {
        let bytes = to_bytes(body, MAX_BUFFERED_BODY)
            .await
            .map_err(|e| AuthError::Internal(format!("could not buffer request body: {e}")))?;
        (find_token(&parts, &bytes)?, Body::from(bytes))
    } else {
        (find_token(&parts, &[])?, body)
    };
    Ok((token, Request::from_parts(parts, body)))
}

/// URI as the client sent it, before any router nesting stripped a prefix.
pub(crate) fn original_uri(extensions: &Extensions, uri: &Uri) -> Uri {
    extensions
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| uri.clone())
}

/// Extractor for the identity attached by the authentication middleware.
pub struct Verified(pub VerifiedIdentity);

impl<S: Send + Sync> FromRequestParts<S> for Verified {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedIdentity>()
            .cloned()
            .map(Verified)
            .ok_or_else(|| {
                AuthError::Internal("route is not wrapped by the authentication middleware".into())
            })
    }
}

/// Issuer of a signed install callback, `None` for unsigned/HMAC installs.
pub struct InstallVerification(pub Option<InstallIssuer>);

impl<S: Send + Sync> FromRequestParts<S> for InstallVerification {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(InstallVerification(
            parts.extensions.get::<InstallIssuer>().cloned(),
        ))
    }
}
