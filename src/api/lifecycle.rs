// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lifecycle callbacks sent by the host platform.
//!
//! `installed` is gated by the installation handshake middleware, the other
//! callbacks by the authentication middleware. Every callback writes the full
//! tenant record through the tenant store.

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::{InstallVerification, Verified};
use crate::error::ApiError;
use crate::models::{LifecyclePayload, Tenant};
use crate::state::AppState;

/// Shared secret currently stored for `client_key`, if any.
fn stored_secret(state: &AppState, client_key: &str) -> Result<Option<String>, ApiError> {
    match state.tenants.get(client_key) {
        Ok(tenant) => Ok(Some(tenant.shared_secret).filter(|s| !s.is_empty())),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Install (or re-install) callback.
#[utoipa::path(
    post,
    path = "/installed",
    tag = "Lifecycle",
    request_body(content = Object, description = "Host lifecycle payload"),
    responses(
        (status = 204, description = "Tenant stored"),
        (status = 401, description = "Install callback failed verification"),
    )
)]
pub async fn installed(
    State(state): State<AppState>,
    InstallVerification(issuer): InstallVerification,
    Json(payload): Json<LifecyclePayload>,
) -> Result<StatusCode, ApiError> {
    let previous = stored_secret(&state, &payload.client_key)?;
    let tenant = state.tenants.set(payload.into_tenant(previous))?;

    tracing::info!(
        client_key = %tenant.client_key,
        base_url = %tenant.base_url,
        signed = issuer.is_some(),
        "Tenant installed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Uninstall callback. The record is kept with `addonInstalled = false`.
#[utoipa::path(
    post,
    path = "/uninstalled",
    tag = "Lifecycle",
    request_body(content = Object, description = "Host lifecycle payload"),
    responses(
        (status = 204, description = "Tenant marked uninstalled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Payload names another tenant"),
    )
)]
pub async fn uninstalled(
    State(state): State<AppState>,
    Verified(identity): Verified,
    Json(payload): Json<LifecyclePayload>,
) -> Result<StatusCode, ApiError> {
    if payload.client_key != identity.client_key {
        return Err(ApiError::forbidden(
            "clientKey in payload does not match authenticated tenant",
        ));
    }

    let previous = stored_secret(&state, &identity.client_key)?;
    let mut tenant = payload.into_tenant(previous);
    tenant.addon_installed = false;
    state.tenants.set(tenant)?;

    tracing::info!(client_key = %identity.client_key, "Tenant uninstalled");
    Ok(StatusCode::NO_CONTENT)
}

fn set_installed(state: &AppState, client_key: &str, installed: bool) -> Result<Tenant, ApiError> {
    let mut tenant = state.tenants.get(client_key)?;
    tenant.addon_installed = installed;
    Ok(state.tenants.set(tenant)?)
}

/// Enable callback.
#[utoipa::path(
    post,
    path = "/enabled",
    tag = "Lifecycle",
    responses(
        (status = 204, description = "Tenant enabled"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn enabled(
    State(state): State<AppState>,
    Verified(identity): Verified,
) -> Result<StatusCode, ApiError> {
    set_installed(&state, &identity.client_key, true)?;
    tracing::info!(client_key = %identity.client_key, "Tenant enabled");
    Ok(StatusCode::NO_CONTENT)
}

/// Disable callback.
#[utoipa::path(
    post,
    path = "/disabled",
    tag = "Lifecycle",
    responses(
        (status = 204, description = "Tenant disabled"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn disabled(
    State(state): State<AppState>,
    Verified(identity): Verified,
) -> Result<StatusCode, ApiError> {
    set_installed(&state, &identity.client_key, false)?;
    tracing::info!(client_key = %identity.client_key, "Tenant disabled");
    Ok(StatusCode::NO_CONTENT)
}
