// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authenticate, verify_installation},
    models::{LifecycleEvent, Tenant},
    state::AppState,
};

pub mod health;
pub mod lifecycle;

/// Build the application router.
///
/// Lifecycle callbacks are mounted under the configured route prefix, health
/// probes and docs at the root.
pub fn router(state: AppState) -> Router {
    let install_routes = Router::new()
        .route("/installed", post(lifecycle::installed))
        .route_layer(from_fn_with_state(state.clone(), verify_installation));

    let authenticated_routes = Router::new()
        .route("/uninstalled", post(lifecycle::uninstalled))
        .route("/enabled", post(lifecycle::enabled))
        .route("/disabled", post(lifecycle::disabled))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let lifecycle_routes = install_routes.merge(authenticated_routes);

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let prefix = state.config.route_prefix.trim_matches('/').to_string();
    let app = if prefix.is_empty() {
        health_routes.merge(lifecycle_routes)
    } else {
        health_routes.nest(&format!("/{prefix}"), lifecycle_routes)
    };

    app.with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        lifecycle::installed,
        lifecycle::uninstalled,
        lifecycle::enabled,
        lifecycle::disabled
    ),
    components(
        schemas(
            Tenant,
            LifecycleEvent,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Lifecycle", description = "Host platform lifecycle callbacks")
    )
)]
struct ApiDoc;
