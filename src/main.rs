// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, sync::Arc};

use addon_auth::{
    api::router,
    config::{AddonConfig, HOST_ENV, LOG_FORMAT_ENV, PORT_ENV},
    state::AppState,
    storage::{InMemoryTenantStore, RedbTenantStore, TenantStore},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    if env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AddonConfig::from_env().expect("Failed to load configuration");
    info!(
        base_url = %config.base_url,
        addon_key = %config.addon_key,
        signed_install = config.signed_install,
        install_keys_url = %config.install_keys_url,
        "Configuration loaded"
    );

    let tenants: Arc<dyn TenantStore> = match &config.tenant_db_path {
        Some(path) => {
            info!(path = %path.display(), "Opening tenant database");
            Arc::new(RedbTenantStore::open(path).expect("Failed to open tenant database"))
        }
        None => {
            warn!("TENANT_DB_PATH not set, tenants are kept in memory only");
            Arc::new(InMemoryTenantStore::new())
        }
    };

    let state = AppState::new(config, tenants);

    // Fallback key cache sweeper, stopped on shutdown
    let shutdown = CancellationToken::new();
    let sweeper = state.keys.cache().spawn_sweeper(shutdown.clone());

    let app = router(state);

    let host = env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var(PORT_ENV)
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!("Add-on auth server listening on http://{addr} (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "Key cache sweeper task failed");
    }
    info!("Shutdown complete");
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
