use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::middleware::{log_requests, rate_limit};
use crate::routes;
use crate::state::{AppState, RATE_WINDOW};

/// Build the router.
///
/// Only `/analyze` is rate limited and carries the upload body limit; the
/// frontend, static assets and health check are always served.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_mb * 1024 * 1024;

    let analyze_routes = Router::new()
        .route("/analyze", post(routes::analyze))
        .route_layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(routes::frontend))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .merge(analyze_routes)
        .fallback(routes::not_found)
        .layer(from_fn(log_requests))
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.socket_addr()?;
    let app = build_router(state.clone());

    if state.config.rate_limit_per_minute > 0 {
        tokio::spawn(prune_rate_limits(state));
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("Server shutdown complete");
    Ok(())
}

/// Evict expired rate-limit windows once per window length.
async fn prune_rate_limits(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(RATE_WINDOW);
    loop {
        ticker.tick().await;
        let removed = state.prune_rate_limits(Instant::now());
        if removed > 0 {
            log::debug!("Pruned {} idle rate-limit client(s)", removed);
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => log::info!("Received SIGTERM, shutting down..."),
    }
}
