use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ServerError;
use crate::state::AppState;

/// Per-client-IP rate limiting.
///
/// Requests that arrive without connection info (e.g. driven in-process)
/// share a single "unknown" bucket.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.check_rate_limit(&client) {
        log::warn!("Rate limit exceeded for {}", client);
        return Err(ServerError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        uri,
        response.status(),
        start.elapsed().as_millis()
    );

    response
}
