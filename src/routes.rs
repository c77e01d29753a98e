use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::matcher::{find_best_match, MatchResult};
use crate::state::AppState;

/// Multipart field carrying the query image.
const IMAGE_FIELD: &str = "image";

pub async fn frontend(State(state): State<Arc<AppState>>) -> ServerResult<Html<String>> {
    let html = tokio::fs::read_to_string(&state.config.frontend)
        .await
        .map_err(|e| {
            log::warn!("Cannot read frontend {}: {}", state.config.frontend.display(), e);
            ServerError::NotFound
        })?;
    Ok(Html(html))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "references": state.index.len(),
        "dimension": state.index.dimension(),
    }))
}

/// Match an uploaded chart against the reference index.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<MatchResult>> {
    let mut multipart = multipart.map_err(|_| ServerError::NoImage)?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, &state))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| upload_error(e, &state))?;
            image = Some(bytes);
            break;
        }
    }
    let bytes = image.ok_or(ServerError::NoImage)?;

    let upload = state.uploads.save(&bytes)?;
    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let outcome = find_best_match(upload.path(), &worker.index, worker.embedder.as_ref());
        drop(upload);
        outcome
    })
    .await
    .map_err(|e| ServerError::Internal(format!("match task failed: {e}")))??;

    log::info!(
        "Matched {} ({}) with confidence {:.2}",
        result.label,
        result.decision,
        result.confidence
    );

    Ok(Json(result))
}

/// Oversized bodies surface as multipart errors once the body limit trips.
fn upload_error(err: MultipartError, state: &AppState) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(state.config.max_upload_mb)
    } else {
        ServerError::BadRequest(err.body_text())
    }
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
