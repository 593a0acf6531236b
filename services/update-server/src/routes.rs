//! HTTP surface: `/latest`, `/download/{version}` and `/health`.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use iris_update_common::{Release, artifact_file_name};
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Errors a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no release published")]
    NoRelease,

    #[error("release {0} not found")]
    ReleaseNotFound(u64),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NoRelease | Self::ReleaseNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Build the router. Handlers share `state`; nothing is re-read per request
/// except the artifact file being streamed.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/latest", get(latest))
        .route("/download/{version}", get(download))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn latest(State(state): State<Arc<AppState>>) -> Result<Json<Release>, ApiError> {
    let snapshot = state.snapshot();
    snapshot.latest.clone().map(Json).ok_or(ApiError::NoRelease)
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(version): Path<u64>,
) -> Result<Response, ApiError> {
    let path = state.artifact_path(version);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::ReleaseNotFound(version));
        }
        Err(e) => return Err(ApiError::Internal(e.into())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    if !metadata.is_file() {
        return Err(ApiError::ReleaseNotFound(version));
    }

    tracing::info!(version, size_bytes = metadata.len(), "serving artifact");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/gzip")
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact_file_name(version)),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.into()))
}

/// Liveness probe for load balancers and systemd watchdogs.
async fn health() -> StatusCode {
    StatusCode::OK
}
