//! Request handlers
//!
//! - `GET /{camera_id}`: freshest JPEG frame
//! - `GET /start/{camera_id}`: start the camera without waiting for a frame

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::StreamError;
use crate::registry::StreamRegistry;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
}

/// JSON response for `/start/{camera_id}`
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub camera_name: String,
}

/// Build the router for a registry
pub fn router(registry: Arc<StreamRegistry>) -> Router {
    Router::new()
        .route("/start/{camera_id}", get(start_stream))
        .route("/{camera_id}", get(latest_frame))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

/// GET /{camera_id} - Freshest frame as image/jpeg
async fn latest_frame(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<Response, StreamError> {
    let frame = state.registry.snapshot(&camera_id).await?;

    tracing::debug!(
        camera = %camera_id,
        sequence = frame.sequence,
        size = frame.len(),
        "Serving frame"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        frame.data,
    )
        .into_response())
}

/// GET /start/{camera_id} - Ensure the camera's stream is running
async fn start_stream(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<Json<StartResponse>, StreamError> {
    state.registry.ensure(&camera_id).await?;

    Ok(Json(StartResponse {
        status: "stream started",
        camera_name: camera_id,
    }))
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_transient() {
            tracing::debug!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        (status, self.to_string()).into_response()
    }
}
