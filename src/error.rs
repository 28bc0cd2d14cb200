//! Error types
//!
//! Every failure is scoped to a single camera. None of these abort the
//! service or another camera's stream.

use axum::http::StatusCode;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error type for stream and registry operations
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The decoder could not be started or its output is unavailable
    #[error("failed to start decoder for camera {camera}: {reason}")]
    SpawnFailure { camera: String, reason: String },

    /// The decoder exited while a frame was requested
    #[error("stream terminated for camera {0}")]
    StreamTerminated(String),

    /// No fresh frame arrived within the retry budget
    #[error("timeout waiting for fresh frame from camera {camera} after {attempts} attempts")]
    FrameTimeout { camera: String, attempts: u32 },

    /// The camera has not produced any frame yet
    #[error("no frame available yet for camera {0}")]
    NoFrame(String),

    /// Camera id outside the configured allow-list
    #[error("unknown camera: {0}")]
    UnknownCamera(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub(crate) fn spawn_failure(camera: &str, reason: impl ToString) -> Self {
        StreamError::SpawnFailure {
            camera: camera.to_string(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::SpawnFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            StreamError::StreamTerminated(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StreamError::FrameTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            StreamError::NoFrame(_) => StatusCode::SERVICE_UNAVAILABLE,
            StreamError::UnknownCamera(_) => StatusCode::NOT_FOUND,
            StreamError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the condition is expected to clear on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StreamError::FrameTimeout { .. } | StreamError::NoFrame(_)
        )
    }
}
