//! On-demand JPEG snapshots from RTSP cameras
//!
//! Each camera gets one long-running decoder process (ffmpeg by default) that
//! transcodes the camera's RTSP feed into an MJPEG byte stream on stdout. A
//! background read loop per camera cuts complete JPEG frames out of that
//! stream and keeps only the newest one. HTTP clients ask for a camera and
//! receive the next freshly decoded frame.
//!
//! # Architecture
//!
//! ```text
//!   GET /{camera}                    StreamRegistry
//!        │                      ┌────────────────────────┐
//!        └──► ensure(camera) ──►│ camera ─► CameraStream │
//!                               └───────────┬────────────┘
//!                                           │
//!                   ┌───────────────────────┼─────────────────────┐
//!                   ▼                       ▼                     ▼
//!            decoder process        read loop (task)        frame waiters
//!            rtsp ─► mjpeg ─►stdout─► FrameBuffer ─► publish ─► get_fresh_frame
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mjpeg_snap::{HttpServer, RegistryConfig, ServerConfig};
//!
//! # async fn run() -> mjpeg_snap::Result<()> {
//! let registry = RegistryConfig::with_base_url("rtsp://127.0.0.1:8554");
//! let server = HttpServer::new(ServerConfig::default().preload(["Lobby"]), registry);
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod http;
pub mod media;
pub mod process;
pub mod registry;
pub mod stats;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use error::{Result, StreamError};
pub use http::{HttpServer, ServerConfig};
pub use media::JpegFrame;
pub use process::{CommandSpawner, DecoderConfig, DecoderProcess, DecoderSpawner};
pub use registry::{RegistryConfig, RestartPolicy, StreamRegistry};
pub use stats::{RegistryStats, StreamStats};
pub use stream::CameraStream;
