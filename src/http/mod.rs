//! HTTP surface
//!
//! A thin axum layer over [`StreamRegistry`](crate::registry::StreamRegistry).
//! Error statuses come from [`StreamError::status_code`](crate::error::StreamError::status_code).

pub mod config;
pub mod routes;
pub mod server;

pub use config::ServerConfig;
pub use routes::{router, AppState, StartResponse};
pub use server::HttpServer;
