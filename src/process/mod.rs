//! Decoder subprocess management
//!
//! The decoder is a black box: it is given a source URL through the
//! invocation template and produces one continuous MJPEG byte stream on
//! stdout. Stderr is discarded.

pub mod config;
pub mod spawner;

pub use config::DecoderConfig;
pub use spawner::{CommandSpawner, DecoderChild, DecoderOutput, DecoderProcess, DecoderSpawner};
