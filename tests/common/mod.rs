//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mjpeg_snap::{DecoderConfig, RegistryConfig, StreamRegistry};

/// One JPEG frame every 50ms, forever
pub const FRAME_LOOP: &str = r"while :; do printf '\377\330FRAME\377\331'; sleep 0.05; done";

/// Decoder that runs `script` under `sh -c`, with the input URL as `$0`
pub fn sh_decoder(script: &str) -> DecoderConfig {
    DecoderConfig {
        program: "sh".into(),
        args: vec!["-c".into(), script.into(), "{input_url}".into()],
        ..DecoderConfig::default()
    }
}

/// Registry config with short timeouts around a shell decoder
pub fn sh_config(script: &str) -> RegistryConfig {
    RegistryConfig::with_base_url("rtsp://127.0.0.1:8554")
        .decoder(sh_decoder(script))
        .yield_interval(Duration::from_millis(1))
        .kill_grace_period(Duration::from_millis(200))
}

pub fn sh_registry(script: &str) -> Arc<StreamRegistry> {
    Arc::new(StreamRegistry::new(sh_config(script)))
}
