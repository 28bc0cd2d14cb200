//! Command line and environment configuration

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::http::ServerConfig;
use crate::process::config::{DEFAULT_FPS, DEFAULT_QUALITY};
use crate::process::DecoderConfig;
use crate::registry::{RegistryConfig, RestartPolicy};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mjpeg-snap",
    author,
    version,
    about = "Serve on-demand JPEG snapshots from RTSP cameras"
)]
pub struct Args {
    /// Base URL of the RTSP server; a camera's source is `{rtc_host}/{camera_id}`.
    #[arg(long, env = "RTC_HOST", default_value = "rtsp://127.0.0.1:8554")]
    pub rtc_host: String,

    /// Comma-separated camera ids to start at launch.
    #[arg(long, env = "CAMERAS", default_value = "")]
    pub cameras: String,

    /// Decoder output frame rate.
    #[arg(long, env = "FPS", default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Decoder JPEG quality (2 = best, 31 = worst).
    #[arg(long, env = "QUALITY", default_value_t = DEFAULT_QUALITY)]
    pub quality: u32,

    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = crate::http::config::DEFAULT_PORT)]
    pub port: u16,

    /// Cap on pending decoder bytes per camera.
    #[arg(long, env = "MAX_BUFFER_SIZE", default_value_t = 8 * 1024 * 1024)]
    pub max_buffer_size: usize,

    /// Per-attempt wait for a fresh frame, in milliseconds.
    #[arg(long, env = "FRAME_TIMEOUT_MS", default_value_t = 1000)]
    pub frame_timeout_ms: u64,

    /// Decoder command line with {input_url}, {quality} and {fps} placeholders.
    /// Split on whitespace and run without a shell: quotes are not
    /// interpreted, so no single argument may contain a space.
    /// Defaults to a low-latency ffmpeg MJPEG transcode.
    #[arg(long, env = "DECODER_TEMPLATE")]
    pub decoder_template: Option<String>,

    /// Respawn exited decoders after this delay. Without it a dead decoder is
    /// only replaced by the next request.
    #[arg(long, env = "RESTART_DELAY_MS")]
    pub restart_delay_ms: Option<u64>,

    /// Treat a decoder silent for this long as dead.
    #[arg(long, env = "STALL_TIMEOUT_MS")]
    pub stall_timeout_ms: Option<u64>,

    /// Stop cameras nobody has requested for this long.
    #[arg(long, env = "IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Only serve the cameras listed in --cameras; others get 404.
    #[arg(long, env = "RESTRICT_CAMERAS")]
    pub restrict_cameras: bool,
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("decoder template is empty")]
    EmptyTemplate,

    #[error("--restrict-cameras requires at least one camera in --cameras")]
    NoCameras,
}

impl Args {
    /// Camera ids from `--cameras`, trimmed, empty entries dropped
    pub fn camera_list(&self) -> Vec<String> {
        self.cameras
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Decoder invocation from the template and quality/fps settings
    pub fn decoder_config(&self) -> Result<DecoderConfig, ConfigError> {
        let decoder = match &self.decoder_template {
            Some(template) => {
                DecoderConfig::from_template(template).ok_or(ConfigError::EmptyTemplate)?
            }
            None => DecoderConfig::default(),
        };
        Ok(decoder.quality(self.quality).fps(self.fps))
    }

    /// Registry configuration
    pub fn registry_config(&self) -> Result<RegistryConfig, ConfigError> {
        let mut config = RegistryConfig::with_base_url(&self.rtc_host)
            .decoder(self.decoder_config()?)
            .max_buffer_size(self.max_buffer_size)
            .frame_timeout(Duration::from_millis(self.frame_timeout_ms));

        if let Some(delay) = self.restart_delay_ms {
            config = config.restart_policy(RestartPolicy::Backoff {
                delay: Duration::from_millis(delay),
            });
        }
        if let Some(stall) = self.stall_timeout_ms {
            config = config.stall_timeout(Duration::from_millis(stall));
        }
        if let Some(idle) = self.idle_timeout_secs {
            config = config.idle_timeout(Duration::from_secs(idle));
        }
        if self.restrict_cameras {
            let cameras = self.camera_list();
            if cameras.is_empty() {
                return Err(ConfigError::NoCameras);
            }
            config = config.allow_cameras(cameras);
        }

        Ok(config)
    }

    /// HTTP server configuration
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::with_addr(SocketAddr::new(self.host, self.port))
            .preload(self.camera_list());
        if self.idle_timeout_secs.is_some() {
            config = config.enable_cleanup();
        }
        config
    }
}
