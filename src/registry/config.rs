//! Registry configuration

use std::collections::HashSet;
use std::time::Duration;

use crate::media::buffer::DEFAULT_MIN_READ_SIZE;
use crate::process::DecoderConfig;

/// What to do when a decoder exits on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Exit is terminal; the stream is reaped and the next request respawns
    Never,
    /// Respawn the decoder after `delay` for as long as the stream runs
    Backoff { delay: Duration },
}

/// Registry and per-stream configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Prefix for camera source URLs (`{base_url}/{camera_id}`)
    pub base_url: String,

    /// Decoder invocation template
    pub decoder: DecoderConfig,

    /// Cap on pending decoder bytes per stream
    pub max_buffer_size: usize,

    /// Smallest read from decoder stdout
    pub min_read_size: usize,

    /// Pause after a read that completed no frame
    pub yield_interval: Duration,

    /// Per-attempt wait for a fresh frame
    pub frame_timeout: Duration,

    /// Time allowed between SIGTERM and SIGKILL
    pub kill_grace_period: Duration,

    /// Behaviour on decoder exit
    pub restart_policy: RestartPolicy,

    /// Treat the decoder as dead after this long without output
    pub stall_timeout: Option<Duration>,

    /// Stop streams unused for this long (None = never)
    pub idle_timeout: Option<Duration>,

    /// How often the cleanup task checks for idle streams
    pub cleanup_interval: Duration,

    /// Accepted camera ids (None = any id)
    pub allowed_cameras: Option<HashSet<String>>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "rtsp://127.0.0.1:8554".into(),
            decoder: DecoderConfig::default(),
            max_buffer_size: 8 * 1024 * 1024, // 8MB
            min_read_size: DEFAULT_MIN_READ_SIZE,
            yield_interval: Duration::from_millis(10),
            frame_timeout: Duration::from_secs(1),
            kill_grace_period: Duration::from_secs(5),
            restart_policy: RestartPolicy::Never,
            stall_timeout: None,
            idle_timeout: None,
            cleanup_interval: Duration::from_secs(30),
            allowed_cameras: None,
        }
    }
}

impl RegistryConfig {
    /// Create a new config with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the decoder template
    pub fn decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Set the buffer cap
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Set the idle pause between reads
    pub fn yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }

    /// Set the per-attempt frame wait
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the SIGTERM grace period
    pub fn kill_grace_period(mut self, grace: Duration) -> Self {
        self.kill_grace_period = grace;
        self
    }

    /// Set the restart policy
    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Enable stall detection
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    /// Enable idle eviction
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the cleanup task interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Restrict the registry to the given camera ids
    pub fn allow_cameras<I, S>(mut self, cameras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_cameras = Some(cameras.into_iter().map(Into::into).collect());
        self
    }

    /// Source URL for one camera
    pub fn input_url(&self, camera_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), camera_id)
    }

    /// Whether a camera id passes the allow-list
    pub fn is_allowed(&self, camera_id: &str) -> bool {
        self.allowed_cameras
            .as_ref()
            .map_or(true, |allowed| allowed.contains(camera_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.base_url, "rtsp://127.0.0.1:8554");
        assert_eq!(config.max_buffer_size, 8 * 1024 * 1024);
        assert_eq!(config.frame_timeout, Duration::from_secs(1));
        assert_eq!(config.restart_policy, RestartPolicy::Never);
        assert!(config.idle_timeout.is_none());
        assert!(config.stall_timeout.is_none());
        assert!(config.allowed_cameras.is_none());
    }

    #[test]
    fn test_input_url() {
        let config = RegistryConfig::with_base_url("rtsp://10.0.0.2:8554");
        assert_eq!(config.input_url("Lobby"), "rtsp://10.0.0.2:8554/Lobby");

        let config = RegistryConfig::with_base_url("rtsp://10.0.0.2:8554/");
        assert_eq!(config.input_url("Lobby"), "rtsp://10.0.0.2:8554/Lobby");
    }

    #[test]
    fn test_allow_list() {
        let config = RegistryConfig::default();
        assert!(config.is_allowed("anything"));

        let config = config.allow_cameras(["Lobby", "Garage"]);
        assert!(config.is_allowed("Lobby"));
        assert!(!config.is_allowed("Attic"));
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .max_buffer_size(1024)
            .frame_timeout(Duration::from_millis(250))
            .kill_grace_period(Duration::from_secs(2))
            .restart_policy(RestartPolicy::Backoff {
                delay: Duration::from_secs(3),
            })
            .stall_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .cleanup_interval(Duration::from_secs(5));

        assert_eq!(config.max_buffer_size, 1024);
        assert_eq!(config.frame_timeout, Duration::from_millis(250));
        assert_eq!(config.kill_grace_period, Duration::from_secs(2));
        assert_eq!(
            config.restart_policy,
            RestartPolicy::Backoff {
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(config.stall_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
    }
}
