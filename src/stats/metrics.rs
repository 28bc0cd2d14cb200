//! Statistics for camera streams

use std::time::Duration;

/// Point-in-time statistics for one camera stream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Camera identifier
    pub camera: String,
    /// Whether the read loop is still running
    pub running: bool,
    /// Frames published as latest
    pub frames_published: u64,
    /// Frames extracted but superseded within the same read
    pub frames_skipped: u64,
    /// Total bytes read from the decoder
    pub bytes_read: u64,
    /// Pending bytes in the accumulation buffer
    pub buffer_size: usize,
    /// Decoder restarts performed
    pub restarts: u32,
    /// Time since the stream was created
    pub uptime: Duration,
    /// Time since the stream was last requested
    pub idle_for: Duration,
    /// Whether a frame has been published
    pub has_frame: bool,
}

impl StreamStats {
    pub fn new(camera: String) -> Self {
        Self {
            camera,
            running: false,
            frames_published: 0,
            frames_skipped: 0,
            bytes_read: 0,
            buffer_size: 0,
            restarts: 0,
            uptime: Duration::ZERO,
            idle_for: Duration::ZERO,
            has_frame: false,
        }
    }

    /// Average input rate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_read * 8) / secs
        } else {
            0
        }
    }

    /// Average published frame rate
    pub fn framerate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_published as f64 / secs
        } else {
            0.0
        }
    }
}

/// Registry-wide statistics
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Streams currently registered
    pub active_streams: usize,
    /// Streams created since startup
    pub total_spawned: u64,
    /// Streams removed after their decoder died
    pub total_reaped: u64,
    /// Streams removed for being idle
    pub total_evicted: u64,
}
