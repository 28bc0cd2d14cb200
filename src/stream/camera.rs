//! Per-camera stream state and the fresh-frame wait protocol
//!
//! The background read loop is the only writer of the published frame. All
//! other code paths are readers that wait on the freshness signal:
//!
//! ```text
//!   decoder stdout ──► read loop ──► publish(frame) ──┬─► latest_frame
//!                                                    └─► fresh = true, notify
//!
//!   get_fresh_frame(T): up to 16 × { terminated? ─► StreamTerminated
//!                                    wait(fresh, T) ─► clear, return frame }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::{Result, StreamError};
use crate::media::JpegFrame;
use crate::process::{DecoderChild, DecoderProcess, DecoderSpawner};
use crate::registry::{Reaper, RegistryConfig};
use crate::stats::StreamStats;

/// Maximum number of waits in one `get_fresh_frame` call
pub const MAX_FRAME_ATTEMPTS: u32 = 16;

/// Latest frame plus the single-slot freshness flag
#[derive(Debug, Default)]
struct Published {
    frame: Option<JpegFrame>,
    fresh: bool,
}

/// One camera's decoder, read loop and newest frame
pub struct CameraStream {
    /// Camera identifier
    id: String,

    /// Distinguishes successive streams for the same id
    generation: u64,

    /// Decoder source URL
    input_url: String,

    pub(super) config: Arc<RegistryConfig>,

    pub(super) spawner: Arc<dyn DecoderSpawner>,

    /// Latest frame and freshness flag, published atomically
    published: Mutex<Published>,

    /// Wakes waiters on publish and on termination
    fresh_signal: Notify,

    /// True from creation until stop or decoder death
    running: AtomicBool,

    /// Set once the read loop has exited for good
    terminated: AtomicBool,

    /// Set by the first `stop()` call
    stopping: AtomicBool,

    /// Current decoder process
    pub(super) child: Mutex<Option<DecoderChild>>,

    /// Tells the read loop to exit
    pub(super) shutdown: watch::Sender<bool>,

    /// Read loop task
    task: std::sync::Mutex<Option<JoinHandle<()>>>,

    /// Removes this stream from its registry
    reaper: Option<Reaper>,

    created_at: Instant,

    /// Milliseconds since `created_at` of the last access
    last_used_ms: AtomicU64,

    pub(super) frames_published: AtomicU64,
    pub(super) frames_skipped: AtomicU64,
    pub(super) bytes_read: AtomicU64,
    pub(super) buffer_size: AtomicUsize,
    pub(super) restarts: AtomicU32,
}

impl CameraStream {
    /// Start a stream around an already spawned decoder
    ///
    /// `spawner` is only used if the restart policy respawns the decoder.
    pub fn start(
        id: impl Into<String>,
        process: DecoderProcess,
        config: Arc<RegistryConfig>,
        spawner: Arc<dyn DecoderSpawner>,
    ) -> Arc<Self> {
        Self::launch(id.into(), 0, process, config, spawner, None)
    }

    pub(crate) fn launch(
        id: String,
        generation: u64,
        mut process: DecoderProcess,
        config: Arc<RegistryConfig>,
        spawner: Arc<dyn DecoderSpawner>,
        reaper: Option<Reaper>,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let input_url = config.input_url(&id);

        let stream = Arc::new(Self {
            id,
            generation,
            input_url,
            config,
            spawner,
            published: Mutex::new(Published::default()),
            fresh_signal: Notify::new(),
            running: AtomicBool::new(true),
            terminated: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            child: Mutex::new(process.child.take()),
            shutdown,
            task: std::sync::Mutex::new(None),
            reaper,
            created_at: Instant::now(),
            last_used_ms: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            buffer_size: AtomicUsize::new(0),
            restarts: AtomicU32::new(0),
        });

        let handle = tokio::spawn(Arc::clone(&stream).supervise(process.output));
        if let Ok(mut task) = stream.task.lock() {
            *task = Some(handle);
        }

        tracing::info!(camera = %stream.id, url = %stream.input_url, "Camera stream started");
        stream
    }

    /// Camera identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Decoder source URL
    pub fn input_url(&self) -> &str {
        &self.input_url
    }

    /// Whether the read loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the decoder has exited for good
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Record an access
    pub fn touch(&self) {
        let now = self.created_at.elapsed().as_millis() as u64;
        self.last_used_ms.fetch_max(now, Ordering::Relaxed);
    }

    /// Time since the last access
    pub fn idle_for(&self) -> Duration {
        let last_used = Duration::from_millis(self.last_used_ms.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last_used)
    }

    /// Process id of the current decoder, if it is a real process
    pub async fn decoder_pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(DecoderChild::pid)
    }

    /// Current frame without waiting for a fresh one
    pub async fn latest_frame(&self) -> Option<JpegFrame> {
        self.published.lock().await.frame.clone()
    }

    /// Store a frame as latest and raise the freshness signal
    ///
    /// Returns false (and stores nothing) once the stream is no longer running.
    pub(super) async fn publish(&self, data: Bytes) -> bool {
        let mut published = self.published.lock().await;
        if !self.is_running() {
            return false;
        }

        let sequence = self.frames_published.fetch_add(1, Ordering::Relaxed) + 1;
        published.frame = Some(JpegFrame::new(data, sequence));
        published.fresh = true;
        drop(published);

        self.fresh_signal.notify_waiters();
        true
    }

    /// Wait for a frame published since the last consumption
    ///
    /// Each attempt first fails fast if the decoder is gone, then waits up to
    /// `timeout` for the freshness signal. After [`MAX_FRAME_ATTEMPTS`]
    /// timeouts the call fails with `FrameTimeout`, so the worst case is
    /// `timeout × 16`.
    pub async fn get_fresh_frame(&self, timeout: Duration) -> Result<JpegFrame> {
        self.touch();

        for attempt in 1..=MAX_FRAME_ATTEMPTS {
            if self.is_terminated() {
                self.request_removal().await;
                return Err(StreamError::StreamTerminated(self.id.clone()));
            }

            let notified = self.fresh_signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(frame) = self.take_if_fresh().await {
                return Ok(frame);
            }

            match tokio::time::timeout(timeout, notified).await {
                Ok(()) if self.is_terminated() => continue,
                Ok(()) => return self.take_latest().await,
                Err(_) => {
                    tracing::trace!(camera = %self.id, attempt, "No fresh frame yet");
                }
            }
        }

        tracing::debug!(camera = %self.id, attempts = MAX_FRAME_ATTEMPTS, "Fresh frame wait timed out");
        Err(StreamError::FrameTimeout {
            camera: self.id.clone(),
            attempts: MAX_FRAME_ATTEMPTS,
        })
    }

    /// Clear the signal and return the frame if it is set
    async fn take_if_fresh(&self) -> Option<JpegFrame> {
        let mut published = self.published.lock().await;
        if published.fresh {
            published.fresh = false;
            published.frame.clone()
        } else {
            None
        }
    }

    /// Clear the signal and return whatever frame is current
    async fn take_latest(&self) -> Result<JpegFrame> {
        let mut published = self.published.lock().await;
        published.fresh = false;
        published
            .frame
            .clone()
            .ok_or_else(|| StreamError::NoFrame(self.id.clone()))
    }

    /// Mark the read loop as finished and wake all waiters
    pub(super) async fn mark_terminated(&self) {
        {
            let _published = self.published.lock().await;
            self.running.store(false, Ordering::Release);
        }
        self.terminated.store(true, Ordering::Release);
        self.fresh_signal.notify_waiters();
    }

    /// Remove this stream from its registry, if it is still the registered one
    pub(super) async fn request_removal(&self) {
        if let Some(reaper) = &self.reaper {
            reaper.reap(&self.id, self.generation).await;
        }
    }

    pub(super) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Stop the read loop and the decoder
    ///
    /// The decoder gets SIGTERM and `kill_grace_period` to exit before it is
    /// killed. Calling this on a stopped stream is a no-op.
    pub async fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let _published = self.published.lock().await;
            self.running.store(false, Ordering::Release);
        }
        self.shutdown.send_replace(true);

        let grace = self.config.kill_grace_period;
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            child.terminate(grace).await;
        }

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(mut task) = task {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::warn!(camera = %self.id, "Read loop did not exit, aborting");
                task.abort();
            }
        }

        self.terminated.store(true, Ordering::Release);
        self.fresh_signal.notify_waiters();

        tracing::info!(camera = %self.id, "Camera stream stopped");
    }

    /// Current statistics
    pub async fn stats(&self) -> StreamStats {
        let has_frame = self.published.lock().await.frame.is_some();

        StreamStats {
            camera: self.id.clone(),
            running: self.is_running(),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            buffer_size: self.buffer_size.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
            idle_for: self.idle_for(),
            has_frame,
        }
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
