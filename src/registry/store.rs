//! Stream registry implementation
//!
//! Maps camera ids to running [`CameraStream`]s. Creation is serialized by the
//! map's write lock so concurrent first requests for one camera spawn exactly
//! one decoder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::error::{Result, StreamError};
use crate::media::JpegFrame;
use crate::process::{CommandSpawner, DecoderSpawner};
use crate::stats::{RegistryStats, StreamStats};
use crate::stream::CameraStream;

use super::config::RegistryConfig;

/// State shared with the streams' reapers
#[derive(Default)]
struct Shared {
    /// Map of camera id to stream
    streams: RwLock<HashMap<String, Arc<CameraStream>>>,
    /// Set by `stop_all`; no new streams after this
    closed: AtomicBool,
    total_spawned: AtomicU64,
    total_reaped: AtomicU64,
    total_evicted: AtomicU64,
}

/// Handle a stream uses to remove itself once its decoder is gone
#[derive(Clone)]
pub struct Reaper {
    shared: Weak<Shared>,
}

impl Reaper {
    /// Remove `camera_id` if it still maps to the given stream generation
    pub(crate) async fn reap(&self, camera_id: &str, generation: u64) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let mut streams = shared.streams.write().await;
        let current = streams
            .get(camera_id)
            .is_some_and(|stream| stream.generation() == generation);

        if current {
            streams.remove(camera_id);
            shared.total_reaped.fetch_add(1, Ordering::Relaxed);
            tracing::info!(camera = %camera_id, generation, "Stream removed after decoder exit");
        }
    }
}

/// Central registry for all camera streams
pub struct StreamRegistry {
    shared: Arc<Shared>,

    /// Configuration shared with every stream
    config: Arc<RegistryConfig>,

    spawner: Arc<dyn DecoderSpawner>,

    next_generation: AtomicU64,
}

impl StreamRegistry {
    /// Create a registry that spawns the configured decoder program
    pub fn new(config: RegistryConfig) -> Self {
        let spawner = CommandSpawner::new(config.decoder.clone());
        Self::with_spawner(config, Arc::new(spawner))
    }

    /// Create a registry with a custom decoder spawner
    pub fn with_spawner(config: RegistryConfig, spawner: Arc<dyn DecoderSpawner>) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            config: Arc::new(config),
            spawner,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the stream for `camera_id`, starting it if needed
    ///
    /// An existing live stream is returned as is (and marked used). A missing
    /// or terminated one is replaced by a freshly spawned decoder. If the
    /// decoder cannot be started nothing is registered.
    pub async fn ensure(&self, camera_id: &str) -> Result<Arc<CameraStream>> {
        if !self.config.is_allowed(camera_id) {
            return Err(StreamError::UnknownCamera(camera_id.to_string()));
        }

        {
            let streams = self.shared.streams.read().await;
            if let Some(stream) = streams.get(camera_id) {
                if !stream.is_terminated() {
                    stream.touch();
                    return Ok(Arc::clone(stream));
                }
            }
        }

        let mut streams = self.shared.streams.write().await;

        // Another request may have won the race for the write lock
        if let Some(stream) = streams.get(camera_id) {
            if !stream.is_terminated() {
                stream.touch();
                return Ok(Arc::clone(stream));
            }
            streams.remove(camera_id);
            tracing::debug!(camera = %camera_id, "Replacing terminated stream");
        }

        if self.shared.closed.load(Ordering::Acquire) {
            return Err(StreamError::spawn_failure(camera_id, "registry is shut down"));
        }

        let input_url = self.config.input_url(camera_id);
        let process = self.spawner.spawn(camera_id, &input_url).map_err(|e| {
            tracing::warn!(camera = %camera_id, url = %input_url, error = %e, "Failed to start decoder");
            e
        })?;
        let pid = process.pid();

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let reaper = Reaper {
            shared: Arc::downgrade(&self.shared),
        };
        let stream = CameraStream::launch(
            camera_id.to_string(),
            generation,
            process,
            Arc::clone(&self.config),
            Arc::clone(&self.spawner),
            Some(reaper),
        );
        stream.touch();

        streams.insert(camera_id.to_string(), Arc::clone(&stream));
        self.shared.total_spawned.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            camera = %camera_id,
            pid = ?pid,
            streams = streams.len(),
            "Stream registered"
        );

        Ok(stream)
    }

    /// Ensure the stream and wait for a fresh frame from it
    ///
    /// A wait that runs out before the camera has ever produced a frame fails
    /// with `NoFrame` rather than `FrameTimeout`.
    pub async fn snapshot(&self, camera_id: &str) -> Result<JpegFrame> {
        let stream = self.ensure(camera_id).await?;
        match stream.get_fresh_frame(self.config.frame_timeout).await {
            Err(StreamError::FrameTimeout { .. }) if stream.latest_frame().await.is_none() => {
                Err(StreamError::NoFrame(camera_id.to_string()))
            }
            result => result,
        }
    }

    /// Start every camera in `camera_ids`, skipping empty ids
    ///
    /// Failures are logged and do not stop the remaining cameras. Returns the
    /// number of streams running afterwards.
    pub async fn preload<I, S>(&self, camera_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut started = 0;
        for camera_id in camera_ids {
            let camera_id = camera_id.as_ref().trim();
            if camera_id.is_empty() {
                continue;
            }

            tracing::info!(camera = %camera_id, "Preloading camera");
            match self.ensure(camera_id).await {
                Ok(_) => started += 1,
                Err(e) => tracing::warn!(camera = %camera_id, error = %e, "Preload failed"),
            }
        }
        started
    }

    /// Look up a stream without starting it
    pub async fn get(&self, camera_id: &str) -> Option<Arc<CameraStream>> {
        self.shared.streams.read().await.get(camera_id).cloned()
    }

    /// Remove and stop one stream
    ///
    /// Returns false if no stream was registered for `camera_id`.
    pub async fn remove(&self, camera_id: &str) -> bool {
        let stream = self.shared.streams.write().await.remove(camera_id);
        match stream {
            Some(stream) => {
                stream.stop().await;
                tracing::info!(camera = %camera_id, "Stream removed");
                true
            }
            None => false,
        }
    }

    /// Stop every stream and clear the registry
    ///
    /// The registry refuses new streams afterwards.
    pub async fn stop_all(&self) {
        let drained: Vec<Arc<CameraStream>> = {
            let mut streams = self.shared.streams.write().await;
            self.shared.closed.store(true, Ordering::Release);
            streams.drain().map(|(_, stream)| stream).collect()
        };

        let count = drained.len();
        stop_streams(drained).await;

        tracing::info!(streams = count, "All streams stopped");
    }

    /// Ids of all registered cameras, sorted
    pub async fn camera_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.streams.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.shared.streams.read().await.len()
    }

    /// Get stream statistics
    pub async fn get_stream_stats(&self, camera_id: &str) -> Option<StreamStats> {
        let stream = self.get(camera_id).await?;
        Some(stream.stats().await)
    }

    /// Registry-wide counters
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_streams: self.stream_count().await,
            total_spawned: self.shared.total_spawned.load(Ordering::Relaxed),
            total_reaped: self.shared.total_reaped.load(Ordering::Relaxed),
            total_evicted: self.shared.total_evicted.load(Ordering::Relaxed),
        }
    }

    /// Run cleanup once
    ///
    /// Removes streams that have:
    /// - Terminated without being reaped
    /// - Been unused longer than `idle_timeout` (if set)
    pub async fn cleanup(&self) {
        let idle_timeout = self.config.idle_timeout;

        let evicted: Vec<Arc<CameraStream>> = {
            let mut streams = self.shared.streams.write().await;

            let ids: Vec<String> = streams
                .iter()
                .filter(|(_, stream)| {
                    stream.is_terminated()
                        || idle_timeout.is_some_and(|limit| stream.idle_for() > limit)
                })
                .map(|(id, _)| id.clone())
                .collect();

            ids.iter().filter_map(|id| streams.remove(id)).collect()
        };

        if evicted.is_empty() {
            return;
        }

        for stream in &evicted {
            if stream.is_terminated() {
                self.shared.total_reaped.fetch_add(1, Ordering::Relaxed);
                tracing::info!(camera = %stream.id(), "Terminated stream removed by cleanup");
            } else {
                self.shared.total_evicted.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    camera = %stream.id(),
                    idle_secs = stream.idle_for().as_secs(),
                    "Idle stream evicted"
                );
            }
        }

        stop_streams(evicted).await;
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Stop streams concurrently so one slow decoder does not delay the rest
async fn stop_streams(streams: Vec<Arc<CameraStream>>) {
    let mut tasks = JoinSet::new();
    for stream in streams {
        tasks.spawn(async move { stream.stop().await });
    }
    while tasks.join_next().await.is_some() {}
}
