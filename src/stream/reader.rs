//! Read/parse loop and decoder supervision
//!
//! One task per camera. It reads bounded chunks from the decoder, feeds them
//! through the [`FrameBuffer`], publishes the newest complete frame from each
//! read and decides what happens when the decoder goes away.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use crate::media::FrameBuffer;
use crate::process::{DecoderOutput, DecoderProcess};
use crate::registry::RestartPolicy;

use super::camera::CameraStream;

/// Why the read loop returned
#[derive(Debug)]
enum LoopExit {
    /// `stop()` was called
    Stopped,
    /// Decoder closed its output
    Eof,
    /// No output within the stall timeout
    Stalled,
    /// Read error
    Failed(io::Error),
}

impl CameraStream {
    /// Run read loops until the stream stops or the decoder is given up on
    pub(super) async fn supervise(self: Arc<Self>, mut output: DecoderOutput) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let exit = self.pump(&mut output, &mut shutdown).await;
            self.release_child().await;

            match &exit {
                LoopExit::Stopped => break,
                LoopExit::Eof => {
                    tracing::info!(camera = %self.id(), "Decoder output closed");
                }
                LoopExit::Stalled => {
                    tracing::warn!(camera = %self.id(), "Decoder stalled");
                }
                LoopExit::Failed(e) => {
                    tracing::error!(camera = %self.id(), error = %e, "Decoder read failed");
                }
            }

            if !self.is_running() {
                break;
            }

            let delay = match self.config.restart_policy {
                RestartPolicy::Never => break,
                RestartPolicy::Backoff { delay } => delay,
            };

            match self.respawn(delay, &mut shutdown).await {
                Some(next) => output = next,
                None => break,
            }
        }

        self.mark_terminated().await;

        if !self.is_stopping() {
            self.request_removal().await;
        }

        tracing::debug!(camera = %self.id(), "Read loop exited");
    }

    /// Read, extract and publish until the decoder output ends
    async fn pump(
        &self,
        output: &mut DecoderOutput,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LoopExit {
        let mut buffer =
            FrameBuffer::with_limits(self.config.max_buffer_size, self.config.min_read_size);
        let mut chunk = Vec::new();

        loop {
            if !self.is_running() {
                return LoopExit::Stopped;
            }

            chunk.resize(buffer.read_size(), 0);

            let read = tokio::select! {
                _ = shutdown_requested(shutdown) => return LoopExit::Stopped,
                read = read_chunk(output, &mut chunk, self.config.stall_timeout) => read,
            };

            let n = match read {
                Ok(0) => return LoopExit::Eof,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return LoopExit::Stalled,
                Err(e) => return LoopExit::Failed(e),
            };

            self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);

            if !buffer.push(&chunk[..n]) {
                tracing::debug!(
                    camera = %self.id(),
                    max_size = buffer.max_size(),
                    "Buffer cap exceeded, discarded pending bytes"
                );
            }

            let newest = buffer.take_newest();
            self.buffer_size.store(buffer.len(), Ordering::Relaxed);

            match newest {
                Some((frame, count)) => {
                    if count > 1 {
                        self.frames_skipped
                            .fetch_add(count as u64 - 1, Ordering::Relaxed);
                    }
                    if !self.publish(frame).await {
                        return LoopExit::Stopped;
                    }
                }
                None => tokio::time::sleep(self.config.yield_interval).await,
            }
        }
    }

    /// Terminate and drop the current decoder process
    async fn release_child(&self) {
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            let status = child.terminate(self.config.kill_grace_period).await;
            tracing::debug!(
                camera = %self.id(),
                pid = ?child.pid(),
                code = ?status.and_then(|s| s.code()),
                "Decoder released"
            );
        }
    }

    /// Start a new decoder after `delay`, retrying until one starts
    ///
    /// Returns `None` if the stream is stopped while waiting.
    async fn respawn(
        &self,
        delay: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<DecoderOutput> {
        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.is_running() {
                return None;
            }

            match self.spawner.spawn(self.id(), self.input_url()) {
                Ok(DecoderProcess { output, child }) => {
                    *self.child.lock().await = child;
                    self.restarts.fetch_add(1, Ordering::Relaxed);

                    // stop() may have run between the spawn and the store
                    if !self.is_running() {
                        self.release_child().await;
                        return None;
                    }

                    tracing::info!(
                        camera = %self.id(),
                        restarts = self.restarts.load(Ordering::Relaxed),
                        "Decoder restarted"
                    );
                    return Some(output);
                }
                Err(e) => {
                    tracing::warn!(
                        camera = %self.id(),
                        error = %e,
                        retry_ms = delay.as_millis() as u64,
                        "Decoder restart failed"
                    );
                }
            }
        }
    }
}

/// Resolves once `stop()` has been requested
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Read one chunk, failing with `TimedOut` after `stall_timeout`
async fn read_chunk(
    output: &mut DecoderOutput,
    chunk: &mut [u8],
    stall_timeout: Option<Duration>,
) -> io::Result<usize> {
    match stall_timeout {
        Some(limit) => tokio::time::timeout(limit, output.read(chunk))
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "decoder stalled"))),
        None => output.read(chunk).await,
    }
}
