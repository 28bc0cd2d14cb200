//! In-memory decoder for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::io::DuplexStream;

use crate::error::{Result, StreamError};
use crate::process::{DecoderProcess, DecoderSpawner};

/// Hands out duplex pipes instead of processes and records every spawn
#[derive(Default)]
pub(crate) struct PipeSpawner {
    spawned: AtomicUsize,
    fail: AtomicBool,
    writers: Mutex<Vec<Option<DuplexStream>>>,
    urls: Mutex<Vec<String>>,
}

impl PipeSpawner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make subsequent spawns fail
    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Write end of the pipe returned by the `index`th spawn
    pub(crate) fn take_writer(&self, index: usize) -> DuplexStream {
        self.writers.lock().unwrap()[index].take().unwrap()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl DecoderSpawner for PipeSpawner {
    fn spawn(&self, camera_id: &str, input_url: &str) -> Result<DecoderProcess> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StreamError::spawn_failure(camera_id, "spawn disabled"));
        }

        let (writer, reader) = tokio::io::duplex(64 * 1024);
        self.writers.lock().unwrap().push(Some(writer));
        self.urls.lock().unwrap().push(input_url.to_string());
        self.spawned.fetch_add(1, Ordering::SeqCst);

        Ok(DecoderProcess::from_reader(reader))
    }
}
