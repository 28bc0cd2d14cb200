//! Decoder subprocess spawning and teardown
//!
//! The registry never touches `tokio::process` directly; it asks a
//! [`DecoderSpawner`] for a [`DecoderProcess`]. Production uses
//! [`CommandSpawner`], tests substitute in-memory pipes.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::error::{Result, StreamError};

use super::config::DecoderConfig;

/// Byte stream produced by the decoder
pub type DecoderOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Starts one decoder per camera
pub trait DecoderSpawner: Send + Sync + 'static {
    /// Start a decoder reading from `input_url`
    fn spawn(&self, camera_id: &str, input_url: &str) -> Result<DecoderProcess>;
}

/// A running decoder: its output stream and, for real processes, the child
pub struct DecoderProcess {
    /// Decoder stdout
    pub output: DecoderOutput,
    /// OS process handle (None for in-memory sources)
    pub child: Option<DecoderChild>,
}

impl DecoderProcess {
    /// Wrap a spawned child, taking ownership of its stdout
    pub fn from_child(camera_id: &str, mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamError::spawn_failure(camera_id, "decoder stdout not captured"))?;

        Ok(Self {
            output: Box::new(stdout),
            child: Some(DecoderChild::new(child)),
        })
    }

    /// Wrap an arbitrary reader with no process behind it
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            output: Box::new(reader),
            child: None,
        }
    }

    /// OS process id, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.pid)
    }
}

/// Owned decoder child process
#[derive(Debug)]
pub struct DecoderChild {
    child: Child,
    pid: Option<u32>,
}

impl DecoderChild {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self { child, pid }
    }

    /// Process id at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking exit check
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        self.child.wait().await.ok()
    }

    /// Stop the process gracefully (SIGTERM, then SIGKILL after `grace`)
    pub async fn terminate(&mut self, grace: Duration) -> Option<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Some(status);
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = ?self.pid, code = ?status.code(), "Decoder exited");
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::error!(pid = ?self.pid, error = %e, "Error waiting for decoder");
                None
            }
            Err(_) => {
                tracing::warn!(
                    pid = ?self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "Decoder did not exit gracefully, forcing kill"
                );
                let _ = self.child.kill().await;
                self.child.try_wait().ok().flatten()
            }
        }
    }
}

/// Spawns the configured decoder program with stdout piped
#[derive(Debug, Clone, Default)]
pub struct CommandSpawner {
    decoder: DecoderConfig,
}

impl CommandSpawner {
    pub fn new(decoder: DecoderConfig) -> Self {
        Self { decoder }
    }

    pub fn decoder(&self) -> &DecoderConfig {
        &self.decoder
    }
}

impl DecoderSpawner for CommandSpawner {
    fn spawn(&self, camera_id: &str, input_url: &str) -> Result<DecoderProcess> {
        let args = self.decoder.render(input_url);

        tracing::debug!(
            camera = %camera_id,
            command = %self.decoder.command_line(input_url),
            "Spawning decoder"
        );

        let child = Command::new(&self.decoder.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StreamError::spawn_failure(camera_id, e))?;

        DecoderProcess::from_child(camera_id, child)
    }
}
