//! Post-write integrity check.
//!
//! After a connection finishes writing its file, the handler schedules a
//! BLAKE3 digest of the saved file. The check runs on its own task after a
//! fixed delay and only logs its result; nothing is compared or persisted.
//!
//! [`Verifier::schedule`] returns a [`VerificationHandle`]. Dropping the
//! handle detaches the task: the server does exactly that, so no caller
//! ever waits on a digest and process exit may cut a pending check short.
//! Tests keep the handle and [`wait`](VerificationHandle::wait) on it.

use crate::error::{Result, SyncError};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

/// Delay between a completed write and its checksum.
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(1);

/// Read buffer size while hashing (256KB)
const HASH_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    delay: Duration,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_DELAY)
    }
}

impl Verifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Spawn a deferred checksum of `path`.
    pub fn schedule(&self, path: PathBuf) -> VerificationHandle {
        let delay = self.delay;
        let task_path = path.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match checksum_file(&task_path).await {
                Ok(digest) => {
                    tracing::info!(path = %task_path.display(), %digest, "file checksum");
                    Ok(digest)
                }
                Err(e) => {
                    tracing::warn!(path = %task_path.display(), error = %e, "checksum failed");
                    Err(e)
                }
            }
        });
        VerificationHandle { path, task }
    }
}

/// A pending checksum task.
#[derive(Debug)]
pub struct VerificationHandle {
    path: PathBuf,
    task: JoinHandle<Result<String>>,
}

impl VerificationHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the digest.
    pub async fn wait(self) -> Result<String> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SyncError::Io(io::Error::new(
                ErrorKind::Interrupted,
                "checksum task cancelled",
            ))),
            Err(e) => Err(SyncError::Io(io::Error::other(e.to_string()))),
        }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Stream a file through BLAKE3 and return the lowercase hex digest.
pub async fn checksum_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            SyncError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::Io(e)
        }
    })?;

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}
