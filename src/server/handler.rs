//! Per-connection receive state machine.
//!
//! ```text
//! ReceivingName -> ReceivingPath -> Preparing -> Opening -> Streaming -> Completing
//! ```
//!
//! Any failure ends the connection in the state where it happened. Nothing
//! is reported back to the client, and a file that failed mid-stream is
//! left on disk as-is.

use crate::error::SyncError;
use crate::protocol::recv_string;
use crate::server::path::{derived_name, resolve_save_path, today};
use crate::verify::{VerificationHandle, Verifier};
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    ReceivingName,
    ReceivingPath,
    Preparing,
    Opening,
    Streaming,
    Completing,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlerState::ReceivingName => "receiving name",
            HandlerState::ReceivingPath => "receiving path",
            HandlerState::Preparing => "preparing",
            HandlerState::Opening => "opening",
            HandlerState::Streaming => "streaming",
            HandlerState::Completing => "completing",
        };
        f.write_str(s)
    }
}

/// A connection abandoned in `state`.
#[derive(Debug, thiserror::Error)]
#[error("upload abandoned while {state}: {source}")]
pub struct HandlerError {
    pub state: HandlerState,
    #[source]
    pub source: SyncError,
}

/// File written by a finished connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct Completed {
    pub saved: SavedFile,
    /// Deferred checksum of `saved.path`. Dropping it leaves the check
    /// running unobserved.
    pub verification: VerificationHandle,
}

/// Receives uploads into a save root. Cheap to clone; one clone per
/// connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    save_root: Arc<PathBuf>,
    verifier: Verifier,
    fixed_date: Option<NaiveDate>,
}

impl ConnectionHandler {
    pub fn new(save_root: PathBuf, verifier: Verifier) -> Self {
        Self {
            save_root: Arc::new(save_root),
            verifier,
            fixed_date: None,
        }
    }

    /// Use `date` instead of the current day when naming files.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    /// Run one upload to completion.
    pub async fn handle<S>(&self, mut stream: S) -> Result<Completed, HandlerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();
        let mut state = HandlerState::ReceivingName;

        macro_rules! step {
            ($expr:expr) => {
                $expr.map_err(|e| HandlerError {
                    state,
                    source: e.into(),
                })?
            };
        }

        let file_name = step!(recv_string(&mut stream).await);
        tracing::debug!(%file_name, "received file name");

        state = HandlerState::ReceivingPath;
        let file_path = step!(recv_string(&mut stream).await);
        tracing::debug!(%file_path, "received destination path");

        state = HandlerState::Preparing;
        let date = self.fixed_date.unwrap_or_else(today);
        let name = derived_name(&file_name, date);
        let save_path = step!(resolve_save_path(&self.save_root, &file_path, &name).await);
        tracing::info!(path = %save_path.display(), "will save file");

        state = HandlerState::Opening;
        let mut file = step!(
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&save_path)
                .await
        );

        state = HandlerState::Streaming;
        let bytes = step!(tokio::io::copy(&mut stream, &mut file).await);
        step!(file.flush().await);

        state = HandlerState::Completing;
        tracing::debug!(%state, bytes, "body received");
        drop(file);
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "connection shutdown failed");
        }
        drop(stream);

        let verification = self.verifier.schedule(save_path.clone());
        tracing::info!(
            path = %save_path.display(),
            bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upload complete"
        );

        Ok(Completed {
            saved: SavedFile {
                path: save_path,
                bytes,
            },
            verification,
        })
    }
}
