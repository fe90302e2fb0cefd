//! Client role - sends one local file to the server.
//!
//! The session writes the file's base name, the destination sub-path, and
//! then the raw file body, and closes its write half. The server sends no
//! reply, so a successful session only means the bytes left this process.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::protocol::TransferHeader;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// One outbound upload.
#[derive(Debug, Clone)]
pub struct TransferSession {
    source: PathBuf,
    dest_path: String,
}

impl TransferSession {
    pub fn new(source: impl Into<PathBuf>, dest_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest_path: dest_path.into(),
        }
    }

    /// Name sent on the wire: the last component of the source path.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Drive the send sequence over `conn` and close it. Returns the
    /// number of body bytes written.
    pub async fn send<W: AsyncWrite + Unpin>(&self, conn: &mut W) -> Result<u64> {
        let file = File::open(&self.source).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SyncError::FileNotFound {
                    path: self.source.clone(),
                }
            } else {
                SyncError::Io(e)
            }
        })?;

        TransferHeader::new(self.file_name(), self.dest_path.clone())
            .write_to(conn)
            .await?;

        let mut reader = BufReader::new(file);
        let bytes = tokio::io::copy(&mut reader, conn).await?;
        conn.shutdown().await?;

        Ok(bytes)
    }

    /// Connect to `addr` and send.
    pub async fn upload(&self, addr: &str) -> Result<u64> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| SyncError::Connection(format!("dial {} failed: {}", addr, e)))?;

        tracing::debug!(%addr, source = %self.source.display(), "connected");
        self.send(&mut stream).await
    }
}

/// Client entry point.
pub async fn run_client(config: &Config, file_name: &Path, file_path: &str) -> Result<()> {
    let addr = config.connect_addr()?;
    let session = TransferSession::new(file_name, file_path);

    let start = Instant::now();
    let bytes = session.upload(&addr).await?;

    tracing::info!(
        %addr,
        source = %file_name.display(),
        dest = file_path,
        bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "upload sent"
    );
    Ok(())
}
