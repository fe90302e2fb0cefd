//! Wire codec for upload connections.
//!
//! One connection carries exactly one file:
//!
//! ```text
//! [i64 BE len][len bytes: file name (UTF-8)]
//! [i64 BE len][len bytes: destination sub-path (UTF-8)]
//! [raw file body until the sender closes its write half]
//! ```
//!
//! The body has no length field. End of body is end of stream.

use crate::error::{Result, SyncError};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix in front of every string.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// Upper bound on a decoded string (64KB). Metadata strings are short;
/// anything larger is treated as a corrupt or hostile prefix.
pub const MAX_STRING_LEN: usize = 64 * 1024;

// =============================================================================
// Strings
// =============================================================================

/// Encode a length-prefixed string.
pub fn encode_string(value: &str) -> Bytes {
    let raw = value.as_bytes();
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + raw.len());
    buf.put_i64(raw.len() as i64);
    buf.put_slice(raw);
    buf.freeze()
}

/// Write a length-prefixed string to the stream.
pub async fn send_string<W: AsyncWrite + Unpin>(w: &mut W, value: &str) -> Result<()> {
    w.write_all(&encode_string(value)).await?;
    Ok(())
}

/// Read a length-prefixed string from the stream.
///
/// Keeps reading until the whole declared length has arrived, so a string
/// split across several TCP segments is never truncated.
pub async fn recv_string<R: AsyncRead + Unpin>(r: &mut R) -> Result<String> {
    let len = r
        .read_i64()
        .await
        .map_err(|e| eof_as_protocol(e, "string length"))?;

    if len < 0 {
        return Err(SyncError::Protocol(format!(
            "negative string length {}",
            len
        )));
    }
    let len = len as usize;
    if len > MAX_STRING_LEN {
        return Err(SyncError::Protocol(format!(
            "string length {} exceeds maximum {}",
            len, MAX_STRING_LEN
        )));
    }

    let mut raw = vec![0u8; len];
    r.read_exact(&mut raw)
        .await
        .map_err(|e| eof_as_protocol(e, "string body"))?;

    String::from_utf8(raw).map_err(|_| SyncError::Protocol("invalid UTF-8 in string".to_string()))
}

fn eof_as_protocol(e: std::io::Error, what: &str) -> SyncError {
    if e.kind() == ErrorKind::UnexpectedEof {
        SyncError::Protocol(format!("connection closed while reading {}", what))
    } else {
        SyncError::Io(e)
    }
}

// =============================================================================
// Transfer header
// =============================================================================

/// Metadata sent ahead of the file body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    /// Client-side base name; the server only uses its extension.
    pub file_name: String,
    /// Destination directory relative to the server's save root.
    pub file_path: String,
}

impl TransferHeader {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            2 * LENGTH_PREFIX_SIZE + self.file_name.len() + self.file_path.len(),
        );
        buf.extend_from_slice(&encode_string(&self.file_name));
        buf.extend_from_slice(&encode_string(&self.file_path));
        buf.freeze()
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<()> {
        send_string(w, &self.file_name).await?;
        send_string(w, &self.file_path).await
    }
}

// =============================================================================
// Tests
// =============================================================================
