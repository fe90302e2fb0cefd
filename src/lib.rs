//! Single-file upload over TCP.
//!
//! A client sends one file per connection; the server stores it as
//! `<save root>/<sub-path>/<YYYY-MM-DD><ext>` and logs a BLAKE3 checksum
//! of the saved file shortly afterwards.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod verify;

pub use config::{Config, Role};
pub use error::{Result, SyncError};
