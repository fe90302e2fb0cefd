//! Server role - accepts uploads and stores them under the save root.
//!
//! Every accepted connection gets its own task running a
//! [`ConnectionHandler`]. There is no connection limit and no timeout; the
//! accept loop never waits on a handler.

pub mod handler;
pub mod path;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::verify::Verifier;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

pub use handler::{Completed, ConnectionHandler, HandlerError, HandlerState, SavedFile};

pub struct Server {
    listener: TcpListener,
    handler: ConnectionHandler,
}

impl Server {
    /// Bind the configured address and make sure the save root exists.
    pub async fn bind(config: &Config, verifier: Verifier) -> Result<Self> {
        let save_root = config.save_root();
        Self::bind_addr(&config.listen_addr(), save_root, verifier).await
    }

    pub async fn bind_addr(addr: &str, save_root: PathBuf, verifier: Verifier) -> Result<Self> {
        if !save_root.exists() {
            tokio::fs::create_dir_all(&save_root).await?;
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SyncError::Connection(format!("listen on {} failed: {}", addr, e)))?;

        tracing::info!(
            addr = %listener.local_addr()?,
            root = %save_root.display(),
            "listening for uploads"
        );

        Ok(Self {
            listener,
            handler: ConnectionHandler::new(save_root, verifier),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Handlers already
    /// running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted
                    .map_err(|e| SyncError::Connection(format!("accept failed: {}", e)))?,
            };

            tracing::info!(%peer, "new upload coming");
            let handler = self.handler.clone();
            tokio::spawn(async move {
                match handler.handle(stream).await {
                    // Verification runs detached
                    Ok(done) => drop(done.verification),
                    Err(e) => tracing::warn!(%peer, state = %e.state, error = %e.source, "upload abandoned"),
                }
            });
        }
    }
}

/// Server entry point: serve until Ctrl-C.
pub async fn run_server(config: &Config) -> Result<()> {
    let server = Server::bind(config, Verifier::default()).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
}
