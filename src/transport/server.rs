//! # TCP Server
//!
//! Accepts client connections and runs each one as its own task.
//!
//! Shutdown is driven by a [`CancellationToken`]: cancelling it stops the
//! accept loop, and every connection holds a child token that unblocks its
//! pending read. Connections get `shutdown_timeout` to finish what they are
//! writing before the remaining tasks are aborted.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{DocwireConfig, ServerConfig};
use crate::error::Result;
use crate::protocol::registry::ResponderRegistry;
use crate::transport::connection::Connection;
use crate::transport::environment::ServerEnvironment;

/// Wire protocol server over TCP
pub struct Server<B> {
    config: ServerConfig,
    env: Arc<ServerEnvironment<B>>,
}

impl<B> Server<B>
where
    B: Send + Sync + 'static,
{
    pub fn new(config: &DocwireConfig, registry: ResponderRegistry<B>, backend: B) -> Self {
        Self {
            config: config.server.clone(),
            env: Arc::new(ServerEnvironment::new(backend, registry, config)),
        }
    }

    /// Shared state handed to every connection; exposes the metrics.
    pub fn environment(&self) -> Arc<ServerEnvironment<B>> {
        Arc::clone(&self.env)
    }

    /// Bind the configured address and serve until CTRL+C.
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.address).await?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                signal.cancel();
            }
        });

        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` is cancelled.
    #[instrument(skip_all)]
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        info!(address = %listener.local_addr()?, "Listening");

        let limit = Arc::new(Semaphore::new(self.config.max_connections));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Connection task panicked");
                        }
                    }
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                                warn!(peer = %peer, "Connection limit reached, refusing connection");
                                self.env.metrics().connection_rejected();
                                continue;
                            };
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(error = %e, "Failed to set TCP_NODELAY");
                            }

                            let guard = ConnectionGuard::new(Arc::clone(&self.env), permit);
                            let connection = Connection::new(
                                stream,
                                peer.to_string(),
                                Arc::clone(&self.env),
                                shutdown.child_token(),
                            );
                            debug!(peer = %peer, "Accepted connection");

                            connections.spawn(async move {
                                let _guard = guard;
                                let _ = connection.run().await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        info!(
            connections = connections.len(),
            "Shutting down server. Waiting for connections to close..."
        );

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "Shutdown timeout reached, aborting connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        } else {
            info!("All connections closed, shutting down");
        }

        self.env.metrics().log_metrics();
        Ok(())
    }
}

/// Keeps the connection counted as active and holds its slot under the
/// connection limit until the task finishes or is aborted.
struct ConnectionGuard<B> {
    env: Arc<ServerEnvironment<B>>,
    _permit: OwnedSemaphorePermit,
}

impl<B> ConnectionGuard<B> {
    fn new(env: Arc<ServerEnvironment<B>>, permit: OwnedSemaphorePermit) -> Self {
        env.metrics().connection_established();
        Self {
            env,
            _permit: permit,
        }
    }
}

impl<B> Drop for ConnectionGuard<B> {
    fn drop(&mut self) {
        self.env.metrics().connection_closed();
    }
}
