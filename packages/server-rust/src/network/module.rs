//! Network module with deferred startup lifecycle.
//!
//! `new()` records the configuration, `start()` binds the TCP listener and
//! reports the bound port, and `serve()` accepts connections until the
//! shutdown future resolves. Splitting bind from serve lets callers learn an
//! OS-assigned port before traffic starts.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;

/// Owns the HTTP listener.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
        }
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured one
    /// when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves `router` until `shutdown` resolves, then waits up to the drain
    /// timeout for in-flight requests.
    ///
    /// The peer address of every connection is made available to the
    /// pipeline as `ConnectInfo<SocketAddr>`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        self,
        router: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let drain_timeout = self.config.drain_timeout;

        let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown signalled, draining in-flight requests");
            let _ = drain_tx.send(());
        })
        .into_future();

        tokio::select! {
            result = server => result?,
            () = async {
                // Only starts counting once shutdown has begun.
                if drain_rx.await.is_ok() {
                    tokio::time::sleep(drain_timeout).await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {
                warn!("drain timeout expired with in-flight requests remaining");
            }
        }
        Ok(())
    }
}
