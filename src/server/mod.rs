//! HTTP server
//!
//! A hyper HTTP/1.1 accept loop. Each connection runs on its own tokio task
//! and shares one immutable [`AppState`].
//!
//! ```no_run
//! use cloudshelf::config::Config;
//! use cloudshelf::server::Server;
//! use cloudshelf::storage::build_store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let store = build_store(&config.storage).await?;
//! let server = Server::new(config, store).await?;
//! println!("listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::handle_request;

use crate::config::Config;
use crate::storage::ObjectStore;
use crate::upload::staging::staging_dir;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

/// State shared by every request
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Directory staging files are written to
    pub fn staging_dir(&self) -> PathBuf {
        staging_dir(self.config.upload.staging_dir.as_deref())
    }
}

/// HTTP Server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the configured address
    ///
    /// Port 0 lets the OS pick; see [`Server::local_addr`].
    pub async fn new(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self, ServerError> {
        let addr = config
            .server
            .socket_addr()
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(AppState::new(config, store)),
            listener,
            local_addr,
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// Stops accepting new connections once `shutdown` resolves; connections
    /// already accepted finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            backend = self.state.store.backend_name(),
            "Serving on http://{}", self.local_addr
        );
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<Incoming>| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(handle_request(req, state).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        LoggingConfig, MetricsConfig, ServerConfig, StorageBackend, StorageConfig, UploadConfig,
    };
    use crate::storage::MemoryStore;

    fn test_config(address: &str) -> Config {
        Config {
            server: ServerConfig {
                address: address.into(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                bucket: "test".into(),
                service_account: None,
                s3: None,
            },
            upload: UploadConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let store = Arc::new(MemoryStore::new("test"));
        let server = Server::new(test_config("127.0.0.1:0"), store).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_server_invalid_address() {
        let store = Arc::new(MemoryStore::new("test"));
        let result = Server::new(test_config("invalid"), store).await;
        assert!(matches!(result, Err(ServerError::BindError(_))));
    }

    #[tokio::test]
    async fn test_run_until_returns_on_shutdown() {
        let store = Arc::new(MemoryStore::new("test"));
        let server = Server::new(test_config("127.0.0.1:0"), store).await.unwrap();
        server.run_until(async {}).await.unwrap();
    }

    #[test]
    fn test_staging_dir_defaults_to_temp() {
        let state = AppState::new(test_config("127.0.0.1:0"), Arc::new(MemoryStore::new("t")));
        assert_eq!(state.staging_dir(), std::env::temp_dir());
    }
}
