//! cloudshelf
//!
//! Upload files through a browser form, keep them in a cloud bucket, list
//! them, and hand out signed download links.
//!
//! # Features
//!
//! - **Upload form**: `GET /` and `POST /upload` (multipart, field `file`)
//! - **Listing**: `GET /files` renders every object in the bucket
//! - **Downloads**: `GET /download/{name}` redirects to a time-limited signed URL
//! - **Backends**: Google Cloud Storage, S3-compatible, or in-memory
//!
//! # Example
//!
//! ```no_run
//! use cloudshelf::{config::Config, server::Server, storage::build_store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = build_store(&config.storage).await?;
//!     let server = Server::new(config, store).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod router;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod upload;
pub mod views;

// Re-export commonly used types
pub use config::Config;
pub use server::{AppState, Server};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
