//! Media URL in, audio or caption file out.
//!
//! **audiograb** is the library behind the audiograb HTTP service. It hands
//! media URLs to yt-dlp (which uses ffmpeg for transcoding), keeps the
//! resulting files in a plain directory, serves them back, and evicts them
//! once they are older than the retention window.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> audiograb::Result<()> {
//! use std::sync::Arc;
//!
//! use audiograb::{ArtifactStore, Janitor, ServiceConfig, YtDlp};
//!
//! let config = ServiceConfig::new().download_dir("./downloads");
//! let store = ArtifactStore::open(&config.download_dir)?;
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let janitor = Janitor::from_config(store.clone(), &config).spawn(shutdown_rx);
//!
//! let state = audiograb::routes::AppState::new(
//!     store,
//!     Arc::new(YtDlp::from_config(&config)),
//!     config.port,
//! );
//! let app = audiograb::routes::router(state);
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//! axum::serve(listener, app).await?;
//!
//! shutdown_tx.send_replace(true);
//! let _ = janitor.await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod janitor;
pub mod media;
pub mod naming;
pub mod routes;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Error, Result};
#[cfg(feature = "download")]
pub use fetch::YtDlp;
pub use fetch::MediaFetcher;
pub use janitor::{Janitor, SweepReport};
pub use naming::generate_name;
pub use store::{Artifact, ArtifactReader, ArtifactStore};
