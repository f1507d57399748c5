use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use audiograb::routes::{router, AppState};
use audiograb::{ArtifactStore, Janitor, ServiceConfig, YtDlp};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "audiograb-server",
    about = "Download audio and captions from media URLs over HTTP",
    version
)]
struct Cli {
    /// Directory where downloaded files are stored.
    #[arg(long, env = "DOWNLOAD_PATH", default_value = audiograb::config::DEFAULT_DOWNLOAD_DIR)]
    download_path: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = audiograb::config::DEFAULT_PORT)]
    port: u16,

    /// ffmpeg binary used for transcoding.
    #[arg(long, env = "FFMPEG_LOCATION", default_value = audiograb::config::DEFAULT_FFMPEG_LOCATION)]
    ffmpeg_location: PathBuf,

    /// yt-dlp executable.
    #[arg(long, env = "YT_DLP_PATH", default_value = audiograb::config::DEFAULT_YT_DLP)]
    yt_dlp: PathBuf,

    /// Seconds a file is kept before eviction.
    #[arg(long, env = "RETENTION_SECS", default_value_t = 3600)]
    retention_secs: u64,

    /// Seconds between eviction sweeps.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 600)]
    sweep_interval_secs: u64,
}

impl Cli {
    fn into_config(self) -> audiograb::Result<ServiceConfig> {
        ServiceConfig::new()
            .download_dir(self.download_path)
            .host(self.host)
            .port(self.port)
            .ffmpeg_location(self.ffmpeg_location)
            .yt_dlp(self.yt_dlp)
            .retention(Duration::from_secs(self.retention_secs))?
            .sweep_interval(Duration::from_secs(self.sweep_interval_secs))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("audiograb=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // The service cannot run without its store.
    let store = match ArtifactStore::open(&config.download_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let fetcher = YtDlp::from_config(&config);
    match fetcher.version().await {
        Ok(version) => info!(%version, "yt-dlp available"),
        Err(e) => warn!(error = %e, "yt-dlp unavailable, downloads will fail"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let janitor = Janitor::from_config(store.clone(), &config).spawn(shutdown_rx);

    let app = router(AppState::new(store, Arc::new(fetcher), config.port));

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error binding to {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, root = %config.download_dir.display(), "downloader service listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown_tx.send_replace(true);
    if let Err(e) = janitor.await {
        warn!(error = %e, "janitor task ended abnormally");
    }

    if let Err(e) = served {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    info!("shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
