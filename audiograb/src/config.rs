use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default artifact root, relative to the working directory.
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default ffmpeg binary handed to yt-dlp for transcoding.
pub const DEFAULT_FFMPEG_LOCATION: &str = "/usr/bin/ffmpeg";

/// Default yt-dlp executable, resolved through `PATH`.
pub const DEFAULT_YT_DLP: &str = "yt-dlp";

/// Artifacts older than this are evicted (1 hour).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Time between two janitor sweeps (10 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Process-wide service configuration.
///
/// Built once at startup and handed to the store, the fetcher and the janitor.
/// Nothing in the crate reads the environment on its own; the server binary
/// is responsible for turning arguments and environment variables into a
/// `ServiceConfig`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory backing the artifact store.
    pub download_dir: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    /// ffmpeg binary used by yt-dlp for audio extraction and caption conversion.
    pub ffmpeg_location: PathBuf,
    pub yt_dlp: PathBuf,
    /// Maximum age of an artifact before the janitor removes it.
    pub retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            ffmpeg_location: PathBuf::from(DEFAULT_FFMPEG_LOCATION),
            yt_dlp: PathBuf::from(DEFAULT_YT_DLP),
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn ffmpeg_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = path.into();
        self
    }

    pub fn yt_dlp(mut self, path: impl Into<PathBuf>) -> Self {
        self.yt_dlp = path.into();
        self
    }

    /// Set the retention window. Must be non-zero.
    pub fn retention(mut self, retention: Duration) -> Result<Self> {
        if retention.is_zero() {
            return Err(Error::InvalidOption("retention must be non-zero".into()));
        }
        self.retention = retention;
        Ok(self)
    }

    /// Set the janitor sweep interval. Must be non-zero.
    pub fn sweep_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidOption(
                "sweep interval must be non-zero".into(),
            ));
        }
        self.sweep_interval = interval;
        Ok(self)
    }

    /// Socket address the HTTP server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = ServiceConfig::default();
        assert_eq!(config.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.ffmpeg_location, PathBuf::from("/usr/bin/ffmpeg"));
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServiceConfig::new()
            .download_dir("/srv/audio")
            .port(9000)
            .ffmpeg_location("/opt/ffmpeg/bin/ffmpeg")
            .yt_dlp("/opt/yt-dlp");
        assert_eq!(config.download_dir, PathBuf::from("/srv/audio"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.ffmpeg_location, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.yt_dlp, PathBuf::from("/opt/yt-dlp"));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let result = ServiceConfig::new().retention(Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let result = ServiceConfig::new().sweep_interval(Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServiceConfig::new()
            .host("127.0.0.1".parse().unwrap())
            .port(8123);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8123");
    }
}
