use std::path::PathBuf;

/// All errors that can occur in audiograb.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("artifact not found: {name}")]
    NotFound { name: String },

    #[error("invalid artifact name: \"{0}\"")]
    InvalidName(String),

    #[error("invalid URL (must start with http:// or https://): {0}")]
    InvalidUrl(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[cfg(feature = "download")]
    #[error("download error: {0}")]
    Download(String),

    #[cfg(feature = "download")]
    #[error("yt-dlp not found at {path}, install with: pip install yt-dlp")]
    YtDlpNotFound { path: PathBuf },

    #[error("artifact root {path} is unusable: {reason}")]
    StorageRoot { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error came from the external download/caption tool rather
    /// than from the store or the caller's input.
    pub fn is_upstream(&self) -> bool {
        match self {
            #[cfg(feature = "download")]
            Error::Download(_) | Error::YtDlpNotFound { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let e = Error::not_found("1700000000000.42.m4a");
        assert_eq!(e.to_string(), "artifact not found: 1700000000000.42.m4a");
    }

    #[test]
    fn test_error_display_invalid_name() {
        let e = Error::InvalidName("../etc/passwd".into());
        assert!(e.to_string().contains("../etc/passwd"));
    }

    #[test]
    fn test_error_display_storage_root() {
        let e = Error::StorageRoot {
            path: PathBuf::from("/readonly/downloads"),
            reason: "directory is read-only".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/readonly/downloads"));
        assert!(msg.contains("read-only"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("denied"));
    }

    #[test]
    fn test_not_found_is_not_upstream() {
        assert!(!Error::not_found("x").is_upstream());
        assert!(!Error::InvalidUrl("ftp://x".into()).is_upstream());
    }

    #[cfg(feature = "download")]
    #[test]
    fn test_download_is_upstream() {
        assert!(Error::Download("yt-dlp exited with status 1".into()).is_upstream());
        assert!(Error::YtDlpNotFound {
            path: PathBuf::from("yt-dlp")
        }
        .is_upstream());
    }

    #[test]
    fn test_error_debug_impl() {
        let e = Error::InvalidOption("retention must be non-zero".into());
        let debug = format!("{:?}", e);
        assert!(debug.contains("InvalidOption"));
    }
}
