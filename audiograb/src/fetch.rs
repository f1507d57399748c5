use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Audio container produced by download requests.
pub const AUDIO_FORMAT: &str = "m4a";

/// Caption language requested from the transcript fetcher.
pub const CAPTION_LANGUAGE: &str = "en";

/// Caption format the transcript fetcher converts to.
pub const CAPTION_FORMAT: &str = "srt";

/// The external tool that does the actual media work.
///
/// Both operations are black boxes to the service: they either succeed and
/// leave files in the store, or fail with an upstream error. No retries.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` and transcode its audio track into exactly `output`.
    async fn fetch_audio(&self, url: &str, output: &Path) -> Result<()>;

    /// Fetch captions for `url` into files named `output_prefix.<lang>.<ext>`.
    ///
    /// Succeeding without writing anything is normal: the media simply has
    /// no captions in the requested language.
    async fn fetch_captions(&self, url: &str, output_prefix: &Path) -> Result<()>;
}

/// Validate that a string looks like a URL.
/// Rejects anything that isn't http:// or https://.
pub fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidUrl(trimmed.to_string()))
    }
}

#[cfg(feature = "download")]
pub use ytdlp::YtDlp;

#[cfg(feature = "download")]
mod ytdlp {
    use std::ffi::OsString;
    use std::io;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use tracing::{debug, info, warn};

    use super::{validate_url, MediaFetcher, AUDIO_FORMAT, CAPTION_FORMAT, CAPTION_LANGUAGE};
    use crate::config::ServiceConfig;
    use crate::error::{Error, Result};

    /// Longest stderr excerpt kept in errors and logs.
    const STDERR_LIMIT: usize = 1000;

    /// yt-dlp, with ffmpeg doing the transcoding behind it.
    ///
    /// # Security
    /// - URL is validated to start with http:// or https://
    /// - Arguments are passed to yt-dlp via `.arg()` (no shell expansion)
    /// - `--no-exec` prevents yt-dlp from running post-processing commands
    /// - Output names come from the store, never from the request
    #[derive(Debug, Clone)]
    pub struct YtDlp {
        program: PathBuf,
        ffmpeg_location: PathBuf,
    }

    impl YtDlp {
        pub fn new(program: impl Into<PathBuf>, ffmpeg_location: impl Into<PathBuf>) -> Self {
            Self {
                program: program.into(),
                ffmpeg_location: ffmpeg_location.into(),
            }
        }

        pub fn from_config(config: &ServiceConfig) -> Self {
            Self::new(&config.yt_dlp, &config.ffmpeg_location)
        }

        /// Run `yt-dlp --version`. Used once at startup to report a missing tool early.
        pub async fn version(&self) -> Result<String> {
            let output = tokio::process::Command::new(&self.program)
                .arg("--version")
                .output()
                .await
                .map_err(|e| self.spawn_error(e))?;
            if !output.status.success() {
                return Err(Error::Download(format!(
                    "yt-dlp --version exited with {}",
                    output.status
                )));
            }
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }

        fn audio_args(&self, url: &str, output: &Path) -> Vec<OsString> {
            let mut args: Vec<OsString> = [
                "--format",
                "m4a/bestaudio/best",
                "--extract-audio",
                "--audio-format",
                AUDIO_FORMAT,
                "--no-playlist",
                "--no-exec",
            ]
            .into_iter()
            .map(OsString::from)
            .collect();
            self.push_common(&mut args, output);
            args.push(url.into());
            args
        }

        fn caption_args(&self, url: &str, output_prefix: &Path) -> Vec<OsString> {
            let mut args: Vec<OsString> = [
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                CAPTION_LANGUAGE,
                "--convert-subs",
                CAPTION_FORMAT,
                "--no-warnings",
                "--no-playlist",
                "--no-exec",
            ]
            .into_iter()
            .map(OsString::from)
            .collect();
            self.push_common(&mut args, output_prefix);
            args.push(url.into());
            args
        }

        fn push_common(&self, args: &mut Vec<OsString>, output: &Path) {
            args.push("--ffmpeg-location".into());
            args.push(self.ffmpeg_location.clone().into_os_string());
            args.push("--output".into());
            args.push(escape_template(output));
        }

        async fn run(&self, url: &str, args: Vec<OsString>) -> Result<()> {
            debug!(program = %self.program.display(), ?args, "spawning yt-dlp");
            let output = tokio::process::Command::new(&self.program)
                .args(&args)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| self.spawn_error(e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                // Limit error message length to avoid dumping huge stderr
                let stderr_truncated: String = stderr.chars().take(STDERR_LIMIT).collect();
                warn!(%url, status = %output.status, stderr = %stderr_truncated, "yt-dlp failed");
                return Err(Error::Download(format!(
                    "yt-dlp exited with {}: {stderr_truncated}",
                    output.status
                )));
            }
            Ok(())
        }

        fn spawn_error(&self, e: io::Error) -> Error {
            if e.kind() == io::ErrorKind::NotFound {
                Error::YtDlpNotFound {
                    path: self.program.clone(),
                }
            } else {
                Error::Io(e)
            }
        }
    }

    #[async_trait]
    impl MediaFetcher for YtDlp {
        async fn fetch_audio(&self, url: &str, output: &Path) -> Result<()> {
            validate_url(url)?;
            let url = url.trim();
            info!(%url, output = %output.display(), "downloading audio");
            self.run(url, self.audio_args(url, output)).await
        }

        async fn fetch_captions(&self, url: &str, output_prefix: &Path) -> Result<()> {
            validate_url(url)?;
            let url = url.trim();
            info!(%url, prefix = %output_prefix.display(), "fetching captions");
            self.run(url, self.caption_args(url, output_prefix)).await
        }
    }

    /// yt-dlp treats `%` in `--output` as a template field.
    fn escape_template(path: &Path) -> OsString {
        let raw = path.as_os_str();
        match raw.to_str() {
            Some(s) if s.contains('%') => s.replace('%', "%%").into(),
            _ => raw.to_os_string(),
        }
    }

}
