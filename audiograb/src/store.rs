//! Directory-backed artifact store.
//!
//! The filesystem is the only source of truth: there is no index, no lock and
//! no reservation. Every listing, lookup, read and delete in the crate goes
//! through [`ArtifactStore`] so the error policy lives in one place.
//!
//! Lookups race with the janitor. A file that disappears between a listing
//! and a read surfaces as [`Error::NotFound`], never as a partial read: once
//! a file is open its contents stay readable even if it is unlinked.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A stored file, as observed at lookup time.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub len: u64,
    pub last_modified: SystemTime,
}

impl Artifact {
    fn from_metadata(name: &str, path: PathBuf, meta: &std::fs::Metadata) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            path,
            len: meta.len(),
            last_modified: meta.modified()?,
        })
    }
}

/// An artifact opened for reading.
pub struct ArtifactReader {
    pub artifact: Artifact,
    file: File,
}

impl ArtifactReader {
    /// Stream the file contents in chunks.
    pub fn into_stream(self) -> ReaderStream<File> {
        ReaderStream::new(self.file)
    }
}

/// Artifact store rooted at a single directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: Arc<PathBuf>,
}

impl ArtifactStore {
    /// Open the store, creating the root directory if needed.
    ///
    /// Fails if the directory cannot be created or is not writable. Callers
    /// treat this as fatal: the service cannot run without its store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_root_exists(&root)?;
        info!(root = %root.display(), "artifact store ready");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `name` inside the store.
    ///
    /// Only single, plain path components are accepted; anything that could
    /// escape the root is rejected.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Look up an artifact by its exact name.
    pub async fn resolve_exact(&self, name: &str) -> Result<Artifact> {
        let path = self.path_of(name)?;
        stat_file(name, path).await
    }

    /// Find the first entry named `prefix*<suffix>` for one of `suffixes`.
    ///
    /// Candidates are tried in directory-listing order, which the filesystem
    /// defines and does not keep stable. If several entries match, which one
    /// wins is unspecified. Entries that vanish before they can be inspected
    /// are skipped.
    pub async fn resolve_by_prefix(&self, prefix: &str, suffixes: &[&str]) -> Result<Artifact> {
        for name in self.list_all().await? {
            if !name.starts_with(prefix) || !suffixes.iter().any(|s| name.ends_with(s)) {
                continue;
            }
            match self.resolve_exact(&name).await {
                Err(Error::NotFound { .. }) => {
                    debug!(%name, "prefix candidate vanished before lookup");
                }
                other => return other,
            }
        }
        Err(Error::not_found(format!("{prefix}*")))
    }

    /// Every entry name currently in the root, in listing order.
    pub async fn list_all(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.root.as_path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// List the root and look up every entry by its listed path.
    ///
    /// Entry names are not validated, so files that could never be requested
    /// by name are still reachable here. Each entry carries its own lookup
    /// result; directories and entries gone since the listing are `NotFound`.
    pub async fn scan(&self) -> Result<Vec<(String, Result<Artifact>)>> {
        let mut entries = tokio::fs::read_dir(self.root.as_path()).await?;
        let mut scanned = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let artifact = stat_file(&name, entry.path()).await;
            scanned.push((name, artifact));
        }
        Ok(scanned)
    }

    /// Open an artifact for streaming.
    pub async fn read_bytes(&self, name: &str) -> Result<ArtifactReader> {
        let path = self.path_of(name)?;
        let file = File::open(&path).await.map_err(|e| io_error(name, e))?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(Error::not_found(name));
        }
        let artifact = Artifact::from_metadata(name, path, &meta)?;
        Ok(ArtifactReader { artifact, file })
    }

    /// Read a whole artifact as UTF-8 text.
    pub async fn read_text(&self, name: &str) -> Result<String> {
        let mut reader = self.read_bytes(name).await?;
        let mut text = String::with_capacity(reader.artifact.len as usize);
        reader.file.read_to_string(&mut text).await?;
        Ok(text)
    }

    /// Remove one artifact.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(name, e))?;
        debug!(%name, "artifact deleted");
        Ok(())
    }

    /// Remove an artifact found by [`ArtifactStore::scan`], by its listed path.
    pub(crate) async fn remove(&self, artifact: &Artifact) -> Result<()> {
        tokio::fs::remove_file(&artifact.path)
            .await
            .map_err(|e| io_error(&artifact.name, e))?;
        debug!(name = %artifact.name, "artifact deleted");
        Ok(())
    }

    /// Best-effort removal of every file whose name starts with `prefix`.
    ///
    /// Used after a failed fetch so that nothing half-written stays visible
    /// under the generated name. Returns the number of files removed.
    pub async fn discard_prefix(&self, prefix: &str) -> usize {
        let names = match self.list_all().await {
            Ok(names) => names,
            Err(e) => {
                warn!(%prefix, error = %e, "failed to list store while discarding partial artifacts");
                return 0;
            }
        };

        let mut removed = 0;
        for name in names.iter().filter(|n| n.starts_with(prefix)) {
            match self.delete(name).await {
                Ok(()) => removed += 1,
                Err(Error::NotFound { .. }) => {}
                Err(e) => warn!(%name, error = %e, "failed to discard partial artifact"),
            }
        }
        if removed > 0 {
            info!(%prefix, removed, "discarded partial artifacts");
        }
        removed
    }
}

fn ensure_root_exists(root: &Path) -> Result<()> {
    let unusable = |reason: String| Error::StorageRoot {
        path: root.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(root).map_err(|e| unusable(format!("cannot create directory: {e}")))?;

    let meta = std::fs::metadata(root).map_err(|e| unusable(e.to_string()))?;
    if !meta.is_dir() {
        return Err(unusable("not a directory".into()));
    }

    // Writability is checked with a real write, not permission bits.
    let probe = root.join(format!(".audiograb-probe-{}", std::process::id()));
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| unusable(format!("directory is not writable: {e}")))?;
    if let Err(e) = std::fs::remove_file(&probe) {
        warn!(path = %probe.display(), error = %e, "failed to remove write probe");
    }

    Ok(())
}

async fn stat_file(name: &str, path: PathBuf) -> Result<Artifact> {
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| io_error(name, e))?;
    if !meta.is_file() {
        return Err(Error::not_found(name));
    }
    Artifact::from_metadata(name, path, &meta)
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal || name.contains(['/', '\\']) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

fn io_error(name: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found(name)
    } else {
        Error::Io(e)
    }
}
