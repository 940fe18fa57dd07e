// Destination storage for uploaded files
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::UploadError;

pub trait FileStore: Send + Sync {
    /// Directory reported to the operator as the save target.
    fn root(&self) -> &Path;
    /// Create (or truncate) `name` under the root and write `data` in one go.
    fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf, UploadError>;
}

pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskStore { dir: dir.into() }
    }
}

impl FileStore for DiskStore {
    fn root(&self) -> &Path {
        &self.dir
    }

    fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf, UploadError> {
        let path = self.dir.join(name);
        let f = File::create(&path)
            .map_err(|source| UploadError::FileOpen { path: path.clone(), source })?;
        write_or_discard(f, &path, data)?;
        Ok(path)
    }
}

/// Write `data` through `w`. On failure the partial file at `path` is
/// removed so a 500 never leaves a truncated upload behind.
pub fn write_or_discard(mut w: impl Write, path: &Path, data: &[u8]) -> Result<(), UploadError> {
    let Err(source) = w.write_all(data).and_then(|()| w.flush()) else {
        return Ok(());
    };
    drop(w);
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "cannot remove partial upload");
    }
    Err(UploadError::FileWrite { path: path.to_path_buf(), source })
}

/// Reject names that would resolve outside the storage directory.
pub fn check_file_name(name: &str) -> Result<(), UploadError> {
    let unsafe_name = name.contains(['/', '\\', '\0'])
        || Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if unsafe_name {
        return Err(UploadError::UnsafeFileName(name.to_string()));
    }
    Ok(())
}
