//! Binary artifact storage.
//!
//! Photos and rendered identification images live as plain files in their
//! own directories, named after the child ID. Blob writes are independent of
//! collection writes, so an orphaned blob is a normal state.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ensure_dir, write_atomic};
use crate::error::{Error, Result};

/// Fallback name for uploads whose name has no usable final component.
const DEFAULT_UPLOAD_NAME: &str = "upload";

/// A directory of binary blobs addressed by file name.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Open a blob directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    /// Get the blob directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path a blob with this name would have.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(sanitize_file_name(name))
    }

    /// Write (or overwrite) a blob and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        write_atomic(&path, bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read a blob, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::CollectionRead { path, source }),
        }
    }

    /// Count the blobs in the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            if entry?.path().is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Reduce an uploaded file name to a safe final path component.
///
/// Directory parts are dropped so a name like `../../etc/passwd` cannot
/// escape the blob directory.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if last.is_empty() || last == "." || last == ".." {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        last.to_string()
    }
}
