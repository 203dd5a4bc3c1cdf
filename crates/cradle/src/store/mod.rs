//! Storage layer for cradle.
//!
//! Durable state is a handful of JSON collection files plus two blob
//! directories. Each collection is one JSON object mapping record IDs to
//! records. Loads are lazy (a missing collection is created empty) and every
//! save rewrites the whole collection through a temp file and a rename, so a
//! crash mid-write leaves the previous contents intact.

pub mod blobs;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

pub use blobs::{sanitize_file_name, BlobStore};

/// The contents of one collection, in file order.
pub type Records = serde_json::Map<String, Value>;

/// Named collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Accounts keyed by normalized email.
    Users,
    /// Child records keyed by child ID.
    Children,
    /// Monotonic ID counters keyed by collection name.
    Sequences,
}

impl Collection {
    /// All collections, in a fixed order.
    pub const ALL: [Self; 3] = [Self::Users, Self::Children, Self::Sequences];
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Users => write!(f, "users"),
            Self::Children => write!(f, "children"),
            Self::Sequences => write!(f, "sequences"),
        }
    }
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Registered accounts.
    pub users: usize,
    /// Child records across all owners.
    pub children: usize,
}

/// File-backed JSON collection store.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
    users_file: String,
    children_file: String,
    sequences_file: String,
}

impl JsonStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn open(root: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        ensure_dir(&root)?;

        debug!("Opened JSON store at {}", root.display());
        Ok(Self {
            root,
            users_file: config.users_file.clone(),
            children_file: config.children_file.clone(),
            sequences_file: config.sequences_file.clone(),
        })
    }

    /// Get the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the backing file of a collection.
    #[must_use]
    pub fn path(&self, collection: Collection) -> PathBuf {
        let name = match collection {
            Collection::Users => &self.users_file,
            Collection::Children => &self.children_file,
            Collection::Sequences => &self.sequences_file,
        };
        self.root.join(name)
    }

    /// Load a collection.
    ///
    /// A collection with no backing file is materialized as `{}` and returned
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, or does not
    /// hold a JSON object.
    pub fn load(&self, collection: Collection) -> Result<Records> {
        let path = self.path(collection);

        if !path.exists() {
            debug!("Materializing empty {} collection", collection);
            let records = Records::new();
            self.save(collection, &records)?;
            return Ok(records);
        }

        let raw = fs::read_to_string(&path).map_err(|source| Error::CollectionRead {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Records::new());
        }

        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(records) => {
                debug!("Loaded {} {} records", records.len(), collection);
                Ok(records)
            }
            other => Err(Error::CorruptCollection {
                path,
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
        }
    }

    /// Replace the full contents of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, collection: Collection, records: &Records) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path(collection), &bytes)?;
        debug!("Saved {} {} records", records.len(), collection);
        Ok(())
    }

    /// Count records per collection.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be loaded.
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            users: self.load(Collection::Users)?.len(),
            children: self.load(Collection::Children)?.len(),
        })
    }
}

/// Create `dir` and its parents if missing.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
        info!("Created directory {}", dir.display());
    }
    Ok(())
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .ok_or_else(|| Error::internal(format!("no file name in {}", path.display())))?;
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, bytes).map_err(|source| Error::FileWrite {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
