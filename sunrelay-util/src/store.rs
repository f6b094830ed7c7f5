use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tracing::trace;

use super::fs::{run_async, safe_write_all};

const EXTENSION: &str = "json";

/// A filesystem backed store
///
/// This is a very simple mechanism for persisting JSON documents on disk.
/// Writes are atomic but the store does no locking of its own, callers
/// writing the same document concurrently must serialize those writes.
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("path must not have any `..` segments")]
    InvalidPath,
}

impl Store {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    // Constructs a full path for a given collection path
    fn with_root(&self, path: &Path) -> Result<PathBuf, StoreError> {
        let doc_path = path.strip_prefix("/").unwrap_or(path);

        // Reject any path with ".." or other non-normal components
        for component in doc_path.components() {
            if !matches!(component, std::path::Component::Normal(_)) {
                return Err(StoreError::InvalidPath);
            }
        }
        Ok(self.root.join(doc_path))
    }

    /// Create or update the document `key` in the collection at `path`
    pub async fn write<P: AsRef<Path>, V: Serialize>(
        &self,
        path: P,
        key: &str,
        value: &V,
    ) -> Result<(), StoreError> {
        let parent = self.with_root(path.as_ref())?;

        // ensure the parent exists, this will fail if the parent
        // exists but is not a directory
        fs::create_dir_all(parent.as_path()).await?;

        let full_path = parent.join(key).with_extension(EXTENSION);
        let buf = serde_json::to_vec(&value)?;
        trace!("writing {}", full_path.display());
        run_async(move || safe_write_all(full_path, buf)).await?;
        Ok(())
    }

    /// Read the document `key` from the collection at `path`
    pub async fn read<P: AsRef<Path>, V: DeserializeOwned>(
        &self,
        path: P,
        key: &str,
    ) -> Result<Option<V>, StoreError> {
        let full_path = self
            .with_root(path.as_ref())?
            .join(key)
            .with_extension(EXTENSION);
        trace!("reading {}", full_path.display());

        match fs::read(&full_path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice::<V>(&contents)?)),
            Err(err) => match err.kind() {
                io::ErrorKind::NotFound => Ok(None),
                _ => Err(err.into()),
            },
        }
    }

    /// List the keys of all documents in the collection at `path`.
    ///
    /// Files without the document extension (e.g. interrupted temporary
    /// writes) and non-unicode names are ignored. A missing collection is
    /// an empty collection.
    pub async fn list<P: AsRef<Path>>(&self, path: P) -> Result<Vec<String>, StoreError> {
        let full_path = self.with_root(path.as_ref())?;
        let mut dir_entries = match fs::read_dir(full_path).await {
            Ok(entries) => entries,
            Err(err) => match err.kind() {
                io::ErrorKind::NotFound => return Ok(Vec::new()),
                _ => return Err(err.into()),
            },
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(key.to_owned());
            }
        }
        keys.sort();

        Ok(keys)
    }
}
