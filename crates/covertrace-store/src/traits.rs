//! ChunkStore trait: the abstract interface for downloaded key chunk blobs.
//!
//! Downloaded chunks only live between their download and the end of the
//! detection run that consumes them, so the interface is small: write a
//! named blob, read it back, delete it.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};

/// Where a stored chunk lives. Handed to the matching capability as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkLocation(PathBuf);

impl ChunkLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final path component, if it is valid UTF-8.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Reject names that would escape the store's namespace.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Async interface for chunk blob persistence.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store `data` under `name`, replacing any previous blob with that name.
    async fn write(&self, name: &str, data: Bytes) -> Result<ChunkLocation>;

    /// Read a blob back. `None` if nothing is stored there.
    async fn read(&self, location: &ChunkLocation) -> Result<Option<Bytes>>;

    /// Delete a blob. Returns whether something was removed; deleting a
    /// missing blob is not an error.
    async fn delete(&self, location: &ChunkLocation) -> Result<bool>;

    /// Every blob currently stored.
    async fn list(&self) -> Result<Vec<ChunkLocation>>;
}

/// Extension trait for common store patterns.
pub trait ChunkStoreExt: ChunkStore {
    /// Delete every location, returning how many blobs were removed.
    ///
    /// Stops at the first I/O failure.
    fn delete_all(
        &self,
        locations: &[ChunkLocation],
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

impl<S: ChunkStore + ?Sized> ChunkStoreExt for S {
    async fn delete_all(&self, locations: &[ChunkLocation]) -> Result<usize> {
        let mut removed = 0;
        for location in locations {
            if self.delete(location).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
