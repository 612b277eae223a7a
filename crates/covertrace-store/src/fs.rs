//! Filesystem implementation of the ChunkStore trait.
//!
//! Each chunk is one file directly under the store directory. All I/O goes
//! through `tokio::fs`, so callers never block the runtime.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::Result;
use crate::traits::{validate_name, ChunkLocation, ChunkStore};

/// Directory-backed chunk store.
#[derive(Debug, Clone)]
pub struct FileChunkStore {
    root: PathBuf,
}

impl FileChunkStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owns(&self, location: &ChunkLocation) -> bool {
        location.as_path().parent() == Some(self.root.as_path())
    }
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    async fn write(&self, name: &str, data: Bytes) -> Result<ChunkLocation> {
        validate_name(name)?;
        let path = self.root.join(name);
        tokio::fs::write(&path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "chunk written");
        Ok(ChunkLocation::new(path))
    }

    async fn read(&self, location: &ChunkLocation) -> Result<Option<Bytes>> {
        if !self.owns(location) {
            return Ok(None);
        }
        match tokio::fs::read(location.as_path()).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, location: &ChunkLocation) -> Result<bool> {
        if !self.owns(location) {
            return Ok(false);
        }
        match tokio::fs::remove_file(location.as_path()).await {
            Ok(()) => {
                debug!(path = %location, "chunk deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ChunkLocation>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut locations = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                locations.push(ChunkLocation::new(entry.path()));
            }
        }
        locations.sort();
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::traits::ChunkStoreExt;
    use tempfile::TempDir;

    fn create_test_store() -> (FileChunkStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileChunkStore::open(dir.path().join("chunks")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (store, _dir) = create_test_store();
        let location = store
            .write("tek_000007", Bytes::from_static(b"PK\x03\x04"))
            .await
            .unwrap();

        assert!(location.as_path().starts_with(store.root()));
        assert_eq!(
            store.read(&location).await.unwrap(),
            Some(Bytes::from_static(b"PK\x03\x04"))
        );
        assert!(store.delete(&location).await.unwrap());
        assert_eq!(store.read(&location).await.unwrap(), None);
        assert!(!store.delete(&location).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let (store, _dir) = create_test_store();
        store.write("tek_000002", Bytes::new()).await.unwrap();
        store.write("DE_tek_000001", Bytes::new()).await.unwrap();
        store.write("tek_000001", Bytes::new()).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .iter()
            .filter_map(|l| l.file_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["DE_tek_000001", "tek_000001", "tek_000002"]);
    }

    #[tokio::test]
    async fn test_foreign_locations_are_ignored() {
        let (store, dir) = create_test_store();
        let outside = dir.path().join("keep.bin");
        std::fs::write(&outside, b"x").unwrap();

        let location = ChunkLocation::new(&outside);
        assert!(!store.delete(&location).await.unwrap());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (store, _dir) = create_test_store();
        let a = store.write("a", Bytes::new()).await.unwrap();
        let b = store.write("b", Bytes::new()).await.unwrap();
        assert_eq!(store.delete_all(&[a, b]).await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (store, _dir) = create_test_store();
        let err = store.write("../escape", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_reopen_sees_existing_chunks() {
        let (store, _dir) = create_test_store();
        store.write("tek_000001", Bytes::from_static(b"1")).await.unwrap();

        let reopened = FileChunkStore::open(store.root()).unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }
}
