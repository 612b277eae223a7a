//! In-memory implementation of the ChunkStore trait.
//!
//! This is primarily for testing. Locations are synthetic `memory/<name>`
//! paths that never touch the filesystem.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{validate_name, ChunkLocation, ChunkStore};

const ROOT: &str = "memory";

/// In-memory chunk store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    blobs: RwLock<BTreeMap<ChunkLocation, Bytes>>,
}

impl MemoryChunkStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn write(&self, name: &str, data: Bytes) -> Result<ChunkLocation> {
        validate_name(name)?;
        let location = ChunkLocation::new(Path::new(ROOT).join(name));
        let mut blobs = self.blobs.write().map_err(|_| StoreError::LockPoisoned)?;
        blobs.insert(location.clone(), data);
        Ok(location)
    }

    async fn read(&self, location: &ChunkLocation) -> Result<Option<Bytes>> {
        let blobs = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(blobs.get(location).cloned())
    }

    async fn delete(&self, location: &ChunkLocation) -> Result<bool> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(blobs.remove(location).is_some())
    }

    async fn list(&self) -> Result<Vec<ChunkLocation>> {
        let blobs = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(blobs.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ChunkStoreExt;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryChunkStore::new();
        let location = store
            .write("tek_000001", Bytes::from_static(b"chunk"))
            .await
            .unwrap();

        assert_eq!(location.file_name(), Some("tek_000001"));
        assert_eq!(
            store.read(&location).await.unwrap(),
            Some(Bytes::from_static(b"chunk"))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryChunkStore::new();
        store.write("a", Bytes::from_static(b"1")).await.unwrap();
        let location = store.write("a", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.read(&location).await.unwrap(),
            Some(Bytes::from_static(b"2"))
        );
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryChunkStore::new();
        let location = store.write("a", Bytes::new()).await.unwrap();
        assert!(store.delete(&location).await.unwrap());
        assert!(!store.delete(&location).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_counts_removed() {
        let store = MemoryChunkStore::new();
        let a = store.write("a", Bytes::new()).await.unwrap();
        let b = store.write("b", Bytes::new()).await.unwrap();
        let removed = store.delete_all(&[a.clone(), b, a]).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_bad_name() {
        let store = MemoryChunkStore::new();
        let err = store.write("../x", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }
}
