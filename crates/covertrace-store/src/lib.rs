//! # Covertrace Store
//!
//! Local storage for downloaded key chunks. Provides a trait-based interface
//! with filesystem and in-memory implementations.
//!
//! ## Overview
//!
//! Key chunks are fetched from the backend, written here, handed to the
//! matching capability by location, and deleted once the detection run that
//! consumed them has finished.
//!
//! ## Key Types
//!
//! - [`ChunkStore`] - The async trait for all storage operations
//! - [`FileChunkStore`] - Directory-backed storage
//! - [`MemoryChunkStore`] - In-memory storage for tests
//! - [`ChunkLocation`] - Where a stored chunk lives
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use covertrace_store::{ChunkStore, ChunkStoreExt, FileChunkStore};
//!
//! async fn example() {
//!     let store = FileChunkStore::open("/tmp/covertrace-chunks").unwrap();
//!     let location = store.write("tek_000042", Bytes::from_static(b"...")).await.unwrap();
//!
//!     // After detection
//!     store.delete_all(&[location]).await.unwrap();
//! }
//! ```

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::FileChunkStore;
pub use memory::MemoryChunkStore;
pub use traits::{ChunkLocation, ChunkStore, ChunkStoreExt};
