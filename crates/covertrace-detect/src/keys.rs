//! The key chunk provider contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::warn;

use covertrace_core::{ChunkScope, Country};
use covertrace_store::ChunkLocation;

use crate::error::Result;

/// Latest processed chunk index, per scope. A missing scope has never been processed.
pub type ChunkCursors = BTreeMap<ChunkScope, i64>;

/// One downloaded chunk, ready to be handed to matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChunk {
    pub scope: ChunkScope,
    pub index: i64,
    pub locations: Vec<ChunkLocation>,
}

/// Supplies the key chunks a detection run should process.
#[async_trait]
pub trait KeyChunkProvider: Send + Sync {
    /// Download the chunks published after each scope's cursor, pushing
    /// each one onto `fetched` as soon as it is stored.
    ///
    /// Scopes are the global feed plus one per country of interest. If this
    /// fails, or its future is dropped part way, `fetched` holds exactly the
    /// chunks stored so far and the caller must clear them.
    async fn fetch_chunks_into(
        &self,
        cursors: &ChunkCursors,
        countries_of_interest: &[Country],
        fetched: &mut Vec<KeyChunk>,
    ) -> Result<()>;

    /// Download the chunks published after each scope's cursor.
    ///
    /// Chunks stored before a failure are cleared before the error is returned.
    async fn fetch_chunks(
        &self,
        cursors: &ChunkCursors,
        countries_of_interest: &[Country],
    ) -> Result<Vec<KeyChunk>> {
        let mut fetched = Vec::new();
        if let Err(e) = self
            .fetch_chunks_into(cursors, countries_of_interest, &mut fetched)
            .await
        {
            if let Err(cleanup) = self.clear_local_resources(&fetched).await {
                warn!(error = %cleanup, "failed to clear partially fetched chunks");
            }
            return Err(e);
        }
        Ok(fetched)
    }

    /// Remove whatever local resources `chunks` hold.
    async fn clear_local_resources(&self, chunks: &[KeyChunk]) -> Result<()>;
}
