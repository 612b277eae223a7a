//! Key chunk provider backed by the key distribution service.
//!
//! For every scope (the global feed, then one per country of interest) the
//! provider reads the published index, works out which chunks are missing
//! relative to the scope's cursor, downloads them and writes each one to the
//! chunk store.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use covertrace_core::{missing_chunk_indices, ChunkScope, Country, KeysIndex, DEFAULT_CHUNK_RATE_LIMIT};
use covertrace_detect::{ChunkCursors, DetectError, KeyChunk, KeyChunkProvider};
use covertrace_net::{BackendClient, NetworkError, Transport};
use covertrace_store::{ChunkLocation, ChunkStore, ChunkStoreExt};

/// Configuration for the remote key chunk provider.
#[derive(Debug, Clone)]
pub struct KeyProviderConfig {
    /// Most chunks downloaded per scope and run.
    pub rate_limit: usize,
}

impl Default for KeyProviderConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_CHUNK_RATE_LIMIT,
        }
    }
}

/// Store name of a chunk: `tek_000042`, or `ES_tek_000042` for a country feed.
pub fn chunk_file_name(scope: ChunkScope, index: i64) -> String {
    match scope {
        ChunkScope::Global => format!("tek_{index:06}"),
        ChunkScope::Country(country) => format!("{}_tek_{index:06}", country.code()),
    }
}

fn keys_error(e: impl std::fmt::Display) -> DetectError {
    DetectError::Keys(e.to_string())
}

/// Downloads key chunks from the backend into a [`ChunkStore`].
pub struct RemoteKeyChunkProvider<T: Transport, S: ChunkStore> {
    client: BackendClient<T>,
    store: Arc<S>,
    config: KeyProviderConfig,
}

impl<T: Transport, S: ChunkStore> RemoteKeyChunkProvider<T, S> {
    pub fn new(client: BackendClient<T>, store: Arc<S>, config: KeyProviderConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Published range for `scope`; `None` when the backend has no batches yet.
    async fn index(&self, scope: ChunkScope) -> Result<Option<KeysIndex>, NetworkError> {
        match self.client.keys_index(scope).await {
            Ok(index) => Ok(Some(index)),
            Err(NetworkError::NoBatchesFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_scope(
        &self,
        scope: ChunkScope,
        cursor: Option<i64>,
        fetched: &mut Vec<KeyChunk>,
    ) -> Result<(), DetectError> {
        let Some(index) = self.index(scope).await.map_err(keys_error)? else {
            debug!(%scope, "no batches published");
            return Ok(());
        };

        let missing = missing_chunk_indices(cursor, index, self.config.rate_limit);
        debug!(
            %scope,
            oldest = index.oldest,
            newest = index.newest,
            missing = missing.len(),
            "key index fetched"
        );

        for chunk_index in missing {
            let data = self
                .client
                .download_chunk(scope, chunk_index)
                .await
                .map_err(keys_error)?;
            let location = self
                .store
                .write(&chunk_file_name(scope, chunk_index), data)
                .await
                .map_err(keys_error)?;
            fetched.push(KeyChunk {
                scope,
                index: chunk_index,
                locations: vec![location],
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Transport, S: ChunkStore> KeyChunkProvider for RemoteKeyChunkProvider<T, S> {
    async fn fetch_chunks_into(
        &self,
        cursors: &ChunkCursors,
        countries_of_interest: &[Country],
        fetched: &mut Vec<KeyChunk>,
    ) -> Result<(), DetectError> {
        let scopes: BTreeSet<ChunkScope> = std::iter::once(ChunkScope::Global)
            .chain(countries_of_interest.iter().copied().map(ChunkScope::Country))
            .collect();

        for scope in scopes {
            let cursor = cursors.get(&scope).copied();
            self.fetch_scope(scope, cursor, fetched).await?;
        }
        Ok(())
    }

    async fn clear_local_resources(&self, chunks: &[KeyChunk]) -> Result<(), DetectError> {
        let locations: Vec<ChunkLocation> = chunks
            .iter()
            .flat_map(|c| c.locations.iter().cloned())
            .collect();
        let removed = self.store.delete_all(&locations).await.map_err(keys_error)?;
        debug!(removed, "local chunk resources cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covertrace_net::transport::memory::{Reply, ScriptedTransport};
    use covertrace_net::{BackendConfig, Response};
    use covertrace_store::MemoryChunkStore;
    use serde_json::json;

    fn provider(
        transport: Arc<ScriptedTransport>,
    ) -> RemoteKeyChunkProvider<ScriptedTransport, MemoryChunkStore> {
        RemoteKeyChunkProvider::new(
            BackendClient::with_shared(transport, BackendConfig::default()),
            Arc::new(MemoryChunkStore::new()),
            KeyProviderConfig::default(),
        )
    }

    fn index(oldest: i64, newest: i64) -> Reply {
        Reply::Respond(Response::json(&json!({ "oldest": oldest, "newest": newest })))
    }

    fn chunk(body: &'static str) -> Reply {
        Reply::Respond(Response::new(200, body))
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name(ChunkScope::Global, 42), "tek_000042");
        assert_eq!(
            chunk_file_name(ChunkScope::Country(Country::Spain), 7),
            "ES_tek_000007"
        );
    }

    #[tokio::test]
    async fn test_fetches_missing_chunks_after_cursor() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/v1/keys/index", index(1, 3)).await;
        transport.on("/v1/keys/2", chunk("two")).await;
        transport.on("/v1/keys/3", chunk("three")).await;
        let provider = provider(Arc::clone(&transport));

        let cursors = ChunkCursors::from([(ChunkScope::Global, 1)]);
        let chunks = provider.fetch_chunks(&cursors, &[]).await.unwrap();

        let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![2, 3]);
        let stored = provider
            .store()
            .read(&chunks[1].locations[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&stored[..], b"three");
        assert_eq!(chunks[0].locations[0].file_name(), Some("tek_000002"));
    }

    #[tokio::test]
    async fn test_country_scopes_use_their_own_cursor() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/v1/keys/index", index(5, 5)).await;
        transport.on("/v1/keys/eu/DE/index", index(1, 2)).await;
        transport.on("/v1/keys/eu/DE/2", chunk("de-two")).await;
        let provider = provider(Arc::clone(&transport));

        let cursors = ChunkCursors::from([
            (ChunkScope::Global, 5),
            (ChunkScope::Country(Country::Germany), 1),
        ]);
        let chunks = provider
            .fetch_chunks(&cursors, &[Country::Germany, Country::Germany])
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].scope, ChunkScope::Country(Country::Germany));
        assert_eq!(chunks[0].locations[0].file_name(), Some("DE_tek_000002"));
        // global index plus one German index and one chunk
        assert_eq!(transport.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_no_batches_found_means_nothing_new() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(
                "/v1/keys/index",
                Reply::Respond(Response::new(
                    404,
                    json!({ "error_code": 1301, "message": "no batches" }).to_string(),
                )),
            )
            .await;
        let provider = provider(transport);

        let chunks = provider.fetch_chunks(&ChunkCursors::new(), &[]).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_failed_download_discards_fetched_chunks() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/v1/keys/index", index(1, 2)).await;
        transport.on("/v1/keys/1", chunk("one")).await;
        transport.on("/v1/keys/2", Reply::Drop).await;
        let provider = provider(transport);

        let err = provider
            .fetch_chunks(&ChunkCursors::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Keys(_)));
        assert!(provider.store().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_most_recent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/v1/keys/index", index(1, 4)).await;
        transport.on("/v1/keys/3", chunk("three")).await;
        transport.on("/v1/keys/4", chunk("four")).await;
        let provider = RemoteKeyChunkProvider::new(
            BackendClient::with_shared(transport, BackendConfig::default()),
            Arc::new(MemoryChunkStore::new()),
            KeyProviderConfig { rate_limit: 2 },
        );

        let chunks = provider.fetch_chunks(&ChunkCursors::new(), &[]).await.unwrap();
        let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_clear_local_resources() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/v1/keys/index", index(1, 2)).await;
        transport.on("/v1/keys/1", chunk("one")).await;
        transport.on("/v1/keys/2", chunk("two")).await;
        let provider = provider(transport);

        let chunks = provider.fetch_chunks(&ChunkCursors::new(), &[]).await.unwrap();
        assert_eq!(provider.store().len(), 2);
        provider.clear_local_resources(&chunks).await.unwrap();
        assert!(provider.store().is_empty());
    }
}
