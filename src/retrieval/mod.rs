//! Retrieval store: builds the transcript index and answers similarity queries.
//!
//! The store owns exactly one active index. A build creates a fresh index
//! generation, fills it completely, and only then swaps it in, so queries see
//! either the old index or the new one. Queries take a snapshot of the active
//! index under a short read lock and run against that snapshot; a query in
//! flight during a rebuild finishes on the index it started with.

mod backend;

pub use backend::IndexBackend;

use crate::chunking::{Chunk, ChunkingConfig, WordChunker};
use crate::config::Settings;
use crate::embedding::{EmbedDispatch, Embedder};
use crate::error::{GlimpseError, Result};
use crate::vector_store::{IndexEntry, Neighbor, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Lifecycle state of a [`RetrievalStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StoreState {
    /// Nothing has been indexed yet.
    Empty,
    /// An index is active and queryable.
    Ready {
        generation: Uuid,
        #[serde(rename = "chunks")]
        chunk_count: usize,
    },
}

struct ActiveIndex {
    generation: Uuid,
    index: Arc<dyn VectorIndex>,
    chunk_count: usize,
}

/// Chunk, embed and index a transcript; retrieve the chunks closest to a question.
pub struct RetrievalStore {
    embedder: Arc<dyn Embedder>,
    dispatch: EmbedDispatch,
    chunker: WordChunker,
    backend: IndexBackend,
    active: RwLock<Option<ActiveIndex>>,
    build_lock: Mutex<()>,
    build_timeout: Duration,
    query_timeout: Duration,
}

impl RetrievalStore {
    /// Create an empty store.
    pub fn new(embedder: Arc<dyn Embedder>, backend: IndexBackend, settings: &Settings) -> Result<Self> {
        let chunker = WordChunker::new(ChunkingConfig::from(&settings.retrieval))?;

        Ok(Self {
            embedder,
            dispatch: EmbedDispatch::from_settings(&settings.embedding),
            chunker,
            backend,
            active: RwLock::new(None),
            build_lock: Mutex::new(()),
            build_timeout: settings.retrieval.build_timeout(),
            query_timeout: settings.retrieval.query_timeout(),
        })
    }

    /// Create a store, reactivating the index persisted by a previous run.
    ///
    /// With the memory backend this is the same as [`RetrievalStore::new`].
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        backend: IndexBackend,
        settings: &Settings,
    ) -> Result<Self> {
        let store = Self::new(embedder, backend, settings)?;

        if let Some((generation, index)) = store.backend.restore()? {
            let chunk_count = index.len().await?;
            info!(
                "Reopened index generation {} ({} chunks)",
                generation, chunk_count
            );
            *store.active.write().await = Some(ActiveIndex {
                generation,
                index,
                chunk_count,
            });
        }

        Ok(store)
    }

    /// Replace the embedding dispatcher (batching, concurrency, retry).
    pub fn with_dispatch(mut self, dispatch: EmbedDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Override the build and query time limits.
    pub fn with_timeouts(mut self, build: Duration, query: Duration) -> Self {
        self.build_timeout = build;
        self.query_timeout = query;
        self
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> StoreState {
        match self.active.read().await.as_ref() {
            None => StoreState::Empty,
            Some(active) => StoreState::Ready {
                generation: active.generation,
                chunk_count: active.chunk_count,
            },
        }
    }

    /// Index `transcript`, replacing the active index on success.
    ///
    /// On any failure the previously active index (if any) stays in place.
    /// Returns the chunks that were indexed.
    #[instrument(skip(self, transcript), fields(len = transcript.len()))]
    pub async fn create_vector_store(&self, transcript: &str) -> Result<Vec<Chunk>> {
        let _guard = self.build_lock.lock().await;
        let generation = Uuid::new_v4();

        // A failed or abandoned build drops its index, which deletes the files.
        let built = tokio::time::timeout(self.build_timeout, self.build(&generation, transcript)).await;

        let (index, chunks) = match built {
            Ok(Ok(built)) => built,
            Ok(Err(e)) => {
                return Err(match e {
                    GlimpseError::InvalidConfiguration(_) | GlimpseError::BuildFailed(_) => e,
                    other => GlimpseError::BuildFailed(other.to_string()),
                });
            }
            Err(_) => {
                return Err(GlimpseError::Timeout(format!(
                    "index build exceeded {:?}",
                    self.build_timeout
                )));
            }
        };

        // No await between the pointer write and the swap, so a cancelled
        // caller cannot leave disk and memory naming different generations.
        let mut active = self.active.write().await;

        if let Err(e) = self.backend.activate(&generation) {
            return Err(GlimpseError::BuildFailed(format!(
                "could not record active index: {}",
                e
            )));
        }

        index.discard_on_drop(false);
        let previous = active.replace(ActiveIndex {
            generation,
            index,
            chunk_count: chunks.len(),
        });
        drop(active);

        // Queries still holding the old index finish before its files go.
        if let Some(previous) = previous {
            debug!("Retiring index generation {}", previous.generation);
            previous.index.discard_on_drop(true);
        }

        info!(
            "Index generation {} active with {} chunks",
            generation,
            chunks.len()
        );
        Ok(chunks)
    }

    async fn build(
        &self,
        generation: &Uuid,
        transcript: &str,
    ) -> Result<(Arc<dyn VectorIndex>, Vec<Chunk>)> {
        let chunks = self.chunker.split(transcript);
        debug!("Split transcript into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.dispatch.embed_all(self.embedder.as_ref(), &texts).await?;

        let entries: Vec<IndexEntry> = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, embedding)| IndexEntry::new(text, embedding))
            .collect();

        let index = self.backend.create(generation)?;
        index.insert(entries).await?;

        Ok((index, chunks))
    }

    /// The texts of the `k` chunks closest to `question`, most similar first.
    pub async fn get_relevant_chunks(&self, question: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(question, k)
            .await?
            .into_iter()
            .map(|n| n.text)
            .collect())
    }

    /// Like [`RetrievalStore::get_relevant_chunks`], keeping distances.
    #[instrument(skip(self))]
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(GlimpseError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }
        if question.trim().is_empty() {
            return Err(GlimpseError::InvalidQuery(
                "question must not be empty".to_string(),
            ));
        }

        let index = self
            .active
            .read()
            .await
            .as_ref()
            .map(|active| active.index.clone())
            .ok_or(GlimpseError::NotInitialized)?;

        match tokio::time::timeout(self.query_timeout, self.query(index, question, k)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Retrieval exceeded {:?}", self.query_timeout);
                Err(GlimpseError::Timeout(format!(
                    "retrieval exceeded {:?}",
                    self.query_timeout
                )))
            }
        }
    }

    async fn query(&self, index: Arc<dyn VectorIndex>, question: &str, k: usize) -> Result<Vec<Neighbor>> {
        let vector = self
            .dispatch
            .embed_one(self.embedder.as_ref(), question)
            .await
            .map_err(|e| GlimpseError::RetrievalFailed(e.to_string()))?;

        index.query(&vector, k).await.map_err(|e| match e {
            GlimpseError::InvalidQuery(_) => e,
            other => GlimpseError::RetrievalFailed(other.to_string()),
        })
    }
}
