//! In-memory vector index implementation.
//!
//! Useful for testing and for deployments that rebuild on every start.

use super::{nearest, validate_entries, DistanceMetric, IndexEntry, Neighbor, VectorIndex};
use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use std::sync::RwLock;
use tracing::debug;

/// In-memory vector index.
pub struct MemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
    metric: DistanceMetric,
}

impl MemoryIndex {
    /// Create a new, empty in-memory index.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            metric,
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> GlimpseError {
    GlimpseError::VectorStore(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        validate_entries(&entries)?;
        let count = entries.len();
        *self.entries.write().map_err(poisoned)? = entries;
        debug!("Replaced in-memory index with {} entries", count);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let entries = self.entries.read().map_err(poisoned)?;
        nearest(self.metric, &entries, vector, k)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("A B C D", vec![1.0, 1.0, 0.0, 0.0]),
            IndexEntry::new("C D E F", vec![0.0, 1.0, 1.0, 0.0]),
            IndexEntry::new("E F G H", vec![0.0, 0.0, 1.0, 1.0]),
        ]
    }

    #[tokio::test]
    async fn test_memory_index() {
        let index = MemoryIndex::new(DistanceMetric::Cosine);
        index.insert(letters()).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 3);

        let results = index.query(&[0.1, 0.9, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "C D E F");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let index = MemoryIndex::new(DistanceMetric::Euclidean);
        index.insert(letters()).await.unwrap();

        let results = index.query(&[1.0, 0.0, 0.0, 0.0], 50).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_insert_replaces_previous_content() {
        let index = MemoryIndex::default();
        index.insert(letters()).await.unwrap();
        index
            .insert(vec![IndexEntry::new("only", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        let results = index.query(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results[0].text, "only");
    }

    #[tokio::test]
    async fn test_rejected_insert_keeps_content() {
        let index = MemoryIndex::default();
        index.insert(letters()).await.unwrap();

        let bad = vec![
            IndexEntry::new("x", vec![1.0, 0.0]),
            IndexEntry::new("y", vec![1.0]),
        ];
        assert!(index.insert(bad).await.is_err());
        assert_eq!(index.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = MemoryIndex::default();
        assert!(index.is_empty().await.unwrap());
        assert!(index.query(&[1.0], 3).await.unwrap().is_empty());
        assert!(matches!(
            index.query(&[1.0], 0).await,
            Err(GlimpseError::InvalidQuery(_))
        ));
    }
}
