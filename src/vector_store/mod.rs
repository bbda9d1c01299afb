//! Vector index abstraction for Glimpse.
//!
//! An index holds the chunks of exactly one transcript. `insert` replaces
//! whatever was there before, and `query` runs an exact nearest-neighbour
//! scan ordered by distance, ties going to the earlier inserted entry.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Distance used to rank entries. Fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Straight-line (L2) distance.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length. Smaller is closer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// A chunk's text paired with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// One query hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    /// Insertion position of the entry.
    pub position: usize,
    /// The chunk text.
    pub text: String,
    /// Distance from the query (smaller is more similar).
    pub distance: f32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the index content with `entries`, all or nothing.
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// The `k` nearest entries, closest first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of entries.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// The metric this index ranks by.
    fn metric(&self) -> DistanceMetric;

    /// Delete the backing storage once the last handle to this index drops.
    ///
    /// `false` keeps it again. Indexes without storage ignore this.
    fn discard_on_drop(&self, _discard: bool) {}
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Compute the Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Check a batch before it replaces an index: one shared, non-zero dimension
/// and finite values only.
pub(crate) fn validate_entries(entries: &[IndexEntry]) -> Result<Option<usize>> {
    let Some(first) = entries.first() else {
        return Ok(None);
    };
    let dimension = first.embedding.len();
    if dimension == 0 {
        return Err(GlimpseError::VectorStore(
            "embeddings must not be empty".to_string(),
        ));
    }

    for (position, entry) in entries.iter().enumerate() {
        if entry.embedding.len() != dimension {
            return Err(GlimpseError::VectorStore(format!(
                "entry {} has dimension {}, expected {}",
                position,
                entry.embedding.len(),
                dimension
            )));
        }
        if entry.embedding.iter().any(|x| !x.is_finite()) {
            return Err(GlimpseError::VectorStore(format!(
                "entry {} contains non-finite values",
                position
            )));
        }
    }

    Ok(Some(dimension))
}

/// Exact k-nearest-neighbour scan shared by the backends.
pub(crate) fn nearest(
    metric: DistanceMetric,
    entries: &[IndexEntry],
    query: &[f32],
    k: usize,
) -> Result<Vec<Neighbor>> {
    if k == 0 {
        return Err(GlimpseError::InvalidQuery(
            "k must be at least 1".to_string(),
        ));
    }
    if query.iter().any(|x| !x.is_finite()) {
        return Err(GlimpseError::InvalidQuery(
            "query vector contains non-finite values".to_string(),
        ));
    }
    if let Some(first) = entries.first() {
        if first.embedding.len() != query.len() {
            return Err(GlimpseError::InvalidQuery(format!(
                "query has dimension {}, index has {}",
                query.len(),
                first.embedding.len()
            )));
        }
    }

    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| (position, metric.distance(query, &entry.embedding)))
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(position, distance)| Neighbor {
            position,
            text: entries[position].text.clone(),
            distance,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_metric_distances() {
        let a = [3.0, 0.0];
        let b = [0.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!(DistanceMetric::Cosine.distance(&a, &a).abs() < 1e-6);
        // zero vectors are treated as unrelated
        assert!((DistanceMetric::Cosine.distance(&[0.0, 0.0], &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("Cosine".parse::<DistanceMetric>(), Ok(DistanceMetric::Cosine));
        assert_eq!("l2".parse::<DistanceMetric>(), Ok(DistanceMetric::Euclidean));
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_nearest_orders_and_breaks_ties() {
        let entries = vec![
            IndexEntry::new("far", vec![0.0, 1.0]),
            IndexEntry::new("twin-a", vec![1.0, 1.0]),
            IndexEntry::new("exact", vec![1.0, 0.0]),
            IndexEntry::new("twin-b", vec![1.0, 1.0]),
        ];

        let hits = nearest(DistanceMetric::Cosine, &entries, &[1.0, 0.0], 10).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "twin-a", "twin-b", "far"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_nearest_rejects_bad_queries() {
        let entries = vec![IndexEntry::new("a", vec![1.0, 0.0])];
        assert!(matches!(
            nearest(DistanceMetric::Cosine, &entries, &[1.0, 0.0], 0),
            Err(GlimpseError::InvalidQuery(_))
        ));
        assert!(matches!(
            nearest(DistanceMetric::Cosine, &entries, &[1.0, 0.0, 0.0], 1),
            Err(GlimpseError::InvalidQuery(_))
        ));
        assert!(matches!(
            nearest(DistanceMetric::Cosine, &entries, &[f32::NAN, 0.0], 1),
            Err(GlimpseError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_validate_entries() {
        assert_eq!(validate_entries(&[]).unwrap(), None);
        assert_eq!(
            validate_entries(&[IndexEntry::new("a", vec![1.0, 2.0])]).unwrap(),
            Some(2)
        );
        assert!(validate_entries(&[
            IndexEntry::new("a", vec![1.0, 2.0]),
            IndexEntry::new("b", vec![1.0]),
        ])
        .is_err());
        assert!(validate_entries(&[IndexEntry::new("a", vec![])]).is_err());
        assert!(validate_entries(&[IndexEntry::new("a", vec![f32::INFINITY])]).is_err());
    }
}
