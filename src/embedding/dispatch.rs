//! Concurrent, retrying embedding dispatch.
//!
//! Index builds embed every chunk of a transcript. Sub-batches are sent
//! concurrently up to a limit, transient failures are retried with
//! exponential backoff, and results are put back into input order before
//! anything reaches the index.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{GlimpseError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Retry behaviour for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: usize,
    /// Delay before the first retry; doubled for each later one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(5) as u32;
        self.base_delay * (1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Splits embedding work into sub-batches and runs them concurrently.
#[derive(Debug, Clone)]
pub struct EmbedDispatch {
    batch_size: usize,
    max_in_flight: usize,
    retry: RetryPolicy,
}

impl EmbedDispatch {
    pub fn new(batch_size: usize, max_in_flight: usize, retry: RetryPolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_in_flight: max_in_flight.max(1),
            retry,
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self::new(
            settings.batch_size,
            settings.max_in_flight,
            RetryPolicy::new(
                settings.retry_attempts,
                Duration::from_millis(settings.retry_backoff_ms),
            ),
        )
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Embed every text, preserving order.
    ///
    /// Either all texts get a vector or the call fails with an `Embedding`
    /// error that names how many texts failed and where.
    #[instrument(skip(self, embedder, texts), fields(count = texts.len()))]
    pub async fn embed_all(&self, embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let dimensions = embedder.dimensions();
        let batch_count = texts.len().div_ceil(self.batch_size);
        debug!(
            "Embedding {} texts in {} batches ({} in flight)",
            texts.len(),
            batch_count,
            self.max_in_flight
        );

        let mut results: Vec<(usize, Result<Vec<Vec<f32>>>)> =
            stream::iter(0..batch_count)
                .map(|idx| async move {
                    let start = idx * self.batch_size;
                    let batch = &texts[start..(start + self.batch_size).min(texts.len())];
                    let result = with_retry(&self.retry, "Embedding batch", || {
                        embedder.embed_many(batch)
                    })
                    .await
                    .and_then(|vectors| check_vectors(batch.len(), dimensions, vectors));
                    (idx, result)
                })
                .buffer_unordered(self.max_in_flight)
                .collect()
                .await;

        results.sort_by_key(|(idx, _)| *idx);

        let mut embeddings = Vec::with_capacity(texts.len());
        let mut failed_ranges = Vec::new();
        let mut failed_count = 0;
        let mut first_error = None;

        for (idx, result) in results {
            match result {
                Ok(vectors) => embeddings.extend(vectors),
                Err(e) => {
                    let start = idx * self.batch_size;
                    let end = (start + self.batch_size).min(texts.len());
                    failed_count += end - start;
                    failed_ranges.push(format!("{}..{}", start, end));
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(GlimpseError::Embedding(format!(
                "{} of {} texts failed to embed (ranges {}): {}",
                failed_count,
                texts.len(),
                failed_ranges.join(", "),
                e
            )));
        }

        Ok(embeddings)
    }

    /// Embed one text with retry.
    pub async fn embed_one(&self, embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
        let vector = with_retry(&self.retry, "Query embedding", || embedder.embed(text)).await?;
        check_vectors(1, embedder.dimensions(), vec![vector])?
            .pop()
            .ok_or_else(|| GlimpseError::Embedding("Empty embedding response".to_string()))
    }
}

impl Default for EmbedDispatch {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default())
    }
}

fn check_vectors(expected: usize, dimensions: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(GlimpseError::Embedding(format!(
            "expected {} embeddings, provider returned {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(GlimpseError::Embedding(format!(
            "expected {}-dimensional embeddings, provider returned {}",
            dimensions,
            bad.len()
        )));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;

    fn fast_dispatch(batch_size: usize, max_in_flight: usize, attempts: usize) -> EmbedDispatch {
        EmbedDispatch::new(
            batch_size,
            max_in_flight,
            RetryPolicy::new(attempts, Duration::from_millis(1)),
        )
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_embed_all_preserves_order() {
        let embedder = FakeEmbedder::new(&["alpha", "beta", "gamma", "delta", "omega"]);
        let input = texts(&["alpha", "beta", "gamma", "delta", "omega", "alpha beta"]);

        let vectors = fast_dispatch(2, 3, 1)
            .embed_all(&embedder, &input)
            .await
            .unwrap();

        assert_eq!(vectors.len(), input.len());
        for (text, vector) in input.iter().zip(&vectors) {
            assert_eq!(vector, &embedder.vector_for(text));
        }
    }

    #[tokio::test]
    async fn test_embed_all_empty_input() {
        let embedder = FakeEmbedder::new(&["alpha"]);
        let vectors = fast_dispatch(2, 2, 1).embed_all(&embedder, &[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let embedder = FakeEmbedder::new(&["alpha", "beta"]).failing_on("poison");
        let input = texts(&["alpha", "beta", "poison", "beta", "alpha"]);

        let err = fast_dispatch(2, 2, 2)
            .embed_all(&embedder, &input)
            .await
            .unwrap_err();

        match err {
            GlimpseError::Embedding(msg) => {
                assert!(msg.contains("2 of 5"), "{msg}");
                assert!(msg.contains("2..4"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let embedder = FakeEmbedder::new(&["alpha"]).with_transient_failures(1);
        let vectors = fast_dispatch(4, 1, 2)
            .embed_all(&embedder, &texts(&["alpha"]))
            .await
            .unwrap();

        assert_eq!(vectors.len(), 1);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let embedder = FakeEmbedder::new(&["alpha"]).with_transient_failures(5);
        let result = fast_dispatch(4, 1, 2)
            .embed_all(&embedder, &texts(&["alpha"]))
            .await;

        assert!(result.is_err());
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let embedder = FakeEmbedder::new(&["alpha"]).rejecting_on("alpha");
        let result = fast_dispatch(4, 1, 3).embed_one(&embedder, "alpha").await;

        assert!(matches!(result, Err(GlimpseError::InvalidInput(_))));
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let embedder = FakeEmbedder::new(&["alpha", "beta"]).reporting_dimensions(3);
        let result = fast_dispatch(4, 1, 1)
            .embed_all(&embedder, &texts(&["alpha"]))
            .await;

        assert!(matches!(result, Err(GlimpseError::Embedding(_))));
    }
}
