//! Deterministic embedders for tests.

use super::Embedder;
use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Pauses embedding of one specific text until released.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    /// Signalled when the gated text reaches the embedder.
    pub entered: Arc<Notify>,
    /// Notify this to let the gated call finish.
    pub release: Arc<Notify>,
}

/// Bag-of-words embedder over a fixed vocabulary.
///
/// Dimension `i` counts occurrences of `vocab[i]`, so texts sharing more
/// vocabulary words end up closer together.
pub(crate) struct FakeEmbedder {
    vocab: Vec<String>,
    dimensions: Option<usize>,
    fail_on: Option<String>,
    reject_on: Option<String>,
    transient_failures: AtomicUsize,
    gate: Option<(String, Gate)>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(vocab: &[&str]) -> Self {
        Self {
            vocab: vocab.iter().map(|w| w.to_lowercase()).collect(),
            dimensions: None,
            fail_on: None,
            reject_on: None,
            transient_failures: AtomicUsize::new(0),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail (transiently, so retries happen) whenever an input contains `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    /// Fail with a non-retryable error whenever an input contains `marker`.
    pub fn rejecting_on(mut self, marker: &str) -> Self {
        self.reject_on = Some(marker.to_string());
        self
    }

    /// Fail the first `count` calls with a provider error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Report a dimension that differs from the vectors produced.
    pub fn reporting_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Hold any call that embeds exactly `text` until the gate is released.
    pub fn gated_on(mut self, text: &str, gate: Gate) -> Self {
        self.gate = Some((text.to_string(), gate));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocab.len()];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if let Some(i) = self.vocab.iter().position(|w| *w == token) {
                vector[i] += 1.0;
            }
        }
        vector
    }

    fn check(&self, text: &str) -> Result<()> {
        if let Some(marker) = &self.reject_on {
            if text.contains(marker.as_str()) {
                return Err(GlimpseError::InvalidInput(format!("rejected input: {}", text)));
            }
        }
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(GlimpseError::Embedding(format!("cannot embed: {}", text)));
            }
        }
        Ok(())
    }

    fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GlimpseError::OpenAI("503 Service Unavailable".to_string()));
        }
        Ok(())
    }

    async fn wait_at_gate(&self, matches: impl Fn(&str) -> bool) {
        if let Some((gated, gate)) = &self.gate {
            if matches(gated) {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.begin_call()?;
        self.wait_at_gate(|gated| gated == text).await;
        self.check(text)?;
        Ok(self.vector_for(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.begin_call()?;
        self.wait_at_gate(|gated| texts.iter().any(|t| t == gated)).await;
        texts
            .iter()
            .map(|text| {
                self.check(text)?;
                Ok(self.vector_for(text))
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(self.vocab.len())
    }
}
