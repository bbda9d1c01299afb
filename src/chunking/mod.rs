//! Transcript chunking for retrieval.
//!
//! Transcripts are split into overlapping windows of whitespace-delimited
//! words. Windows prefer to end on a sentence or line break when one is close
//! to the cut, so a sentence is rarely torn across two chunks.

mod words;

pub use words::WordChunker;

use crate::config::RetrievalSettings;
use crate::error::{GlimpseError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous piece of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the transcript (0-based).
    pub order: usize,
    /// Byte offset where this chunk's span starts in the source text.
    pub start: usize,
    /// Byte offset where this chunk's span ends (exclusive).
    ///
    /// Spans include the whitespace that follows the last word, so spans of
    /// consecutive chunks always touch or overlap.
    pub end: usize,
    /// Text content, with surrounding whitespace trimmed.
    pub content: String,
}

/// Configuration for chunking, in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum number of words per chunk.
    pub chunk_size: usize,
    /// Words repeated at the start of the next chunk.
    pub overlap: usize,
    /// Trailing words a chunk may give up to end on a natural boundary.
    pub boundary_lookback: usize,
}

impl ChunkingConfig {
    /// Build a config, rejecting sizes that cannot make progress.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the boundary lookback window.
    pub fn with_boundary_lookback(mut self, boundary_lookback: usize) -> Self {
        self.boundary_lookback = boundary_lookback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(GlimpseError::InvalidConfiguration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(GlimpseError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            overlap: 20,
            boundary_lookback: 10,
        }
    }
}

impl From<&RetrievalSettings> for ChunkingConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            overlap: settings.chunk_overlap,
            boundary_lookback: settings.boundary_lookback,
        }
    }
}

/// Split text into overlapping word chunks.
///
/// Fails with `InvalidConfiguration` unless `chunk_size > overlap`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let chunker = WordChunker::new(ChunkingConfig::new(chunk_size, overlap)?)?;
    Ok(chunker.split(text))
}
