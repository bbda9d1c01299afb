//! Local transcript files.
//!
//! `.vtt` files are read as captions; anything else is taken as plain text.

use super::{parse_vtt, SourceKind, Transcript, TranscriptSource};
use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Transcript file extensions recognised without the file existing.
const TRANSCRIPT_EXTENSIONS: &[&str] = &["txt", "vtt"];

/// Resolve a bare transcript file name inside `dir`.
///
/// Only a single `.txt` or `.vtt` file name is accepted: absolute paths,
/// separators and parent references are rejected.
pub fn resolve_in_dir(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name.trim());
    let mut components = candidate.components();
    let is_bare_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !is_bare_name || !LocalSource::has_transcript_extension(candidate) {
        return Err(GlimpseError::InvalidInput(format!(
            "Expected a .txt or .vtt file name in the transcript directory, got {}",
            name
        )));
    }
    Ok(dir.join(candidate))
}

/// Local file source for transcripts.
#[derive(Debug, Default)]
pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }

    fn has_transcript_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TRANSCRIPT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn is_vtt(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("vtt"))
    }

    /// Load a transcript file.
    pub async fn load(&self, path: &Path) -> Result<Transcript> {
        if !path.is_file() {
            return Err(GlimpseError::TranscriptNotFound(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let source_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("transcript")
            .to_string();

        let transcript = if Self::is_vtt(path) {
            Transcript::from_cues(source_id, parse_vtt(&content))
        } else {
            Transcript::from_text(source_id, content)
        };

        info!(
            "Loaded {} words from {}",
            transcript.word_count(),
            path.display()
        );
        Ok(transcript)
    }
}

#[async_trait]
impl TranscriptSource for LocalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn fetch(&self, id: &str) -> Result<Transcript> {
        self.load(Path::new(id)).await
    }

    fn extract_id(&self, input: &str) -> Option<String> {
        let input = input.trim();
        let path = Path::new(input);
        (path.is_file() || Self::has_transcript_extension(path)).then(|| input.to_string())
    }
}
