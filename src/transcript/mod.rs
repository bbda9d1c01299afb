//! Transcript sources for Glimpse.
//!
//! A transcript is the spoken text of one video, either fetched as YouTube
//! captions or loaded from a local file.

mod local;
mod vtt;
mod youtube;

pub use local::{resolve_in_dir, LocalSource};
pub use vtt::parse_vtt;
pub use youtube::{extract_video_id, YoutubeSource};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Type of transcript source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    YouTube,
    Local,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::YouTube => write!(f, "youtube"),
            SourceKind::Local => write!(f, "local"),
        }
    }
}

/// One timed caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

/// The text of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// YouTube video id or local file name.
    pub source_id: String,
    /// Full transcript text.
    pub text: String,
    /// Timed captions, empty for plain-text sources.
    pub cues: Vec<Cue>,
}

impl Transcript {
    /// Create an untimed transcript.
    pub fn from_text(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            cues: Vec::new(),
        }
    }

    /// Create a transcript from captions; the text is the cue texts joined by spaces.
    pub fn from_cues(source_id: impl Into<String>, cues: Vec<Cue>) -> Self {
        let text = cues
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            source_id: source_id.into(),
            text,
            cues,
        }
    }

    /// Length of the video in seconds, when captions carry timing.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.cues.last().map(|c| c.end)
    }

    /// Convert a position given as a percentage of the video into seconds.
    pub fn seconds_at(&self, percent: f64) -> Option<f64> {
        self.duration_seconds()
            .map(|duration| duration * percent.clamp(0.0, 100.0) / 100.0)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Trait for transcript providers.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Get the source type.
    fn kind(&self) -> SourceKind;

    /// Fetch the transcript for an id produced by [`TranscriptSource::extract_id`].
    async fn fetch(&self, id: &str) -> Result<Transcript>;

    /// Extract the id from user input (URL, path, etc.), if this source handles it.
    fn extract_id(&self, input: &str) -> Option<String>;
}

/// Pick the source for `input` and extract its id.
///
/// Existing files and `.txt`/`.vtt` paths are local; anything else must be a
/// YouTube URL or video id.
pub fn parse_input(input: &str, languages: &[String]) -> Option<(Box<dyn TranscriptSource>, String)> {
    let local = LocalSource::new();
    if let Some(id) = local.extract_id(input) {
        return Some((Box::new(local), id));
    }

    let youtube = YoutubeSource::new(languages.to_vec());
    let id = youtube.extract_id(input)?;
    Some((Box::new(youtube), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cues_joins_text() {
        let transcript = Transcript::from_cues(
            "abc",
            vec![
                Cue {
                    start: 0.0,
                    end: 2.0,
                    text: "hello there".to_string(),
                },
                Cue {
                    start: 2.0,
                    end: 120.0,
                    text: "general".to_string(),
                },
            ],
        );

        assert_eq!(transcript.text, "hello there general");
        assert_eq!(transcript.word_count(), 3);
        assert_eq!(transcript.duration_seconds(), Some(120.0));
        assert_eq!(transcript.seconds_at(50.0), Some(60.0));
        assert_eq!(transcript.seconds_at(250.0), Some(120.0));
    }

    #[test]
    fn test_plain_text_has_no_duration() {
        let transcript = Transcript::from_text("notes", "just words");
        assert_eq!(transcript.duration_seconds(), None);
        assert_eq!(transcript.seconds_at(10.0), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(154.9), "02:34");
        assert_eq!(format_timestamp(3723.0), "01:02:03");
    }

    #[test]
    fn test_parse_input() {
        let languages = vec!["en".to_string()];

        let (source, id) = parse_input("https://youtu.be/dQw4w9WgXcQ", &languages).unwrap();
        assert_eq!(source.kind(), SourceKind::YouTube);
        assert_eq!(id, "dQw4w9WgXcQ");

        let (source, id) = parse_input("lecture.vtt", &languages).unwrap();
        assert_eq!(source.kind(), SourceKind::Local);
        assert_eq!(id, "lecture.vtt");

        assert!(parse_input("definitely not a video", &languages).is_none());
    }
}
