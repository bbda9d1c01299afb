//! YouTube captions via yt-dlp.

use super::{parse_vtt, SourceKind, Transcript, TranscriptSource};
use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

/// Extract the video id from a YouTube URL or a bare 11-character id.
///
/// Handles `watch?v=`, `youtu.be/`, `/embed/`, `/shorts/`, `/live/` and `/v/`
/// forms, with or without scheme and `www.`.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let url = if input.starts_with("http://") || input.starts_with("https://") {
        Url::parse(input).ok()?
    } else {
        Url::parse(&format!("https://{}", input)).ok()?
    };

    let host = url.host_str()?;
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// YouTube transcript source.
pub struct YoutubeSource {
    languages: Vec<String>,
}

impl YoutubeSource {
    /// Create a source requesting captions in `languages`, most preferred first.
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    /// Download captions for `video_id` into `dir` using yt-dlp.
    async fn download_captions(&self, video_id: &str, dir: &Path) -> Result<()> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let template = dir.join("%(id)s.%(ext)s");
        let languages = self.languages.join(",");

        let output = tokio::process::Command::new("yt-dlp")
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                &languages,
                "--sub-format",
                "vtt",
                "--no-warnings",
                "-o",
                &template.to_string_lossy(),
                &url,
            ])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GlimpseError::ToolNotFound("yt-dlp".to_string())
                } else {
                    GlimpseError::TranscriptSource(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GlimpseError::ToolFailed(format!(
                "yt-dlp failed for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        Ok(())
    }

    /// Pick the caption file for the most preferred language that was written.
    fn pick_caption_file(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "vtt"))
            .collect();
        files.sort();

        let pattern = caption_language_pattern()?;
        for language in &self.languages {
            let found = files.iter().find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|name| pattern.captures(name))
                    .and_then(|caps| caps.get(1))
                    .is_some_and(|lang| {
                        let lang = lang.as_str();
                        lang == language || lang.starts_with(&format!("{}-", language))
                    })
            });
            if let Some(path) = found {
                return Ok(Some(path.clone()));
            }
        }

        Ok(files.into_iter().next())
    }
}

/// `<id>.<lang>.vtt`, capturing the language tag.
fn caption_language_pattern() -> Result<Regex> {
    Regex::new(r"\.([A-Za-z]{2,3}(?:-[A-Za-z0-9]+)*)\.vtt$")
        .map_err(|e| GlimpseError::Config(format!("invalid caption pattern: {}", e)))
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new(vec!["en".to_string()])
    }
}

#[async_trait]
impl TranscriptSource for YoutubeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<Transcript> {
        let video_id = extract_video_id(id).ok_or_else(|| {
            GlimpseError::InvalidInput(format!("Invalid YouTube video ID or URL: {}", id))
        })?;

        let dir = tempfile::tempdir()?;
        self.download_captions(&video_id, dir.path()).await?;

        let path = self.pick_caption_file(dir.path())?.ok_or_else(|| {
            GlimpseError::TranscriptNotFound(format!(
                "no captions in [{}] for video {}",
                self.languages.join(", "),
                video_id
            ))
        })?;
        debug!("Using captions from {:?}", path);

        let content = tokio::fs::read_to_string(&path).await?;
        let cues = parse_vtt(&content);
        if cues.is_empty() {
            return Err(GlimpseError::TranscriptNotFound(format!(
                "captions for video {} are empty",
                video_id
            )));
        }

        let transcript = Transcript::from_cues(video_id, cues);
        info!(
            "Fetched {} caption cues ({} words)",
            transcript.cues.len(),
            transcript.word_count()
        );
        Ok(transcript)
    }

    fn extract_id(&self, input: &str) -> Option<String> {
        extract_video_id(input)
    }
}
