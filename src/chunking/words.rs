//! Word-window chunking implementation.

use super::{Chunk, ChunkingConfig};
use crate::error::Result;

/// Characters that may trail a sentence terminator ("end." or (end.) or end.").
const CLOSERS: &[char] = &['"', '\'', ')', ']', '}', '\u{201d}', '\u{2019}', '\u{bb}'];

/// Characters that end a sentence.
const TERMINATORS: &[char] = &['.', '!', '?', '\u{2026}'];

/// Byte span of one whitespace-delimited word.
#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
}

/// Splits text into overlapping windows of words.
#[derive(Debug, Clone)]
pub struct WordChunker {
    config: ChunkingConfig,
}

impl WordChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split text into chunks. Empty or whitespace-only text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let words = word_spans(text);
        if words.is_empty() {
            return Vec::new();
        }

        let n = words.len();
        let mut chunks = Vec::new();
        let mut first = 0;

        loop {
            let mut last = (first + self.config.chunk_size).min(n);
            if last < n {
                last = self.boundary_cut(text, &words, first, last);
            }

            let start = if first == 0 { 0 } else { words[first].start };
            let end = if last == n { text.len() } else { words[last].start };

            chunks.push(Chunk {
                order: chunks.len(),
                start,
                end,
                content: text[start..end].trim().to_string(),
            });

            if last == n {
                break;
            }

            // boundary_cut keeps more than `overlap` words, so this always advances
            first = (last - self.config.overlap).max(first + 1);
        }

        chunks
    }

    /// Pull the exclusive end `last` back to the nearest natural boundary
    /// inside the lookback window, keeping more than `overlap` words.
    fn boundary_cut(&self, text: &str, words: &[Word], first: usize, last: usize) -> usize {
        let floor = (first + self.config.overlap + 1).max(last.saturating_sub(self.config.boundary_lookback));

        (floor..=last)
            .rev()
            .find(|&cut| is_boundary_after(text, words, cut - 1))
            .unwrap_or(last)
    }
}

/// Whether a natural boundary follows word `i`: a sentence terminator or a line break.
fn is_boundary_after(text: &str, words: &[Word], i: usize) -> bool {
    let word = &text[words[i].start..words[i].end];
    let ends_sentence = word
        .trim_end_matches(CLOSERS)
        .ends_with(TERMINATORS);

    let line_break = words
        .get(i + 1)
        .map(|next| text[words[i].end..next.start].contains('\n'))
        .unwrap_or(false);

    ends_sentence || line_break
}

fn word_spans(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match (ch.is_whitespace(), current) {
            (true, Some(start)) => {
                words.push(Word { start, end: idx });
                current = None;
            }
            (false, None) => current = Some(idx),
            _ => {}
        }
    }
    if let Some(start) = current {
        words.push(Word {
            start,
            end: text.len(),
        });
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::split;
    use crate::error::GlimpseError;

    fn chunker(chunk_size: usize, overlap: usize, lookback: usize) -> WordChunker {
        WordChunker::new(
            ChunkingConfig::new(chunk_size, overlap)
                .unwrap()
                .with_boundary_lookback(lookback),
        )
        .unwrap()
    }

    /// Stitch the non-overlapping part of every span back together.
    fn reconstruct(text: &str, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut cursor = 0;
        for chunk in chunks {
            assert!(chunk.start <= cursor, "gap before chunk {}", chunk.order);
            out.push_str(&text[cursor.max(chunk.start)..chunk.end]);
            cursor = chunk.end;
        }
        out
    }

    fn contents(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn test_letters_example() {
        let chunks = split("A B C D E F G H", 4, 2).unwrap();
        assert_eq!(contents(&chunks), vec!["A B C D", "C D E F", "E F G H"]);
        assert_eq!(
            chunks.iter().map(|c| c.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_empty_text() {
        assert!(split("", 4, 2).unwrap().is_empty());
        assert!(split("  \n\t ", 4, 2).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split("hello world", 10, 3).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 11));
    }

    #[test]
    fn test_last_chunk_may_be_shorter() {
        let chunks = split("a b c d e f g", 4, 1).unwrap();
        assert_eq!(contents(&chunks), vec!["a b c d", "d e f g"]);

        let chunks = split("a b c d e f g h", 4, 1).unwrap();
        assert_eq!(contents(&chunks), vec!["a b c d", "d e f g", "g h"]);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            split("text", 0, 0),
            Err(GlimpseError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            split("text", 3, 3),
            Err(GlimpseError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            split("text", 3, 5),
            Err(GlimpseError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let c = chunker(5, 1, 3);
        let chunks = c.split("One two three. Four five six seven.");
        assert_eq!(
            contents(&chunks),
            vec!["One two three.", "three. Four five six seven."]
        );
    }

    #[test]
    fn test_sentence_boundary_with_closing_quote() {
        let c = chunker(4, 0, 2);
        let chunks = c.split("He said \"stop.\" Then we left the room quietly");
        assert_eq!(chunks[0].content, "He said \"stop.\"");
    }

    #[test]
    fn test_prefers_line_break() {
        let c = chunker(4, 0, 2);
        let chunks = c.split("alpha beta gamma\ndelta epsilon zeta eta");
        assert_eq!(chunks[0].content, "alpha beta gamma");
        assert_eq!(chunks[1].content, "delta epsilon zeta eta");
    }

    #[test]
    fn test_boundary_never_eats_the_overlap() {
        // The only terminator is too early to cut at without stalling.
        let c = chunker(4, 2, 10);
        let chunks = c.split("Hi. b c d e f g");
        assert_eq!(chunks[0].content, "Hi. b c d");
        assert!(chunks.windows(2).all(|w| w[1].start > w[0].start));
    }

    #[test]
    fn test_deterministic() {
        let text = "The mitochondria is the powerhouse of the cell. It produces ATP! \
                    Does it do anything else? Yes, it also regulates apoptosis.\n\
                    Next we look at ribosomes, which build proteins.";
        for (size, overlap) in [(3, 0), (5, 2), (8, 7), (50, 10)] {
            let a = split(text, size, overlap).unwrap();
            let b = split(text, size, overlap).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_reconstructs_original_text() {
        let text = "  Welcome back!  Today:\n\nwe cover   vectors, norms, and the dot product. \
                    Cosine similarity follows naturally. Ünïcödé wörds stay intact… ok?  ";
        for (size, overlap, lookback) in [(1, 0, 0), (3, 1, 2), (4, 3, 4), (6, 2, 10), (100, 20, 10)] {
            let chunks = chunker(size, overlap, lookback).split(text);
            assert_eq!(reconstruct(text, &chunks), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..57).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split(&text, 10, 3).unwrap();
        for chunk in &chunks {
            assert!(chunk.content.split_whitespace().count() <= 10);
        }
        // Consecutive chunks share exactly `overlap` words when no boundary interferes.
        let first: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let second: Vec<&str> = chunks[1].content.split_whitespace().collect();
        assert_eq!(&first[7..], &second[..3]);
    }
}
