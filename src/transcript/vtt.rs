//! WebVTT caption parsing.

use super::Cue;

/// Parse WebVTT captions into cues.
///
/// Header, `NOTE`, `STYLE` and `REGION` blocks are skipped, cue settings are
/// ignored, inline tags are stripped and common entities decoded. YouTube
/// auto-captions repeat the previous line at the top of every cue; repeated
/// lines are dropped so each spoken line appears once.
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    let content = content.replace("\r\n", "\n");
    let mut cues: Vec<Cue> = Vec::new();
    let mut previous_lines: Vec<String> = Vec::new();

    for block in blocks(&content) {
        let Some(timing_at) = block.iter().position(|line| line.contains("-->")) else {
            continue;
        };
        let Some((start, end)) = parse_timing(block[timing_at]) else {
            continue;
        };

        let lines: Vec<String> = block[timing_at + 1..]
            .iter()
            .map(|line| clean_line(line))
            .filter(|line| !line.is_empty())
            .collect();

        let fresh: Vec<&str> = lines
            .iter()
            .filter(|line| !previous_lines.contains(line))
            .map(String::as_str)
            .collect();

        if fresh.is_empty() {
            if let Some(last) = cues.last_mut() {
                last.end = last.end.max(end);
            }
        } else {
            cues.push(Cue {
                start,
                end,
                text: fresh.join(" "),
            });
        }

        if !lines.is_empty() {
            previous_lines = lines;
        }
    }

    cues
}

/// Group lines into blank-line separated blocks, dropping non-cue blocks.
fn blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }

    blocks
        .into_iter()
        .filter(|block| {
            let first = block[0].trim_start();
            !["WEBVTT", "NOTE", "STYLE", "REGION"]
                .iter()
                .any(|keyword| first.starts_with(keyword))
        })
        .collect()
}

fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start)?, parse_timestamp(end)?))
}

/// `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn clean_line(line: &str) -> String {
    decode_entities(&strip_tags(line))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
