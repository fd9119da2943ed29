//! Marker-based segmentation
//!
//! The payload is scanned line by line. A line consisting only of
//! `Prompt` (any case), optionally followed by a number, opens a new
//! segment. Lines before the first marker are discarded. Inside a segment,
//! the first `Resumo:` (any case) cuts off everything up to the next marker.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^prompt\s*\d*$").expect("marker pattern is valid"));

static SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)resumo:").expect("summary pattern is valid"));

/// One candidate prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based position among emitted segments
    pub index: usize,
    /// Text between this marker and the next, as received
    pub raw: String,
    /// Truncated at `Resumo:`, whitespace collapsed and trimmed
    pub content: String,
    /// Length of `content` in characters
    pub length: usize,
}

/// Split a payload into ordered, non-empty segments
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<SegmentBuffer> = None;

    for line in text.lines() {
        if is_marker(line) {
            if let Some(buffer) = current.take() {
                buffer.flush_into(&mut segments);
            }
            current = Some(SegmentBuffer::default());
            continue;
        }

        if let Some(buffer) = current.as_mut() {
            buffer.push_line(line);
        }
    }

    if let Some(buffer) = current {
        buffer.flush_into(&mut segments);
    }

    segments
}

/// True when `line` opens a new segment
pub fn is_marker(line: &str) -> bool {
    MARKER.is_match(line.trim())
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct SegmentBuffer {
    raw: String,
    kept: String,
    truncated: bool,
}

impl SegmentBuffer {
    fn push_line(&mut self, line: &str) {
        self.raw.push_str(line);
        self.raw.push('\n');

        if self.truncated {
            return;
        }

        match SUMMARY.find(line) {
            Some(m) => {
                self.kept.push_str(&line[..m.start()]);
                self.truncated = true;
            }
            None => self.kept.push_str(line),
        }
        self.kept.push('\n');
    }

    fn flush_into(self, segments: &mut Vec<Segment>) {
        let content = normalize(&self.kept);
        if content.is_empty() {
            return;
        }

        segments.push(Segment {
            index: segments.len(),
            length: content.chars().count(),
            raw: self.raw,
            content,
        });
    }
}
