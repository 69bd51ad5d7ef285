//! Text normalization, chunking, and content-hash deduplication.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::types::DocumentChunk;

/// Entities that survive lenient HTML parsers and show up in extracted text.
const HTML_ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Collapses whitespace runs and decodes common HTML entities.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut cleaned = whitespace_re().replace_all(text.trim(), " ").into_owned();
    for (entity, replacement) in HTML_ENTITIES {
        if cleaned.contains(entity) {
            cleaned = cleaned.replace(entity, replacement);
        }
    }
    cleaned
}

/// Splits `text` into overlapping, sentence-aligned segments.
///
/// Text at or under `max_chunk_size` characters is returned as the sole
/// chunk. Otherwise a window slides over the text; when a `.` falls between
/// the window midpoint and the tentative end, the chunk ends just after it so
/// whole sentences stay together. The window start advances by at least one
/// character per iteration, so the loop terminates even when
/// `overlap >= max_chunk_size`.
pub fn chunk_text(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + max_chunk_size).min(chars.len());

        if end < chars.len() {
            if let Some(offset) = chars[start..end].iter().rposition(|&c| c == '.') {
                let sentence_end = start + offset;
                if sentence_end > start + max_chunk_size / 2 {
                    end = sentence_end + 1;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// SHA-256 hex digest of the content, used as the dedupe identity.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

/// Drops chunks whose content hashes to one already seen, preserving order.
///
/// Duplicate support pages behind multiple URLs are common (`/help` and
/// `/support` frequently serve the same document); identity is content only,
/// never URL.
pub fn dedupe_chunks(chunks: Vec<DocumentChunk>) -> Vec<DocumentChunk> {
    let mut seen: HashSet<String> = HashSet::with_capacity(chunks.len());
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(content_hash(&chunk.content)))
        .collect()
}
