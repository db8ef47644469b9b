//! Fixed-window text chunker with configurable overlap.
//!
//! Chunk boundaries are a pure function of the text and the window
//! parameters, and chunk ids are `<resource_hash>:<chunk_index>`, so
//! chunking identical content always reproduces identical chunk
//! identities — re-indexing unchanged content writes nothing new.
//! Window edges are snapped back to UTF-8 char boundaries.

use crate::index::IndexedChunk;

/// Split `text` into windows of at most `chunk_size` bytes, each window
/// starting `chunk_size - overlap` bytes after the previous one.
///
/// Returns contiguous indices starting at 0. Empty text yields no
/// chunks (validation rejects empty content before it gets here).
/// `overlap` must be smaller than `chunk_size`; config validation
/// enforces this.
pub fn chunk_content(
    resource_hash: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<IndexedChunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < text.len() {
        let mut end = snap_to_char_boundary(text, (start + chunk_size).min(text.len()));
        if end <= start {
            // Multibyte char wider than the window; take the whole char.
            end = next_char_boundary(text, start + 1);
        }

        chunks.push(make_chunk(resource_hash, index, &text[start..end]));
        index += 1;

        if end == text.len() {
            break;
        }

        let mut next_start = snap_to_char_boundary(text, start + step);
        if next_start <= start {
            next_start = next_char_boundary(text, start + 1);
        }
        start = next_start;
    }

    chunks
}

/// Deterministic chunk identity for a `(resource_hash, chunk_index)` pair.
pub fn chunk_id(resource_hash: &str, chunk_index: i64) -> String {
    format!("{}:{}", resource_hash, chunk_index)
}

fn make_chunk(resource_hash: &str, index: i64, text: &str) -> IndexedChunk {
    IndexedChunk {
        id: chunk_id(resource_hash, index),
        resource_hash: resource_hash.to_string(),
        chunk_index: index,
        text: text.to_string(),
        embedding: None,
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn next_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
