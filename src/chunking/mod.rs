#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Input below this length is too small to be a useful retrieval unit.
const MIN_CHUNKABLE_LEN: usize = 50;

/// Boundary candidates are only searched in the tail of each window.
const BOUNDARY_SEARCH_WINDOW: usize = 200;

static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s").expect("sentence boundary pattern is valid"));

/// Split text into overlapping chunks using semantic boundaries.
///
/// Windows of `chunk_size` bytes are carved from the text, with each window's end
/// pulled back to the best boundary found in its last `min(chunk_size, 200)` bytes:
/// a paragraph break, then a sentence end, then any whitespace. Adjacent chunks
/// share up to `overlap` bytes. Sizes are measured in bytes of UTF-8 text and cut
/// points are snapped to character boundaries, so multi-byte input never splits
/// inside a character.
///
/// Pure function of its arguments: identical input always yields identical chunks.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.len() < MIN_CHUNKABLE_LEN {
        return Vec::new();
    }

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let raw_end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        let mut end = raw_end;

        // Only snap to a boundary when this is not the final chunk
        if end < text.len() {
            let search_start =
                ceil_char_boundary(text, start + chunk_size.saturating_sub(BOUNDARY_SEARCH_WINDOW));
            if let Some(boundary) = find_boundary(&text[search_start..end]) {
                let snapped = search_start + boundary;
                if snapped > start {
                    end = snapped;
                }
            }
        }

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= text.len() {
            break;
        }

        // Back up by the overlap, but always make forward progress
        start = ceil_char_boundary(text, end.saturating_sub(overlap).max(start + 1));
    }

    debug!("Created {} chunks from {} bytes", chunks.len(), text.len());
    chunks
}

/// Find the best cut point in the window tail, highest priority first.
/// Returns an offset relative to the window start, positioned just past the
/// boundary (or just past the punctuation for sentence ends).
fn find_boundary(window: &str) -> Option<usize> {
    if let Some(pos) = window.rfind("\n\n") {
        return Some(pos + 2);
    }

    if let Some(m) = SENTENCE_BOUNDARY
        .find_iter(window)
        .filter_map(std::result::Result::ok)
        .last()
    {
        // Cut just after the punctuation character, leaving the whitespace
        // to be trimmed from the next chunk
        return Some(m.start() + 1);
    }

    window
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
