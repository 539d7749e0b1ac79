//! Fixed-size character window chunker.
//!
//! Splits a source file into overlapping windows of `chunk_size`
//! characters, stepping by `chunk_size - overlap`. Offsets are measured in
//! characters, never bytes, so a window never cuts a multi-byte character.
//!
//! Each chunk gets a random UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, SourceFile};

/// Split `text` into overlapping windows.
/// Returns chunks with contiguous indices starting at 0; empty text yields none.
pub fn chunk_text(
    repo_id: &str,
    path: &str,
    extension: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let step = chunk_size.saturating_sub(overlap).max(1);

    // Byte offset of every char boundary, plus the end of the text.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let total_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(total_chars);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(
            repo_id,
            path,
            extension,
            chunk_index,
            start,
            end,
            piece,
        ));
        chunk_index += 1;

        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

/// Chunk a scanned source file.
pub fn chunk_file(repo_id: &str, file: &SourceFile, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    chunk_text(
        repo_id,
        &file.path,
        &file.extension,
        &file.text,
        chunk_size,
        overlap,
    )
}

fn make_chunk(
    repo_id: &str,
    path: &str,
    extension: &str,
    index: i64,
    start: usize,
    end: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        repo_id: repo_id.to_string(),
        chunk_index: index,
        path: path.to_string(),
        extension: extension.to_string(),
        start_char: start as i64,
        end_char: end as i64,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks_of(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
        chunk_text("r1", "src/a.py", "py", text, size, overlap)
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunks_of("print('hi')", 1000, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "print('hi')");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 11);
        assert_eq!(chunks[0].path, "src/a.py");
        assert_eq!(chunks[0].extension, "py");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunks_of("", 1000, 100).is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        // 25 chars, size 10, overlap 3 => starts 0, 7, 14, 21
        let text = "abcdefghijklmnopqrstuvwxy";
        let chunks = chunks_of(text, 10, 3);
        let spans: Vec<(i64, i64)> = chunks.iter().map(|c| (c.start_char, c.end_char)).collect();
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 24), (21, 25)]);
        assert_eq!(chunks[1].text, "hijklmnopq");
        assert!(chunks[0].text.ends_with(&chunks[1].text[..3]));
        assert_eq!(chunks.last().unwrap().end_char, 25);
    }

    #[test]
    fn test_exact_fit_has_no_tail_chunk() {
        let chunks = chunks_of("0123456789", 10, 2);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_indices_contiguous() {
        let text = "x".repeat(5_000);
        let chunks = chunks_of(&text, 1000, 100);
        assert_eq!(chunks.len(), 6);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
        assert_eq!(chunks.last().unwrap().end_char, 5_000);
    }

    #[test]
    fn test_multibyte_not_split() {
        let text = "héllo wörld ünïcode";
        let chunks = chunks_of(text, 4, 1);
        for c in &chunks {
            assert_eq!(c.text.chars().count() as i64, c.end_char - c.start_char);
        }
        assert_eq!(chunks[0].text, "héll");
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = chunks_of("same text", 100, 10);
        let b = chunks_of("same text", 100, 10);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
        assert_eq!(a[0].hash.len(), 64);
    }
}
