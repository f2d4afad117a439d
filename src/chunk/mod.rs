//! Text chunking
//!
//! Splits extracted text into overlapping fixed-size windows with stable
//! character offsets. The function is pure and deterministic: identical
//! `(text, size, overlap)` always produces identical output. Offsets and
//! sizes are measured in characters so a window never splits a multi-byte
//! sequence.

use crate::error::{Error, Result};

/// A text chunk with its position in the extracted text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk's literal span
    pub text: String,

    /// Chunk index (0-based, contiguous per document)
    pub index: usize,

    /// Character offset into the original extracted text
    pub offset: usize,
}

/// Chunk text with a sliding window.
///
/// Consecutive chunks start `size - overlap` characters apart; the final
/// chunk may be shorter than `size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    if size == 0 {
        return Err(Error::Config("chunk size must be positive".to_string()));
    }
    if overlap >= size {
        return Err(Error::Config(
            "chunk overlap must be smaller than chunk size".to_string(),
        ));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte position of every character boundary, plus the end of the text,
    // so windows can be sliced by character count.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while start < total_chars {
        let end = std::cmp::min(start + size, total_chars);

        chunks.push(TextChunk {
            text: text[boundaries[start]..boundaries[end]].to_string(),
            index,
            offset: start,
        });
        index += 1;

        if end == total_chars {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = chunk_text("", 1000, 200).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("hello world", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_2400_chars_at_defaults() {
        let text = "a".repeat(2400);
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            chunks.iter().map(|c| c.offset).collect::<Vec<_>>(),
            vec![0, 800, 1600]
        );
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[2].text.len(), 800);
    }

    #[test]
    fn test_idempotence() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(120);
        let first = chunk_text(&text, 1000, 200).unwrap();
        let second = chunk_text(&text, 1000, 200).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_indexes_contiguous_and_offsets_monotonic() {
        let text = "word ".repeat(700);
        let chunks = chunk_text(&text, 500, 100).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
            assert_eq!(pair[1].offset - pair[0].offset, 400);
        }
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let text = "héllo wörld 日本語のテキスト 🎉 ".repeat(100);
        let chunks = chunk_text(&text, 100, 20).unwrap();

        // Every chunk must be valid UTF-8 by construction; verify the spans
        // reassemble when overlap is stripped.
        let step_chars = 80;
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].offset - pair[0].offset, step_chars);
        }
        let total_chars: usize = text.chars().count();
        let last = chunks.last().unwrap();
        assert_eq!(last.offset + last.text.chars().count(), total_chars);
    }

    #[test]
    fn test_overlap_repeats_tail_of_previous_chunk() {
        let text: String = ('a'..='z').cycle().take(300).collect();
        let chunks = chunk_text(&text, 100, 30).unwrap();

        let first_tail: String = chunks[0].text.chars().skip(70).collect();
        let second_head: String = chunks[1].text.chars().take(30).collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(chunk_text("text", 0, 0).is_err());
        assert!(chunk_text("text", 100, 100).is_err());
        assert!(chunk_text("text", 100, 150).is_err());
    }

    #[test]
    fn test_no_gap_between_windows() {
        let text = "x".repeat(1999);
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        // 0..1000, 800..1800, 1600..1999
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].offset, 1600);
        assert_eq!(chunks[2].text.len(), 399);
    }
}
