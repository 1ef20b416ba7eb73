//! Paragraph-boundary text splitter with overlap.
//!
//! Splits extracted text into pieces of at most `size` characters. Splitting
//! happens on paragraph boundaries (`\n\n`) where possible so that each piece
//! stays semantically coherent.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` and drop blank paragraphs.
//! 2. Accumulate paragraphs into a buffer until the next one would push the
//!    buffer past `size` characters, then flush the buffer as a piece.
//! 3. Start the next buffer with the last `overlap` characters of the flushed
//!    piece (aligned to a word start) when that still fits.
//! 4. A paragraph longer than `size` is hard-split at the nearest whitespace,
//!    consecutive windows sharing `overlap` characters.
//!
//! Lengths are counted in `char`s, so multi-byte text never splits inside a
//! code point.
//!
//! # Example
//!
//! ```rust
//! use ragsync_core::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 800, 80);
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use crate::models::Fragment;

/// Default piece size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;
/// Default overlap between consecutive pieces in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 80;

/// Split `text` into pieces of at most `size` characters.
///
/// Returns an empty vector for empty or whitespace-only input. The output is a
/// pure function of its arguments.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);

    let mut pieces = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_len = char_len(trimmed);

        let would_be = if buf.is_empty() {
            para_len
        } else {
            char_len(&buf) + 2 + para_len
        };

        if would_be > size && !buf.is_empty() {
            let carried = overlap_tail(&buf, overlap);
            pieces.push(std::mem::take(&mut buf));
            if !carried.is_empty() && char_len(&carried) + 2 + para_len <= size {
                buf = carried;
            }
        }

        if para_len > size {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            hard_split(trimmed, size, overlap, &mut pieces);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
        }
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
}

/// Split every fragment's text, keeping its file and page on each piece.
pub fn split_fragments(fragments: &[Fragment], size: usize, overlap: usize) -> Vec<Fragment> {
    fragments
        .iter()
        .flat_map(|fragment| {
            split_text(&fragment.text, size, overlap)
                .into_iter()
                .map(move |piece| Fragment {
                    text: piece,
                    source_file: fragment.source_file.clone(),
                    page: fragment.page,
                })
        })
        .collect::<Vec<_>>()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Windowed split of a single oversized paragraph.
fn hard_split(text: &str, size: usize, overlap: usize, out: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    let byte_at = |i: usize| if i >= n { text.len() } else { chars[i].0 };

    let mut start = 0;
    while start < n {
        let mut end = (start + size).min(n);
        if end < n {
            if let Some(ws) = (start + 1..end).rev().find(|&i| chars[i].1.is_whitespace()) {
                end = ws + 1;
            }
        }

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        if end >= n {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
}

/// Last `overlap` characters of `s`, moved forward to the next word start.
fn overlap_tail(s: &str, overlap: usize) -> String {
    let n = char_len(s);
    if overlap == 0 || n <= overlap {
        return String::new();
    }

    let start = s
        .char_indices()
        .nth(n - overlap)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let mid_word = s[..start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());

    let tail = &s[start..];
    let tail = if mid_word {
        match tail.find(char::is_whitespace) {
            Some(pos) => &tail[pos..],
            None => "",
        }
    } else {
        tail
    };
    tail.trim().to_string()
}
