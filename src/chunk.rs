//! Paragraph-boundary splitting of oversized segments.
//!
//! Loaders may return very large segments (a whole text file, a whole DOCX).
//! Before embedding, each segment is split on paragraph boundaries (`\n\n`)
//! so no piece exceeds `max_chars`; a single paragraph longer than the limit
//! is hard-split on character boundaries. Page numbers carry over to every
//! piece cut from a segment. Blank pieces are dropped.

use crate::models::ContentSegment;

/// Split every segment so that no piece exceeds `max_chars` characters.
pub fn split_segments(segments: Vec<ContentSegment>, max_chars: usize) -> Vec<ContentSegment> {
    segments
        .into_iter()
        .flat_map(|segment| {
            let page = segment.page;
            split_text(&segment.text, max_chars)
                .into_iter()
                .map(move |text| ContentSegment { text, page })
        })
        .collect()
}

fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_len = trimmed.chars().count();

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current.is_empty() {
            para_len
        } else {
            current_len + 2 + para_len
        };
        if would_be > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len > max_chars {
            let chars: Vec<char> = trimmed.chars().collect();
            for window in chars.chunks(max_chars) {
                let piece: String = window.iter().collect();
                if !piece.trim().is_empty() {
                    pieces.push(piece);
                }
            }
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(trimmed);
        current_len += para_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_piece() {
        let out = split_segments(vec![ContentSegment::new("Hello.\n\nWorld.")], 100);
        assert_eq!(out, vec![ContentSegment::new("Hello.\n\nWorld.")]);
    }

    #[test]
    fn paragraphs_pack_up_to_limit() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        let out = split_segments(vec![ContentSegment::new(text)], 10);
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn long_paragraph_is_hard_split_and_keeps_page() {
        let out = split_segments(vec![ContentSegment::with_page("abcdefghij", 4)], 4);
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
        assert!(out.iter().all(|s| s.page == Some(4)));
    }

    #[test]
    fn blank_segments_vanish() {
        let out = split_segments(
            vec![ContentSegment::new("  \n\n \n"), ContentSegment::new("")],
            50,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let out = split_segments(vec![ContentSegment::new("ééééé")], 2);
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["éé", "éé", "é"]);
    }
}
