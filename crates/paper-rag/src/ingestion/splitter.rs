//! Recursive character splitting with overlap and start offsets

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Page};

/// Paragraph, line, word, then grapheme boundaries
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator that keeps pieces under `chunk_size`,
/// then merges neighbouring pieces back up to `chunk_size` with `chunk_overlap`
/// characters carried over between chunks.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    add_start_index: bool,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter with the default separators
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            add_start_index: true,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap).with_start_index(config.add_start_index)
    }

    pub fn with_start_index(mut self, add_start_index: bool) -> Self {
        self.add_start_index = add_start_index;
        self
    }

    /// Split raw text into chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split pages into chunks, carrying the page source and start offset
    pub fn split_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            let mut index = 0usize;
            let mut previous_len = 0usize;

            for (chunk_index, content) in self.split_text(&page.content).into_iter().enumerate() {
                let mut source = page.source.clone();

                if self.add_start_index {
                    let offset = (index + previous_len).saturating_sub(self.chunk_overlap);
                    match find_from(&page.content, &content, offset) {
                        Some(found) => {
                            index = found;
                            source.start_index = Some(found);
                        }
                        None => source.start_index = None,
                    }
                    previous_len = char_len(&content);
                }

                chunks.push(Chunk::new(content, source, chunk_index as u32));
            }
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // Pick the first separator that occurs in the text
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                if let Some(trimmed) = non_blank(piece) {
                    final_chunks.push(trimmed);
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily combine pieces into chunks, keeping a tail of at most `chunk_overlap` characters
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_pieces(&current) {
                    docs.push(doc);
                }

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// Split so each separator occurrence starts the following piece; empty pieces dropped
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.graphemes(true).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn join_pieces(pieces: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    non_blank(&joined)
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Character index of `needle` in `haystack`, searching from character `from`
fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = haystack
        .char_indices()
        .nth(from)
        .map(|(b, _)| b)
        .unwrap_or(haystack.len());

    haystack[byte_from..]
        .find(needle)
        .map(|b| char_len(&haystack[..byte_from + b]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRef;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveCharacterSplitter::new(100, 10);
        assert_eq!(splitter.split_text("  Attention is all you need.  "), vec!["Attention is all you need."]);
        assert!(splitter.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_splits_on_paragraphs_first() {
        let splitter = RecursiveCharacterSplitter::new(15, 0);
        let chunks = splitter.split_text("one two three\n\nfour five six");
        assert_eq!(chunks, vec!["one two three", "four five six"]);
    }

    #[test]
    fn test_word_overlap() {
        let splitter = RecursiveCharacterSplitter::new(5, 2);
        let chunks = splitter.split_text("a b c d e f g h i j");
        assert_eq!(chunks.len(), 8);
        assert_eq!(chunks[0], "a b c");
        assert_eq!(chunks[1], "c d");
        assert_eq!(chunks[2], "d e");
        assert_eq!(chunks[7], "i j");
    }

    #[test]
    fn test_long_word_falls_back_to_graphemes() {
        let splitter = RecursiveCharacterSplitter::new(4, 0);
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_start_index() {
        let splitter = RecursiveCharacterSplitter::new(15, 0);
        let page = Page::new("one two three\n\nfour five six", SourceRef::pdf("p.pdf", 1, 1));
        let chunks = splitter.split_pages(&[page]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source.start_index, Some(0));
        assert_eq!(chunks[1].source.start_index, Some(15));
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].source.page_number, Some(1));
    }

    #[test]
    fn test_start_index_counts_characters() {
        let splitter = RecursiveCharacterSplitter::new(6, 0);
        let page = Page::new("αβγ δεζ ηθι", SourceRef::pdf("greek.pdf", 1, 1));
        let chunks = splitter.split_pages(&[page]);

        let starts: Vec<_> = chunks.iter().map(|c| c.source.start_index).collect();
        assert_eq!(starts, vec![Some(0), Some(4), Some(8)]);
    }

    #[test]
    fn test_start_index_disabled() {
        let splitter = RecursiveCharacterSplitter::new(15, 0).with_start_index(false);
        let page = Page::new("one two three\n\nfour five six", SourceRef::pdf("p.pdf", 1, 1));
        assert!(splitter.split_pages(&[page]).iter().all(|c| c.source.start_index.is_none()));
    }

    proptest! {
        #[test]
        fn prop_chunks_fit_and_come_from_text(text in "[a-z]{1,12}( [a-z]{1,12}|\n|\n\n){0,80}") {
            let splitter = RecursiveCharacterSplitter::new(40, 8);
            for chunk in splitter.split_text(&text) {
                prop_assert!(chunk.chars().count() <= 40);
                prop_assert!(!chunk.trim().is_empty());
                prop_assert!(text.contains(&chunk));
            }
        }

        #[test]
        fn prop_every_word_is_kept(text in "[a-z]{1,12}( [a-z]{1,12}){0,60}") {
            let splitter = RecursiveCharacterSplitter::new(30, 5);
            let joined = splitter.split_text(&text).join(" ");
            for word in text.split(' ') {
                prop_assert!(joined.contains(word));
            }
        }
    }
}
