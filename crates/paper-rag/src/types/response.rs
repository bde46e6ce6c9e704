//! Retrieval results and answers

use serde::{Deserialize, Serialize};

use super::document::{Chunk, SourceRef};

/// A retrieved chunk with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Similarity score (higher is better)
    pub similarity: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, similarity: f32) -> Self {
        Self { chunk, similarity }
    }
}

/// Answer to a question, with what was searched and where the context came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The question as asked
    pub question: String,
    /// Generated answer text
    pub answer: String,
    /// Search queries actually run against the store
    pub queries: Vec<String>,
    /// Sources of the chunks given to the model, in context order
    pub sources: Vec<SourceRef>,
}

impl Answer {
    /// Distinct citations, first occurrence order
    pub fn citations(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for source in &self.sources {
            let citation = source.format_citation();
            if !seen.contains(&citation) {
                seen.push(citation);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citations_are_deduplicated() {
        let answer = Answer {
            question: "q".to_string(),
            answer: "a".to_string(),
            queries: vec![],
            sources: vec![
                SourceRef::pdf("a.pdf", 1, 3),
                SourceRef::pdf("b.pdf", 2, 3),
                SourceRef::pdf("a.pdf", 1, 3),
            ],
        };

        assert_eq!(answer.citations(), vec!["a.pdf, Page 1", "b.pdf, Page 2"]);
    }
}
