//! Prompt templates for query expansion and answering

use crate::types::ScoredChunk;

/// Answer used when the context does not cover the question
pub const NO_ANSWER: &str = "I don't have enough information to answer that.";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Ask the model for alternative phrasings of a question
    pub fn build_query_prompt(question: &str) -> String {
        format!(
            r#"You are an AI language model tasked with generating multiple search queries
for finding relevant information to answer a question. Generate multiple different ways to ask
the following question that will help get relevant information from a vector database.
Make the queries diverse to capture different aspects of the question.

Original question: {question}

Generate different versions of the question, separated by commas:
"#,
            question = question
        )
    }

    /// Ask the model to answer from the stuffed context only
    pub fn build_answer_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Use the following pieces of context to answer the question.
If you cannot answer based on the context, say "{no_answer}"

Context: {context}

Question: {question}

Answer:"#,
            no_answer = NO_ANSWER,
            context = context,
            question = question
        )
    }

    /// Concatenate chunk contents separated by a blank line
    pub fn stuff_documents(results: &[ScoredChunk]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, SourceRef};

    fn scored(content: &str) -> ScoredChunk {
        ScoredChunk::new(
            Chunk::new(content.to_string(), SourceRef::pdf("p.pdf", 1, 1), 0),
            0.5,
        )
    }

    #[test]
    fn test_stuff_documents() {
        let context = PromptBuilder::stuff_documents(&[scored("first"), scored("second")]);
        assert_eq!(context, "first\n\nsecond");
        assert_eq!(PromptBuilder::stuff_documents(&[]), "");
    }

    #[test]
    fn test_answer_prompt() {
        let prompt = PromptBuilder::build_answer_prompt("What is BLEU?", "BLEU is a metric.");
        assert!(prompt.contains("Context: BLEU is a metric."));
        assert!(prompt.contains("Question: What is BLEU?"));
        assert!(prompt.contains(NO_ANSWER));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn test_query_prompt() {
        let prompt = PromptBuilder::build_query_prompt("How are transformers trained?");
        assert!(prompt.contains("Original question: How are transformers trained?"));
        assert!(prompt.contains("separated by commas"));
    }
}
