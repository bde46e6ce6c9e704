//! Question answering chain: retrieve, stuff, generate

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::{LlmProvider, Reranker};
use crate::retrieval::{CommaSeparatedListParser, MultiQueryRetriever, Retriever};
use crate::types::{Answer, ScoredChunk};

use super::prompt::PromptBuilder;

/// Answers questions from retrieved paper chunks
pub struct QuestionAnswerer {
    llm: Arc<dyn LlmProvider>,
    retrieval: RetrievalConfig,
    reranker: Option<(Arc<dyn Reranker>, usize)>,
}

impl QuestionAnswerer {
    pub fn new(llm: Arc<dyn LlmProvider>, retrieval: RetrievalConfig) -> Self {
        Self {
            llm,
            retrieval,
            reranker: None,
        }
    }

    /// Rerank retrieved chunks and keep the best `top_n`
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>, top_n: usize) -> Self {
        self.reranker = Some((reranker, top_n));
        self
    }

    /// Alternative phrasings of `question` as a comma separated list
    pub async fn generate_queries(&self, question: &str) -> Vec<String> {
        let prompt = PromptBuilder::build_query_prompt(question);
        let queries = match self.llm.generate(&prompt).await {
            Ok(text) => CommaSeparatedListParser::parse(&text),
            Err(e) => {
                tracing::warn!("Query generation failed: {}", e);
                Vec::new()
            }
        };

        if queries.is_empty() {
            vec![question.to_string()]
        } else {
            queries
        }
    }

    /// Answer a question using chunks from `retriever`
    pub async fn ask_question(&self, question: &str, retriever: Arc<dyn Retriever>) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::internal("Question is empty"));
        }

        tracing::info!("Processing question: {}", question);

        let (queries, results) = if self.retrieval.multi_query {
            MultiQueryRetriever::new(Arc::clone(&self.llm), retriever)
                .with_original(self.retrieval.include_original)
                .retrieve_with_queries(question)
                .await?
        } else {
            (vec![question.to_string()], retriever.retrieve(question).await?)
        };

        let results = self.rerank(question, results).await;
        if results.is_empty() {
            tracing::warn!("No relevant chunks found for question");
        }

        let context = PromptBuilder::stuff_documents(&results);
        let prompt = PromptBuilder::build_answer_prompt(question, &context);
        let answer = self.llm.generate(&prompt).await?;

        tracing::info!("Generated answer from {} chunks", results.len());

        Ok(Answer {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            queries,
            sources: results.into_iter().map(|r| r.chunk.source).collect(),
        })
    }

    async fn rerank(&self, question: &str, results: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let Some((reranker, top_n)) = &self.reranker else {
            return results;
        };
        if results.is_empty() {
            return results;
        }

        match reranker.rerank(question, results.clone()).await {
            Ok(mut reranked) => {
                reranked.truncate(*top_n);
                tracing::debug!("{} kept {} chunks", reranker.name(), reranked.len());
                reranked
            }
            Err(e) => {
                tracing::warn!("Reranking failed, keeping retrieval order: {}", e);
                results
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::NO_ANSWER;
    use crate::testing::{seeded_store, ScriptedLlm};
    use async_trait::async_trait;

    /// Reverses the order it is given
    struct ReverseReranker;

    #[async_trait]
    impl Reranker for ReverseReranker {
        async fn rerank(&self, _query: &str, mut results: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>> {
            results.reverse();
            Ok(results)
        }

        fn name(&self) -> &str {
            "reverse"
        }
    }

    fn retrieval(multi_query: bool) -> RetrievalConfig {
        RetrievalConfig {
            top_k: 1,
            multi_query,
            include_original: false,
        }
    }

    #[tokio::test]
    async fn test_ask_question() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let llm = Arc::new(ScriptedLlm::new(
            "What is BLEU?\nHow does attention work?",
            "  BLEU measures n-gram overlap.\n",
        ));

        let qa = QuestionAnswerer::new(llm.clone(), retrieval(true));
        let answer = qa
            .ask_question("  How are translations scored? ", Arc::new(store.as_retriever(1)))
            .await
            .unwrap();

        assert_eq!(answer.question, "How are translations scored?");
        assert_eq!(answer.answer, "BLEU measures n-gram overlap.");
        assert_eq!(answer.queries.len(), 2);
        assert_eq!(answer.citations(), vec!["mt.pdf, Page 7", "transformer.pdf, Page 3"]);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains(
            "BLEU compares n-grams against references.\n\nMulti-head attention attends to all positions."
        ));
        assert!(prompts[1].contains("Question: How are translations scored?"));
    }

    #[tokio::test]
    async fn test_single_query_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let llm = Arc::new(ScriptedLlm::new("unused", "Kernels slide."));

        let qa = QuestionAnswerer::new(llm.clone(), retrieval(false));
        let answer = qa
            .ask_question("What does a convolution do?", Arc::new(store.as_retriever(1)))
            .await
            .unwrap();

        assert_eq!(answer.queries, vec!["What does a convolution do?"]);
        assert_eq!(answer.sources[0].filename, "cnn.pdf");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_still_asks_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            crate::store::DocumentStore::open(
                &crate::testing::config_in(dir.path()),
                Arc::new(crate::testing::KeywordEmbedder::new()),
            )
            .unwrap(),
        );
        let llm = Arc::new(ScriptedLlm::new("What is BLEU?", NO_ANSWER));

        let qa = QuestionAnswerer::new(llm.clone(), retrieval(true));
        let answer = qa.ask_question("What is BLEU?", Arc::new(store.as_retriever(3))).await.unwrap();

        assert_eq!(answer.answer, NO_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(llm.prompts()[1].contains("Context: \n"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let qa = QuestionAnswerer::new(Arc::new(ScriptedLlm::failing()), retrieval(true));

        let err = qa
            .ask_question("What is BLEU?", Arc::new(store.as_retriever(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));

        assert!(qa.ask_question("   ", Arc::new(store.as_retriever(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_reranker_reorders_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let llm = Arc::new(ScriptedLlm::new(
            "What is BLEU?\nWhat is attention?\nWhat is a recurrent cell?",
            "ok",
        ));

        let qa = QuestionAnswerer::new(llm, retrieval(true)).with_reranker(Arc::new(ReverseReranker), 2);
        let answer = qa.ask_question("Summarize", Arc::new(store.as_retriever(1))).await.unwrap();

        let files: Vec<_> = answer.sources.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(files, vec!["rnn.pdf", "transformer.pdf"]);
    }

    #[tokio::test]
    async fn test_generate_queries_comma_list() {
        let qa = QuestionAnswerer::new(
            Arc::new(ScriptedLlm::new("What is BLEU?, How is BLEU computed?", "unused")),
            retrieval(true),
        );
        assert_eq!(
            qa.generate_queries("BLEU?").await,
            vec!["What is BLEU?", "How is BLEU computed?"]
        );

        let qa = QuestionAnswerer::new(Arc::new(ScriptedLlm::failing()), retrieval(true));
        assert_eq!(qa.generate_queries("BLEU?").await, vec!["BLEU?"]);
    }
}
