//! Query expansion: ask the model for alternative phrasings and search with each

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::types::ScoredChunk;

use super::output_parser::QueryListParser;
use super::Retriever;

/// Retriever that searches with several model-generated versions of a question
/// and returns the unique union of the results
pub struct MultiQueryRetriever {
    llm: Arc<dyn LlmProvider>,
    inner: Arc<dyn Retriever>,
    include_original: bool,
}

impl MultiQueryRetriever {
    pub fn new(llm: Arc<dyn LlmProvider>, inner: Arc<dyn Retriever>) -> Self {
        Self {
            llm,
            inner,
            include_original: false,
        }
    }

    /// Also search with the question as asked
    pub fn with_original(mut self, include_original: bool) -> Self {
        self.include_original = include_original;
        self
    }

    /// Alternative queries for `question`
    ///
    /// Falls back to the question itself when the model fails or returns nothing usable.
    pub async fn generate_queries(&self, question: &str) -> Vec<String> {
        let prompt = PromptBuilder::build_query_prompt(question);

        let mut queries = match self.llm.generate(&prompt).await {
            Ok(text) => QueryListParser::parse(&text),
            Err(e) => {
                tracing::warn!("Query generation failed, using the question as is: {}", e);
                Vec::new()
            }
        };

        if self.include_original && !queries.iter().any(|q| q == question) {
            queries.push(question.to_string());
        }
        if queries.is_empty() {
            queries.push(question.to_string());
        }

        tracing::info!("Generated queries: {:?}", queries);
        queries
    }

    /// Run every query and merge the results
    pub async fn retrieve_with_queries(&self, question: &str) -> Result<(Vec<String>, Vec<ScoredChunk>)> {
        let queries = self.generate_queries(question).await;

        let per_query = try_join_all(queries.iter().map(|q| self.inner.retrieve(q))).await?;
        let merged = unique_union(per_query);

        tracing::debug!("{} queries returned {} unique chunks", queries.len(), merged.len());
        Ok((queries, merged))
    }
}

/// First-seen order, keeping the best similarity seen for each chunk
fn unique_union(results: Vec<Vec<ScoredChunk>>) -> Vec<ScoredChunk> {
    let mut merged: Vec<ScoredChunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in results.into_iter().flatten() {
        match positions.get(&result.chunk.id) {
            Some(&i) => {
                if result.similarity > merged[i].similarity {
                    merged[i].similarity = result.similarity;
                }
            }
            None => {
                positions.insert(result.chunk.id.clone(), merged.len());
                merged.push(result);
            }
        }
    }

    merged
}

#[async_trait]
impl Retriever for MultiQueryRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        Ok(self.retrieve_with_queries(query).await?.1)
    }
}
