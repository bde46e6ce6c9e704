//! In-process fakes for the provider traits

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::store::DocumentStore;
use crate::types::{Chunk, SourceRef};

pub const KEYWORDS: [&str; 4] = ["attention", "convolution", "recurrent", "bleu"];

/// Embeds text as counts of a few marker words
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|w| text.matches(w).count() as f32 + 0.01)
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "test"
    }
}

/// LLM that answers query-expansion prompts with `queries` and anything else with `answer`
pub struct ScriptedLlm {
    pub queries: Option<String>,
    pub answer: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(queries: &str, answer: &str) -> Self {
        Self {
            queries: Some(queries.to_string()),
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fails every request
    pub fn failing() -> Self {
        Self {
            queries: None,
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        let reply = if prompt.contains("Original question:") {
            &self.queries
        } else {
            &self.answer
        };
        reply.clone().ok_or_else(|| Error::llm("model unavailable"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.answer.is_some())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test"
    }
}

pub fn chunk(filename: &str, page: u32, content: &str) -> Chunk {
    Chunk::new(content.to_string(), SourceRef::pdf(filename, page, 10), 0)
}

/// Config with its store under `dir`
pub fn config_in(dir: &std::path::Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.documents.data_dir = dir.join("data");
    config.store.persist_directory = dir.join("db");
    config.store.collection_name = "papers".to_string();
    config
}

/// Store under `dir` holding one chunk per keyword
pub async fn seeded_store(dir: &std::path::Path) -> Arc<DocumentStore> {
    let store = DocumentStore::open(&config_in(dir), Arc::new(KeywordEmbedder::new()))
        .expect("open store");
    store
        .add_documents(
            vec![
                chunk("transformer.pdf", 3, "Multi-head attention attends to all positions."),
                chunk("cnn.pdf", 1, "A convolution kernel slides over the input."),
                chunk("rnn.pdf", 2, "A recurrent cell carries hidden state."),
                chunk("mt.pdf", 7, "BLEU compares n-grams against references."),
            ],
            None,
        )
        .await
        .expect("seed store");
    Arc::new(store)
}
