//! Provider abstractions for embeddings, the LLM and reranking
//!
//! The store and retrieval layers only see these traits, so tests and other
//! backends can stand in for the Ollama server.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod reranker;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use reranker::Reranker;
