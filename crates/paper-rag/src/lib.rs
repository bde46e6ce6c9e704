//! paper-rag: question answering over research papers
//!
//! Loads PDFs from a data directory, splits them into overlapping chunks, embeds
//! them through a local Ollama server and keeps them in a persistent vector store.
//! Questions are expanded into several search queries, the matching chunks are
//! stuffed into an answer prompt and a local model writes the answer.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(feature = "rerank")]
pub mod rerank;

#[cfg(feature = "cli")]
pub mod app;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, FileType, Page, SourceRef},
    response::{Answer, ScoredChunk},
};
