//! Reranker trait for reordering retrieved chunks

use async_trait::async_trait;
use crate::error::Result;
use crate::types::ScoredChunk;

/// Scores (query, chunk) pairs jointly and reorders retrieval results
///
/// Implementations:
/// - `CrossEncoderReranker`: ONNX cross-encoder (feature `rerank`)
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `results` by relevance to `query`, best first
    async fn rerank(&self, query: &str, results: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>>;

    /// Get reranker name for logging
    fn name(&self) -> &str;
}
