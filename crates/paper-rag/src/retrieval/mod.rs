//! Retrieval: turning a question into relevant chunks

mod multi_query;
mod output_parser;
mod vector;

pub use multi_query::MultiQueryRetriever;
pub use output_parser::{CommaSeparatedListParser, QueryListParser};
pub use vector::VectorStoreRetriever;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ScoredChunk;

/// Something that returns chunks relevant to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve chunks for `query`, most relevant first
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>>;
}
