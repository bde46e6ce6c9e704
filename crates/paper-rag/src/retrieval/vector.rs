//! Top-k retrieval straight from the document store

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::store::DocumentStore;
use crate::types::ScoredChunk;

use super::Retriever;

/// Plain top-k similarity search against a store
#[derive(Clone)]
pub struct VectorStoreRetriever {
    store: Arc<DocumentStore>,
    k: usize,
}

impl VectorStoreRetriever {
    pub fn new(store: Arc<DocumentStore>, k: usize) -> Self {
        Self { store, k }
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let results = self.store.similarity_search(query, self.k).await?;
        tracing::debug!("Query {:?} matched {} chunks", query, results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seeded_store;

    #[tokio::test]
    async fn test_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let results = store.as_retriever(2).retrieve("how does convolution work").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.source.filename, "cnn.pdf");

        let results = store.as_retriever(10).retrieve("attention").await.unwrap();
        assert_eq!(results.len(), 4);
    }
}
