//! Persistent collection of embedded chunks with similarity search

use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::VectorStoreRetriever;
use crate::types::{Chunk, ScoredChunk};

use super::database::{CollectionDb, StoredEmbedding};
use super::index::{IndexParams, VectorIndex};

#[derive(Default)]
struct Entries {
    chunks: Vec<Chunk>,
    ids: HashSet<String>,
    dimensions: Option<usize>,
}

/// Vector store for one named collection
///
/// Chunks and vectors are written to SQLite and mirrored in an HNSW index.
/// Chunk ids are unique within the collection: adding a chunk whose id is
/// already stored is a no-op.
pub struct DocumentStore {
    db: CollectionDb,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    entries: RwLock<Entries>,
    write_lock: tokio::sync::Mutex<()>,
    concurrency: usize,
}

impl DocumentStore {
    /// Open the configured collection, loading what is on disk
    ///
    /// With `store.load_from_disk = false` the collection is emptied first.
    pub fn open(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        std::fs::create_dir_all(&config.store.persist_directory)?;
        let db = CollectionDb::new(config.store.database_path())?;
        Self::with_db(db, config, embedder)
    }

    fn with_db(
        db: CollectionDb,
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let collection = config.store.collection_name.clone();

        if !config.store.load_from_disk {
            let removed = db.delete_collection(&collection)?;
            if removed > 0 {
                tracing::info!("Cleared {} chunks from collection '{}'", removed, collection);
            }
        }
        db.ensure_collection(&collection)?;

        let stored = db.load_collection(&collection)?;
        let mut entries = Entries {
            dimensions: db.dimensions(&collection)?,
            ..Default::default()
        };
        let mut vectors = Vec::with_capacity(stored.len());
        for item in stored {
            // Skipped rows are still on disk, so their ids stay taken
            entries.ids.insert(item.chunk.id.clone());
            if entries.dimensions.is_some_and(|d| d != item.embedding.len()) {
                tracing::warn!("Skipping chunk {} with mismatched embedding size", item.chunk.id);
                continue;
            }
            entries.chunks.push(item.chunk);
            vectors.push(item.embedding);
        }

        if !entries.chunks.is_empty() {
            tracing::info!(
                "Loaded {} chunks from collection '{}'",
                entries.chunks.len(),
                collection
            );
        }

        Ok(Self {
            db,
            collection,
            embedder,
            index: VectorIndex::from_vectors(IndexParams::from(&config.store), vectors),
            entries: RwLock::new(entries),
            write_lock: tokio::sync::Mutex::new(()),
            concurrency: config.processing.embedding_concurrency(),
        })
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embedding dimension, once known
    pub fn dimensions(&self) -> Option<usize> {
        self.entries.read().dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed and store chunks, returning how many were new
    ///
    /// When `ids` is given it replaces the chunks' own ids and must have the same length.
    pub async fn add_documents(&self, chunks: Vec<Chunk>, ids: Option<Vec<String>>) -> Result<usize> {
        let mut chunks = chunks;
        if let Some(ids) = ids {
            if ids.len() != chunks.len() {
                return Err(Error::vector_db(format!(
                    "Got {} ids for {} documents",
                    ids.len(),
                    chunks.len()
                )));
            }
            for (chunk, id) in chunks.iter_mut().zip(ids) {
                chunk.id = id;
            }
        }

        let _guard = self.write_lock.lock().await;

        let new_chunks: Vec<Chunk> = {
            let entries = self.entries.read();
            let mut seen = HashSet::new();
            chunks
                .into_iter()
                .filter(|c| !entries.ids.contains(&c.id) && seen.insert(c.id.clone()))
                .collect()
        };

        if new_chunks.is_empty() {
            tracing::debug!("No new chunks for collection '{}'", self.collection);
            return Ok(0);
        }

        tracing::info!(
            "Embedding {} chunks with {} ({})",
            new_chunks.len(),
            self.embedder.name(),
            self.embedder.model()
        );

        let embedder = &self.embedder;
        let embeddings: Vec<Vec<f32>> = stream::iter(new_chunks.iter())
            .map(|chunk| async move { embedder.embed(&chunk.content).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let dims = self
            .dimensions()
            .unwrap_or_else(|| embeddings[0].len());
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
            return Err(Error::vector_db(format!(
                "Embedding dimension mismatch: collection uses {}, model returned {}",
                dims,
                bad.len()
            )));
        }

        let items: Vec<StoredEmbedding> = new_chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredEmbedding { chunk, embedding })
            .collect();

        self.db.insert_embeddings(&self.collection, &items)?;

        let (chunks, vectors): (Vec<Chunk>, Vec<Vec<f32>>) =
            items.into_iter().map(|i| (i.chunk, i.embedding)).unzip();
        let added = chunks.len();

        self.index.extend(vectors)?;
        let mut entries = self.entries.write();
        entries.dimensions = Some(dims);
        for chunk in chunks {
            entries.ids.insert(chunk.id.clone());
            entries.chunks.push(chunk);
        }

        tracing::info!(
            "Collection '{}' now holds {} chunks",
            self.collection,
            entries.chunks.len()
        );
        Ok(added)
    }

    /// The `k` chunks most similar to `query`
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        self.similarity_search_by_vector(&embedding, k)
    }

    /// The `k` chunks most similar to an embedding
    pub fn similarity_search_by_vector(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if let Some(dims) = self.dimensions() {
            if dims != embedding.len() {
                return Err(Error::vector_db(format!(
                    "Query embedding has {} dimensions, collection uses {}",
                    embedding.len(),
                    dims
                )));
            }
        }

        let hits = self.index.search(embedding, k);
        let entries = self.entries.read();
        Ok(hits
            .into_iter()
            .filter_map(|(position, similarity)| {
                entries
                    .chunks
                    .get(position)
                    .map(|chunk| ScoredChunk::new(chunk.clone(), similarity))
            })
            .collect())
    }

    /// Remove every chunk of the collection, on disk and in memory
    pub async fn delete_collection(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let removed = self.db.delete_collection(&self.collection)?;
        self.db.ensure_collection(&self.collection)?;
        self.index.clear();
        *self.entries.write() = Entries::default();
        tracing::info!("Deleted collection '{}' ({} chunks)", self.collection, removed);
        Ok(removed)
    }

    /// Retriever returning the top `k` chunks for a query
    pub fn as_retriever(self: &Arc<Self>, k: usize) -> VectorStoreRetriever {
        VectorStoreRetriever::new(Arc::clone(self), k)
    }
}
