//! In-memory HNSW index over the stored embeddings
//!
//! Positions handed to the index are row positions in the owning store, so a
//! search result maps straight back to a chunk.

use hnsw_rs::prelude::*;
use parking_lot::RwLock;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

const MIN_CAPACITY: usize = 1024;
const MAX_LAYER: usize = 16;

/// HNSW construction and search parameters
#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl From<&StoreConfig> for IndexParams {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_connections: config.hnsw_m,
            ef_construction: config.hnsw_ef_construction,
            ef_search: config.hnsw_ef_search,
        }
    }
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

struct Inner {
    hnsw: Hnsw<'static, f32, DistCosine>,
    // Kept so the graph can be rebuilt at a larger capacity
    vectors: Vec<Vec<f32>>,
    capacity: usize,
}

/// Cosine-distance HNSW index
pub struct VectorIndex {
    params: IndexParams,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    pub fn new(params: IndexParams) -> Self {
        Self {
            params,
            inner: RwLock::new(Self::build(params, Vec::new())),
        }
    }

    /// Build an index over `vectors`, positions are their indices
    pub fn from_vectors(params: IndexParams, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            params,
            inner: RwLock::new(Self::build(params, vectors)),
        }
    }

    fn build(params: IndexParams, vectors: Vec<Vec<f32>>) -> Inner {
        let capacity = (vectors.len() * 2).max(MIN_CAPACITY);
        let hnsw = Hnsw::new(
            params.max_connections,
            capacity,
            MAX_LAYER,
            params.ef_construction,
            DistCosine,
        );

        for (position, vector) in vectors.iter().enumerate() {
            hnsw.insert_slice((&vector[..], position));
        }

        Inner {
            hnsw,
            vectors,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors, returning the position of the first one
    pub fn extend(&self, vectors: Vec<Vec<f32>>) -> Result<usize> {
        let mut inner = self.inner.write();
        let start = inner.vectors.len();

        if let Some(dims) = inner.vectors.first().map(|v| v.len()) {
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(Error::vector_db(format!(
                    "Embedding dimension mismatch: index has {}, got {}",
                    dims,
                    bad.len()
                )));
            }
        }

        if start + vectors.len() > inner.capacity {
            let mut all = std::mem::take(&mut inner.vectors);
            all.extend(vectors);
            tracing::debug!("Rebuilding vector index for {} vectors", all.len());
            *inner = Self::build(self.params, all);
        } else {
            for (offset, vector) in vectors.into_iter().enumerate() {
                inner.hnsw.insert_slice((&vector[..], start + offset));
                inner.vectors.push(vector);
            }
        }

        Ok(start)
    }

    /// Up to `k` nearest positions with cosine similarity, best first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let inner = self.inner.read();

        if k == 0 || inner.vectors.is_empty() || query.iter().all(|v| *v == 0.0) {
            return Vec::new();
        }

        let ef = self.params.ef_search.max(k);
        let mut hits: Vec<(usize, f32)> = inner
            .hnsw
            .search(query, k, ef)
            .into_iter()
            .filter(|n| n.d_id < inner.vectors.len())
            .map(|n| (n.d_id, 1.0 - n.distance))
            .filter(|(_, similarity)| similarity.is_finite())
            .collect();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    pub fn clear(&self) {
        *self.inner.write() = Self::build(self.params, Vec::new());
    }
}
