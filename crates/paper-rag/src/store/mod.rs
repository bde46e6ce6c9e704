//! Persistent vector store
//!
//! SQLite holds the chunks and raw vectors; an HNSW index over them is rebuilt
//! in memory when a collection is opened.

mod database;
mod document_store;
mod index;

pub use database::{CollectionDb, CollectionInfo, StoredEmbedding};
pub use document_store::DocumentStore;
pub use index::{IndexParams, VectorIndex};
