//! Core types for documents, chunks, and answers

pub mod document;
pub mod response;

pub use document::{Chunk, FileType, Page, SourceRef};
pub use response::{Answer, ScoredChunk};
