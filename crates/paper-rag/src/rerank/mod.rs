//! Cross-encoder reranking of retrieved chunks

mod cross_encoder;

pub use cross_encoder::{sort_by_scores, CrossEncoderReranker};
