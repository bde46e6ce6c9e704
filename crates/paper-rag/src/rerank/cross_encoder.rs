//! ONNX cross-encoder reranker
//!
//! Scores each (question, chunk) pair with a MS MARCO cross-encoder such as
//! `cross-encoder/ms-marco-MiniLM-L-6-v2`. The model and tokenizer are fetched
//! from the Hugging Face hub into the cache directory on first use.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use crate::config::RerankerConfig;
use crate::error::{Error, Result};
use crate::providers::Reranker;
use crate::types::ScoredChunk;

struct CrossEncoder {
    session: Session,
    tokenizer: Tokenizer,
}

/// Reranker backed by an ONNX cross-encoder
pub struct CrossEncoderReranker {
    model: Arc<Mutex<CrossEncoder>>,
    name: String,
}

impl CrossEncoderReranker {
    /// Load the configured model, downloading it if needed
    pub async fn new(config: &RerankerConfig) -> Result<Self> {
        tracing::info!("Initializing cross-encoder reranker with model: {}", config.model);

        let model_dir = config.cache_dir.join(config.model.replace('/', "--"));
        std::fs::create_dir_all(&model_dir).map_err(|e| {
            Error::Config(format!("Failed to create cache directory: {}", e))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            download(&config.model, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download(&config.model, "tokenizer.json", &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::Rerank(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::Rerank(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::Rerank(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::Rerank(format!("Failed to load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Rerank(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::Rerank(format!("Failed to configure truncation: {}", e)))?;

        tracing::info!("Cross-encoder reranker initialized");

        Ok(Self {
            model: Arc::new(Mutex::new(CrossEncoder { session, tokenizer })),
            name: config.model.clone(),
        })
    }
}

impl CrossEncoder {
    /// One relevance logit per passage
    fn score(&mut self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let batch_size = passages.len();
        let pairs: Vec<(&str, &str)> = passages.iter().map(|p| (query, p.as_str())).collect();

        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| Error::Rerank(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * max_len;
            for (j, ((id, mask), type_id)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = *id as i64;
                attention_mask[row + j] = *mask as i64;
                token_type_ids[row + j] = *type_id as i64;
            }
        }

        let tensor = |data: Vec<i64>, label: &str| {
            Tensor::from_array((vec![batch_size, max_len], data.into_boxed_slice()))
                .map_err(|e| Error::Rerank(format!("{} tensor creation failed: {}", label, e)))
        };

        let inputs = vec![
            ("input_ids", tensor(input_ids, "Input")?.into_dyn()),
            ("attention_mask", tensor(attention_mask, "Attention mask")?.into_dyn()),
            ("token_type_ids", tensor(token_type_ids, "Token type")?.into_dyn()),
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| Error::Rerank(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::Rerank("No output tensor".to_string()))?;

        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Rerank(format!("Failed to extract tensor: {}", e)))?;

        if logits.len() < batch_size {
            return Err(Error::Rerank(format!(
                "Expected {} scores, model returned {}",
                batch_size,
                logits.len()
            )));
        }

        // Single-label heads give one logit per row
        let stride = logits.len() / batch_size;
        Ok((0..batch_size).map(|i| logits[i * stride]).collect())
    }
}

/// Order results by cross-encoder logits, best first
///
/// Similarities become the sigmoid of the logit. Ties keep retrieval order.
pub fn sort_by_scores(results: Vec<ScoredChunk>, scores: &[f32]) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = results
        .into_iter()
        .zip(scores)
        .map(|(mut result, &logit)| {
            result.similarity = 1.0 / (1.0 + (-logit).exp());
            result
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, results: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>> {
        if results.is_empty() {
            return Ok(results);
        }

        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let passages: Vec<String> = results.iter().map(|r| r.chunk.content.clone()).collect();

        let scores = tokio::task::spawn_blocking(move || model.lock().score(&query, &passages))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        Ok(sort_by_scores(results, &scores))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fetch one file of a hub repository
async fn download(model: &str, file: &str, path: &Path) -> Result<()> {
    let url = format!("https://huggingface.co/{}/resolve/main/{}", model, file);

    tracing::info!("Downloading {} from: {}", file, url);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::Rerank(format!("Failed to download {}: {}", file, e)))?;

    if !response.status().is_success() {
        return Err(Error::Rerank(format!(
            "Download of {} failed: HTTP {}",
            file,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Rerank(format!("Failed to read {} bytes: {}", file, e)))?;

    std::fs::write(path, &bytes)?;

    tracing::info!("Downloaded {} ({} bytes)", file, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk;

    #[test]
    fn test_sort_by_scores() {
        let results = vec![
            ScoredChunk::new(chunk("a.pdf", 1, "alpha"), 0.9),
            ScoredChunk::new(chunk("b.pdf", 1, "beta"), 0.8),
            ScoredChunk::new(chunk("c.pdf", 1, "gamma"), 0.7),
        ];

        let sorted = sort_by_scores(results, &[-2.0, 3.5, 0.0]);
        let files: Vec<_> = sorted.iter().map(|r| r.chunk.source.filename.as_str()).collect();
        assert_eq!(files, vec!["b.pdf", "c.pdf", "a.pdf"]);
        assert!((sorted[1].similarity - 0.5).abs() < 1e-6);
        assert!(sorted.iter().all(|r| r.similarity > 0.0 && r.similarity < 1.0));
    }

    #[test]
    fn test_sort_keeps_order_on_ties() {
        let results = vec![
            ScoredChunk::new(chunk("a.pdf", 1, "alpha"), 0.1),
            ScoredChunk::new(chunk("b.pdf", 1, "beta"), 0.2),
        ];
        let sorted = sort_by_scores(results, &[1.0, 1.0]);
        assert_eq!(sorted[0].chunk.source.filename, "a.pdf");
    }
}
