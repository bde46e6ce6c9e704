//! Turns a directory of papers into chunks

use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Page};

use super::parser::{self, PdfLoader};
use super::splitter::RecursiveCharacterSplitter;

/// Handles document loading and splitting
pub struct DocumentProcessor {
    loader: PdfLoader,
    splitter: RecursiveCharacterSplitter,
    extensions: Vec<String>,
}

impl DocumentProcessor {
    /// Create a processor from config
    pub fn new(config: &RagConfig) -> Self {
        Self {
            loader: PdfLoader::new(Duration::from_secs(config.processing.pdf_timeout_secs)),
            splitter: RecursiveCharacterSplitter::from_config(&config.chunking),
            extensions: config
                .documents
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Create a processor with explicit chunking parameters (PDF only)
    pub fn with_chunking(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            loader: PdfLoader::default(),
            splitter: RecursiveCharacterSplitter::new(chunk_size, chunk_overlap),
            extensions: vec!["pdf".to_string()],
        }
    }

    /// Files in `data_dir` (not recursive) with a configured extension, sorted by name
    pub fn discover(&self, data_dir: &Path) -> Result<Vec<PathBuf>> {
        if !data_dir.is_dir() {
            return Err(Error::NoDocuments(data_dir.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
                    .unwrap_or(false)
            })
            .collect();

        if files.is_empty() {
            return Err(Error::NoDocuments(data_dir.to_path_buf()));
        }

        files.sort();
        Ok(files)
    }

    /// Load a PDF into pages
    pub fn load_pdf(&self, path: &Path) -> Result<Vec<Page>> {
        self.loader.load(path)
    }

    /// Split pages into chunks
    pub fn split_documents(&self, pages: &[Page]) -> Vec<Chunk> {
        tracing::info!("Splitting documents into chunks");
        let chunks = self.splitter.split_pages(pages);
        tracing::info!("Document split into {} chunks", chunks.len());
        chunks
    }

    /// Load and split one file
    pub fn process_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        let pages = parser::load_file(&self.loader, path)?;
        Ok(self.split_documents(&pages))
    }
}
