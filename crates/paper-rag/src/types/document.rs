//! Page and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path
    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Where a piece of text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// File name of the paper (no directory)
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Page number (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Total pages in document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Character offset of the chunk within its page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

impl SourceRef {
    /// Create source info for a PDF page
    pub fn pdf(filename: impl Into<String>, page: u32, total_pages: u32) -> Self {
        Self {
            filename: filename.into(),
            file_type: FileType::Pdf,
            page_number: Some(page),
            page_count: Some(total_pages),
            start_index: None,
        }
    }

    /// Create source info for a whole text file
    pub fn text(filename: impl Into<String>, file_type: FileType) -> Self {
        Self {
            filename: filename.into(),
            file_type,
            page_number: None,
            page_count: None,
            start_index: None,
        }
    }

    /// Format source for display
    pub fn format_citation(&self) -> String {
        let mut parts = vec![self.filename.clone()];

        if let Some(page) = self.page_number {
            parts.push(format!("Page {}", page));
        }

        parts.join(", ")
    }
}

/// One loaded page of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Text content of the page
    pub content: String,
    /// Source information
    pub source: SourceRef,
}

impl Page {
    pub fn new(content: impl Into<String>, source: SourceRef) -> Self {
        Self {
            content: content.into(),
            source,
        }
    }
}

/// A chunk of text ready to be embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content-derived ID, stable across re-ingestion
    pub id: String,
    /// Text content
    pub content: String,
    /// Source information for citations
    pub source: SourceRef,
    /// Chunk index within its page
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk with a content-derived id
    pub fn new(content: String, source: SourceRef, chunk_index: u32) -> Self {
        let id = Self::derive_id(&content, &source);
        Self {
            id,
            content,
            source,
            chunk_index,
        }
    }

    /// SHA-256 over filename, page, offset and content
    pub fn derive_id(content: &str, source: &SourceRef) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.filename.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.page_number.unwrap_or(0).to_le_bytes());
        hasher.update((source.start_index.unwrap_or(0) as u64).to_le_bytes());
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}
