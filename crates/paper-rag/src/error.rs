//! Error types for the RAG system

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Nothing to ingest
    #[error("No PDF files found in {}", .0.display())]
    NoDocuments(PathBuf),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Ollama/LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Non-success response from the model server
    #[error("{context}: HTTP {status} - {body}")]
    Api {
        context: String,
        status: u16,
        body: String,
    },

    /// Cross-encoder error
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an API error from a response status
    pub fn api(context: impl Into<String>, status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            context: context.into(),
            status: status.as_u16(),
            body: body.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_documents_message() {
        let err = Error::NoDocuments(PathBuf::from("./data"));
        assert_eq!(err.to_string(), "No PDF files found in ./data");
    }

    #[test]
    fn test_transient_classification() {
        use reqwest::StatusCode;

        assert!(Error::api("Generation failed", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(Error::api("Generation failed", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!Error::api("Embedding failed", StatusCode::NOT_FOUND, "model not found").is_transient());
        assert!(!Error::api("Embedding failed", StatusCode::BAD_REQUEST, "").is_transient());
        assert!(!Error::llm("bad response").is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(!Error::file_parse("a.pdf", "broken").is_transient());
    }
}
