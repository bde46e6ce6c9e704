//! Configuration for the RAG system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "paper-rag.toml";

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Where the papers live
    pub documents: DocumentsConfig,
    /// Vector database configuration
    pub store: StoreConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Cross-encoder reranking
    pub reranker: RerankerConfig,
    /// Processing configuration
    pub processing: ProcessingConfig,
}

/// Source documents configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Directory scanned for papers (not recursive)
    pub data_dir: PathBuf,
    /// File extensions to ingest
    pub extensions: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            extensions: vec!["pdf".to_string()],
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the SQLite collection database
    pub persist_directory: PathBuf,
    /// Collection name
    pub collection_name: String,
    /// Reuse an existing collection instead of starting empty
    pub load_from_disk: bool,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    pub hnsw_ef_search: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("./rag_db"),
            collection_name: "docs".to_string(),
            load_from_disk: true,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

impl StoreConfig {
    /// Path of the SQLite file inside the persist directory
    pub fn database_path(&self) -> PathBuf {
        self.persist_directory.join("collections.sqlite3")
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Record the character offset of each chunk within its page
    pub add_start_index: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 7500,
            chunk_overlap: 125,
            add_start_index: true,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "llama3.1:8b".to_string(),
            generate_model: "llama2".to_string(),
            temperature: 0.8,
            timeout_secs: 300,
            max_retries: 2,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks fetched per search query
    pub top_k: usize,
    /// Expand each question into alternative queries with the LLM
    pub multi_query: bool,
    /// Also search with the question as typed
    pub include_original: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            multi_query: true,
            include_original: false,
        }
    }
}

/// Cross-encoder reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Only honoured when built with the `rerank` feature
    pub enabled: bool,
    /// HuggingFace model id
    pub model: String,
    /// Maximum tokens per (query, passage) pair
    pub max_length: usize,
    /// Chunks kept after reranking
    pub top_n: usize,
    /// Cache directory for the ONNX model and tokenizer
    pub cache_dir: PathBuf,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            max_length: 512,
            top_n: 4,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("paper-rag")
                .join("models"),
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of concurrent embedding requests (default: CPU count, max 8)
    pub parallel_embeddings: Option<usize>,
    /// Seconds allowed for text extraction of a single PDF
    pub pdf_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_embeddings: None,
            pdf_timeout_secs: 60,
        }
    }
}

impl ProcessingConfig {
    /// Effective embedding concurrency
    pub fn embedding_concurrency(&self) -> usize {
        self.parallel_embeddings
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

impl RagConfig {
    /// Load configuration: defaults, then the TOML file, then environment variables.
    ///
    /// Without an explicit path, `paper-rag.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML config text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.llm.base_url = normalize_base_url(&host);
        }
        if let Some(model) = lookup("PAPER_RAG_LLM_MODEL") {
            self.llm.generate_model = model;
        }
        if let Some(model) = lookup("PAPER_RAG_EMBED_MODEL") {
            self.llm.embed_model = model;
        }
        if let Some(dir) = lookup("PAPER_RAG_DATA_DIR") {
            self.documents.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PAPER_RAG_PERSIST_DIR") {
            self.store.persist_directory = PathBuf::from(dir);
        }
        if let Some(name) = lookup("PAPER_RAG_COLLECTION") {
            self.store.collection_name = name;
        }
        if let Some(k) = lookup("PAPER_RAG_TOP_K") {
            match k.parse() {
                Ok(k) => self.retrieval.top_k = k,
                Err(_) => tracing::warn!("Ignoring invalid PAPER_RAG_TOP_K={}", k),
            }
        }
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.llm.generate_model.trim().is_empty() {
            return Err(Error::config("llm.generate_model must not be empty"));
        }
        if self.llm.embed_model.trim().is_empty() {
            return Err(Error::config("llm.embed_model must not be empty"));
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "llm.base_url must start with http:// or https:// (got '{}')",
                self.llm.base_url
            )));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        if self.store.collection_name.trim().is_empty() {
            return Err(Error::config("store.collection_name must not be empty"));
        }
        Ok(())
    }
}

/// Port Ollama listens on unless told otherwise
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// `OLLAMA_HOST` is often given as `host`, `host:port` or `:port` without a scheme
///
/// Plain http hosts without a port get the Ollama port, https keeps its default.
pub fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let (scheme, rest) = host.split_once("://").unwrap_or(("http", host));
    let (authority, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };

    let authority = match authority {
        "" => "127.0.0.1".to_string(),
        a if a.starts_with(':') => format!("127.0.0.1{}", a),
        a => a.to_string(),
    };

    // The last colon of a bracketed IPv6 address is not a port separator
    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && !port.contains(']'));

    if has_port || scheme == "https" {
        format!("{}://{}{}", scheme, authority, path)
    } else {
        format!("{}://{}:{}{}", scheme, authority, DEFAULT_OLLAMA_PORT, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 7500);
        assert_eq!(config.chunking.chunk_overlap, 125);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.store.collection_name, "docs");
    }

    #[test]
    fn test_partial_toml() {
        let config = RagConfig::from_toml(
            r#"
            [llm]
            generate_model = "mistral"

            [retrieval]
            top_k = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.generate_model, "mistral");
        assert_eq!(config.llm.embed_model, "llama3.1:8b");
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.retrieval.multi_query);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OLLAMA_HOST", "gpu-box:11434"),
            ("PAPER_RAG_LLM_MODEL", "llama3.2"),
            ("PAPER_RAG_TOP_K", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.base_url, "http://gpu-box:11434");
        assert_eq!(config.llm.generate_model, "llama3.2");
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_ollama_host_without_port() {
        let env: HashMap<&str, &str> = [("OLLAMA_HOST", "0.0.0.0")].into_iter().collect();
        let mut config = RagConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.llm.base_url, "http://0.0.0.0:11434");
        assert!(config.validate().is_ok());

        assert_eq!(normalize_base_url("localhost"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://gpu-box/"), "http://gpu-box:11434");
        assert_eq!(normalize_base_url(":8080"), "http://127.0.0.1:8080");
        assert_eq!(normalize_base_url("[::1]"), "http://[::1]:11434");
        assert_eq!(normalize_base_url("[::1]:9000"), "http://[::1]:9000");
        assert_eq!(normalize_base_url("https://ollama.example.com"), "https://ollama.example.com");
        assert_eq!(normalize_base_url("example.com/ollama"), "http://example.com:11434/ollama");
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_scheme() {
        let mut config = RagConfig::default();
        config.llm.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper-rag.toml");
        std::fs::write(&path, "[store]\ncollection_name = \"papers\"\n").unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.store.collection_name, "papers");
        assert!(RagConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
