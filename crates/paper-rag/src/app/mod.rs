//! Interactive document QA over a directory of papers

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::QuestionAnswerer;
use crate::ingestion::DocumentProcessor;
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::store::DocumentStore;
use crate::types::Answer;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Files found in the data directory
    pub files: usize,
    /// Files that could not be loaded
    pub failed: Vec<PathBuf>,
    /// Chunks produced by splitting
    pub chunks: usize,
    /// Chunks that were not already stored
    pub added: usize,
    /// Chunks in the collection afterwards
    pub total: usize,
}

/// Loads papers into the store and answers questions about them
pub struct DocumentQa {
    config: RagConfig,
    processor: Arc<DocumentProcessor>,
    store: Arc<DocumentStore>,
    qa: QuestionAnswerer,
    show_sources: bool,
}

impl DocumentQa {
    /// Build the system against the configured Ollama server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config.llm)?.split();
        let qa = Self::with_providers(config, Arc::new(embedder), Arc::new(llm))?;
        Ok(qa.load_reranker().await)
    }

    /// Build the system from explicit providers
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let store = Arc::new(DocumentStore::open(&config, embedder)?);
        let qa = QuestionAnswerer::new(llm, config.retrieval.clone());

        Ok(Self {
            processor: Arc::new(DocumentProcessor::new(&config)),
            store,
            qa,
            show_sources: false,
            config,
        })
    }

    #[cfg(feature = "rerank")]
    async fn load_reranker(mut self) -> Self {
        if self.config.reranker.enabled {
            match crate::rerank::CrossEncoderReranker::new(&self.config.reranker).await {
                Ok(reranker) => {
                    self.qa = self
                        .qa
                        .with_reranker(Arc::new(reranker), self.config.reranker.top_n);
                }
                Err(e) => tracing::warn!("Reranker unavailable, continuing without it: {}", e),
            }
        }
        self
    }

    #[cfg(not(feature = "rerank"))]
    async fn load_reranker(self) -> Self {
        if self.config.reranker.enabled {
            tracing::warn!("Reranking is enabled but this build lacks the `rerank` feature");
        }
        self
    }

    /// Print the sources under each answer
    pub fn show_sources(mut self, show: bool) -> Self {
        self.show_sources = show;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Load, split and embed every paper in the data directory
    ///
    /// Unreadable files are skipped with a warning as long as one file loads.
    pub async fn initialize(&self) -> Result<IngestReport> {
        let data_dir = &self.config.documents.data_dir;
        let files = self.processor.discover(data_dir)?;
        tracing::info!("Found {} files in {}", files.len(), data_dir.display());

        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        progress.set_message("Processing PDFs");

        let mut report = IngestReport {
            files: files.len(),
            ..Default::default()
        };
        let mut chunks = Vec::new();
        let mut first_error = None;

        for path in files {
            let processor = Arc::clone(&self.processor);
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || processor.process_file(&task_path))
                .await
                .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?;

            match result {
                Ok(file_chunks) => {
                    tracing::debug!("{}: {} chunks", path.display(), file_chunks.len());
                    chunks.extend(file_chunks);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    report.failed.push(path);
                    first_error.get_or_insert(e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        if report.failed.len() == report.files {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        report.chunks = chunks.len();
        report.added = self.store.add_documents(chunks, None).await?;
        report.total = self.store.len();

        tracing::info!("Initialized with {} document chunks", report.total);
        Ok(report)
    }

    /// Answer one question against the stored papers
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let retriever = Arc::new(self.store.as_retriever(self.config.retrieval.top_k));
        self.qa.ask_question(question, retriever).await
    }

    /// Drop everything stored in the collection
    pub async fn reset(&self) -> Result<usize> {
        self.store.delete_collection().await
    }

    /// Read questions line by line until `q`, end of input or Ctrl-C
    pub async fn run_cli<R, W>(&self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(output, "\n{}", style("Document QA System").bold())?;
        writeln!(output, "Enter 'q' to quit")?;

        let mut lines = input.lines();

        loop {
            write!(output, "\nEnter your question: ")?;
            output.flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    writeln!(output, "\nExiting...")?;
                    break;
                }
            };

            let Some(line) = line else {
                writeln!(output)?;
                break;
            };

            let question = line.trim();
            if question.eq_ignore_ascii_case("q") {
                writeln!(output, "Exiting...")?;
                break;
            }
            if question.is_empty() {
                continue;
            }

            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Generating answer");
            spinner.enable_steady_tick(Duration::from_millis(120));

            let result = tokio::select! {
                result = self.ask(question) => result,
                _ = tokio::signal::ctrl_c() => {
                    spinner.finish_and_clear();
                    writeln!(output, "\nExiting...")?;
                    break;
                }
            };
            spinner.finish_and_clear();

            match result {
                Ok(answer) => self.write_answer(output, &answer)?,
                Err(e) => {
                    tracing::error!("Error processing question: {}", e);
                    writeln!(output, "An error occurred. Please try again.")?;
                }
            }
        }

        Ok(())
    }

    /// Print an answer, with sources when enabled
    pub fn write_answer<W: Write>(&self, output: &mut W, answer: &Answer) -> Result<()> {
        writeln!(output, "\n{} {}", style("Answer:").bold(), answer.answer)?;

        if self.show_sources && !answer.sources.is_empty() {
            writeln!(output, "\n{}", style("Sources:").dim())?;
            for citation in answer.citations() {
                writeln!(output, "  - {}", citation)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_in, KeywordEmbedder, ScriptedLlm};

    fn write_papers(config: &RagConfig) {
        let dir = &config.documents.data_dir;
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("attention.txt"),
            "Multi-head attention lets the model attend to several positions.",
        )
        .unwrap();
        std::fs::write(dir.join("metrics.txt"), "BLEU scores machine translation output.").unwrap();
    }

    fn text_config(dir: &std::path::Path) -> RagConfig {
        let mut config = config_in(dir);
        config.documents.extensions = vec!["txt".to_string(), "pdf".to_string()];
        config.retrieval.top_k = 1;
        config
    }

    fn system(config: RagConfig, llm: ScriptedLlm) -> DocumentQa {
        DocumentQa::with_providers(config, Arc::new(KeywordEmbedder::new()), Arc::new(llm)).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());
        write_papers(&config);

        let qa = system(config.clone(), ScriptedLlm::new("q", "a"));
        let report = qa.initialize().await.unwrap();
        assert_eq!(report.files, 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.added, 2);
        assert_eq!(report.total, 2);

        let report = qa.initialize().await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.total, 2);
    }

    #[tokio::test]
    async fn test_bad_pdf_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());
        write_papers(&config);
        std::fs::write(config.documents.data_dir.join("broken.pdf"), b"not a pdf").unwrap();

        let report = system(config, ScriptedLlm::new("q", "a")).initialize().await.unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.total, 2);
    }

    #[tokio::test]
    async fn test_initialize_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());

        let err = system(config.clone(), ScriptedLlm::new("q", "a"))
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoDocuments(_)));

        std::fs::create_dir_all(&config.documents.data_dir).unwrap();
        std::fs::write(config.documents.data_dir.join("broken.pdf"), b"not a pdf").unwrap();
        let err = system(config, ScriptedLlm::new("q", "a"))
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));
    }

    #[tokio::test]
    async fn test_run_cli_session() {
        console::set_colors_enabled(false);
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());
        write_papers(&config);

        let qa = system(config, ScriptedLlm::new("What is BLEU?", "BLEU is a metric.")).show_sources(true);
        qa.initialize().await.unwrap();

        let input: &[u8] = b"How is translation scored?\n\n   \nq\nignored\n";
        let mut output = Vec::new();
        qa.run_cli(input, &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Document QA System"));
        assert!(output.contains("Enter 'q' to quit"));
        assert!(output.contains("Answer: BLEU is a metric."));
        assert!(output.contains("  - metrics.txt"));
        assert!(output.trim_end().ends_with("Exiting..."));
        assert_eq!(output.matches("Enter your question: ").count(), 4);
    }

    #[tokio::test]
    async fn test_run_cli_reports_errors_and_stops_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());
        write_papers(&config);

        let qa = system(config, ScriptedLlm::failing());
        qa.initialize().await.unwrap();

        let input: &[u8] = b"What is attention?\n";
        let mut output = Vec::new();
        qa.run_cli(input, &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("An error occurred. Please try again."));
        assert!(!output.contains("Exiting..."));
    }

    #[tokio::test]
    async fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let config = text_config(dir.path());
        write_papers(&config);

        let qa = system(config, ScriptedLlm::new("q", "a"));
        qa.initialize().await.unwrap();
        assert_eq!(qa.reset().await.unwrap(), 2);
        assert!(qa.store().is_empty());
    }
}
