//! paper-rag command line
//!
//! Run with: cargo run -p paper-rag -- chat

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use paper_rag::app::DocumentQa;
use paper_rag::config::{normalize_base_url, RagConfig};
use paper_rag::generation::OllamaClient;
use paper_rag::store::CollectionDb;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "paper-rag", version, about = "Ask questions about a folder of research papers")]
struct Cli {
    /// TOML config file (default: ./paper-rag.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the PDFs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for the vector database
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Collection name in the vector database
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Model used for query expansion and answers
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model used for embeddings
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Ollama server URL
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Chunks retrieved per query
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Start from an empty collection instead of loading the stored one
    #[arg(long, global = true)]
    fresh: bool,

    /// Print the sources used for each answer
    #[arg(long, global = true)]
    show_sources: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the papers, then answer questions interactively (default)
    Chat,
    /// Ingest the papers and exit
    Ingest,
    /// Answer a single question
    Ask {
        /// The question
        question: String,
        /// Ingest the papers first
        #[arg(long)]
        ingest: bool,
    },
    /// Show the stored collections and whether Ollama is reachable
    Status,
    /// Delete the collection
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "paper_rag=warn",
        (false, 0) => "paper_rag=info",
        (false, 1) => "paper_rag=debug",
        (false, _) => "paper_rag=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Defaults, config file and environment, then command line flags
fn load_config(cli: &Cli) -> anyhow::Result<RagConfig> {
    let mut config = RagConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(dir) = &cli.data_dir {
        config.documents.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.persist_dir {
        config.store.persist_directory = dir.clone();
    }
    if let Some(name) = &cli.collection {
        config.store.collection_name = name.clone();
    }
    if let Some(model) = &cli.model {
        config.llm.generate_model = model.clone();
    }
    if let Some(model) = &cli.embed_model {
        config.llm.embed_model = model.clone();
    }
    if let Some(url) = &cli.ollama_url {
        config.llm.base_url = normalize_base_url(url);
    }
    if let Some(k) = cli.top_k {
        config.retrieval.top_k = k;
    }
    if cli.fresh {
        config.store.load_from_disk = false;
    }

    config.validate().context("Invalid configuration")?;

    tracing::debug!("Configuration loaded");
    tracing::debug!("  - Data directory: {}", config.documents.data_dir.display());
    tracing::debug!("  - Vector database: {}", config.store.database_path().display());
    tracing::debug!("  - Embedding model: {}", config.llm.embed_model);
    tracing::debug!("  - LLM model: {}", config.llm.generate_model);
    tracing::debug!("  - Chunk size: {}", config.chunking.chunk_size);

    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let qa = open(config, cli.show_sources).await?;
            qa.initialize().await.context("Failed to initialize")?;

            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            qa.run_cli(stdin, &mut stdout).await?;
        }
        Command::Ingest => {
            let qa = open(config, false).await?;
            let report = qa.initialize().await.context("Failed to ingest papers")?;

            println!(
                "Processed {} files ({} failed): {} chunks, {} new, {} in collection '{}'",
                report.files,
                report.failed.len(),
                report.chunks,
                report.added,
                report.total,
                qa.store().collection()
            );
            for path in &report.failed {
                println!("  skipped {}", path.display());
            }
        }
        Command::Ask { question, ingest } => {
            let qa = open(config, cli.show_sources).await?;
            if ingest {
                qa.initialize().await.context("Failed to ingest papers")?;
            } else if qa.store().is_empty() {
                tracing::warn!(
                    "Collection '{}' is empty, run `paper-rag ingest` first",
                    qa.store().collection()
                );
            }

            let answer = qa.ask(&question).await.context("Failed to answer question")?;
            qa.write_answer(&mut std::io::stdout(), &answer)?;
        }
        Command::Status => status(&config).await?,
        Command::Reset => {
            let db = open_db(&config)?;
            let removed = db.delete_collection(&config.store.collection_name)?;
            println!(
                "Deleted {} chunks from collection '{}'",
                removed, config.store.collection_name
            );
        }
    }

    Ok(())
}

async fn open(config: RagConfig, show_sources: bool) -> anyhow::Result<DocumentQa> {
    let client = OllamaClient::new(&config.llm)?;
    if !client.health_check().await? {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("Please start Ollama and pull the models:");
        tracing::warn!("  ollama serve");
        tracing::warn!(
            "  ollama pull {} && ollama pull {}",
            config.llm.embed_model,
            config.llm.generate_model
        );
    }

    let qa = DocumentQa::new(config)
        .await
        .context("Failed to open the vector database")?;
    Ok(qa.show_sources(show_sources))
}

fn open_db(config: &RagConfig) -> anyhow::Result<CollectionDb> {
    std::fs::create_dir_all(&config.store.persist_directory).with_context(|| {
        format!("Failed to create {}", config.store.persist_directory.display())
    })?;
    Ok(CollectionDb::new(config.store.database_path())?)
}

async fn status(config: &RagConfig) -> anyhow::Result<()> {
    println!("{}", style("Vector database").bold());
    println!("  path: {}", config.store.database_path().display());

    let collections = if config.store.database_path().exists() {
        open_db(config)?.list_collections()?
    } else {
        Vec::new()
    };

    if collections.is_empty() {
        println!("  no collections");
    }
    for collection in &collections {
        let marker = if collection.name == config.store.collection_name { "*" } else { " " };
        println!(
            "{} {}: {} chunks, {} dimensions, created {}",
            marker,
            collection.name,
            collection.count,
            collection
                .dimensions
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            collection.created_at
        );
    }

    println!("\n{}", style("Ollama").bold());
    println!("  url: {}", config.llm.base_url);

    let client = OllamaClient::new(&config.llm)?;
    if client.health_check().await? {
        let models = client.list_models().await?;
        println!("  status: {}", style("reachable").green());
        for model in [&config.llm.embed_model, &config.llm.generate_model] {
            let pulled = models.iter().any(|m| m == model || m.trim_end_matches(":latest") == model);
            println!(
                "  {}: {}",
                model,
                if pulled { style("pulled").green() } else { style("missing").yellow() }
            );
        }
    } else {
        println!("  status: {}", style("unreachable").red());
    }

    Ok(())
}
