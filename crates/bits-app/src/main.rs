//! bits application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Build the embedding service and vector backend
//! 3. Build the language models, tool registry, and chat session
//! 4. Run the requested command: HTTP API, terminal chat, or ingestion

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use bits_api::routes;
use bits_api::state::AppState;
use bits_chat::{ChatSettings, ModelSet, ResponseOrchestrator, SessionHandle};
use bits_core::config::BitsConfig;
use bits_core::error::{BitsError, Result};
use bits_core::types::{DocType, Mode};
use bits_llm::{OllamaClient, OllamaConfig};
use bits_tools::ToolRegistry;
use bits_vector::{
    DynEmbeddingService, HashEmbedding, IngestOptions, IngestPipeline, MemoryIndex,
    OllamaEmbedding, QdrantBackend, QdrantConfig, TextSplitter, VectorBackend,
};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(data_dir)
    }
}

// =============================================================================
// Builders
// =============================================================================

fn build_embedder(config: &BitsConfig) -> Result<Arc<dyn DynEmbeddingService>> {
    let retrieval = &config.retrieval;
    match retrieval.embedding.as_str() {
        "hash" => Ok(Arc::new(HashEmbedding::new(retrieval.embedding_dim))),
        "ollama" => Ok(Arc::new(OllamaEmbedding::new(
            &config.llm.endpoint,
            retrieval.embedding_model.clone(),
            retrieval.embedding_dim,
            Duration::from_secs(retrieval.timeout_secs),
        )?)),
        other => Err(BitsError::Config(format!("unknown embedding service: {}", other))),
    }
}

fn build_backend(config: &BitsConfig, data_dir: &Path) -> Result<Arc<dyn VectorBackend>> {
    let embedder = build_embedder(config)?;
    let retrieval = &config.retrieval;
    match retrieval.backend.as_str() {
        "memory" => {
            let path = data_dir.join(format!("{}.json", retrieval.collection));
            let index = MemoryIndex::open(embedder, &path)?;
            tracing::info!(path = %path.display(), "In-memory index opened");
            Ok(Arc::new(index))
        }
        "qdrant" => {
            let backend = QdrantBackend::new(
                QdrantConfig {
                    url: retrieval.qdrant_url.clone(),
                    api_key: retrieval.qdrant_api_key.clone(),
                    collection: retrieval.collection.clone(),
                    timeout: Duration::from_secs(retrieval.timeout_secs),
                },
                embedder,
            )?;
            tracing::info!(url = %retrieval.qdrant_url, collection = %retrieval.collection, "Qdrant backend configured");
            Ok(Arc::new(backend))
        }
        other => Err(BitsError::Config(format!("unknown vector backend: {}", other))),
    }
}

fn build_models(config: &BitsConfig) -> Result<ModelSet> {
    let llm = &config.llm;
    let client = |model: &str| -> Result<Arc<OllamaClient>> {
        let model = if model.trim().is_empty() {
            llm.model.as_str()
        } else {
            model
        };
        Ok(Arc::new(OllamaClient::new(OllamaConfig {
            endpoint: llm.endpoint.clone(),
            model: model.to_string(),
            temperature: llm.temperature,
            timeout: Duration::from_secs(llm.timeout_secs),
        })?))
    };

    Ok(ModelSet {
        chat: client(&llm.model)?,
        summarizer: client(&llm.summarizer_model)?,
        tool: client(&llm.tool_model)?,
    })
}

fn build_session(config: &BitsConfig, backend: Arc<dyn VectorBackend>) -> Result<SessionHandle> {
    let mut registry = ToolRegistry::new();
    registry.register_defaults(&config.tools.storage_dir);
    tracing::info!(tools = ?registry.names(), "Tool registry ready");

    let orchestrator = ResponseOrchestrator::new(
        build_models(config)?,
        backend,
        registry,
        ChatSettings::from_config(config),
    );
    Ok(SessionHandle::spawn(orchestrator, config.chat.queue_depth))
}

fn build_ingest(config: &BitsConfig, backend: Arc<dyn VectorBackend>) -> IngestPipeline {
    let splitter = TextSplitter::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap);
    IngestPipeline::new(backend, splitter)
}

// =============================================================================
// Commands
// =============================================================================

async fn run_chat(session: SessionHandle, start_mode: Option<Mode>) -> Result<()> {
    if let Some(mode) = start_mode {
        session.toggle_mode(mode).await?;
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"Commands: /normal /tools /rag /clear /memory /quit\n")
        .await?;

    loop {
        let mode = session.mode().await?;
        stdout.write_all(format!("[{}] > ", mode).as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_memory().await?;
                "Memory cleared.".to_string()
            }
            "/memory" => {
                let snapshot = session.snapshot().await?;
                let summary = if snapshot.summary.is_empty() {
                    "(none)"
                } else {
                    &snapshot.summary
                };
                let turns: Vec<String> = snapshot.turns.iter().map(|t| t.transcript_line()).collect();
                format!("Summary: {}\n{}", summary, turns.join("\n"))
            }
            command if command.starts_with('/') => match command[1..].parse::<Mode>() {
                Ok(requested) => {
                    let mode = session.toggle_mode(requested).await?;
                    format!("Mode: {}", mode)
                }
                Err(e) => format!("Error: {}", e),
            },
            message => match session.respond(message).await {
                Ok(outcome) => outcome.reply,
                Err(e) => format!("Error: {}", e),
            },
        };
        stdout.write_all(format!("{}\n", output).as_bytes()).await?;
    }

    Ok(())
}

async fn run_ingest(
    pipeline: &IngestPipeline,
    paths: &[PathBuf],
    doc_type: DocType,
    subtype: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let mut stored = 0;
    for path in paths {
        let options = IngestOptions {
            source: String::new(),
            title: title.clone(),
            doc_type,
            subtype: subtype.clone(),
        };
        match pipeline.ingest_file(path, &options).await {
            Ok(report) => {
                stored += report.chunks_stored;
                tracing::info!(
                    path = %path.display(),
                    stored = report.chunks_stored,
                    skipped = report.chunks_skipped,
                    "File ingested"
                );
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Ingest failed");
                return Err(e);
            }
        }
    }
    let total = pipeline.backend().count().await?;
    tracing::info!(files = paths.len(), stored, total, "Ingestion complete");
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = BitsConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting bits v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let backend = build_backend(&config, &data_dir)?;

    match args.command {
        Command::Serve { .. } => {
            config.api.port = args.resolve_port(config.api.port);
            let session = build_session(&config, backend.clone())?;
            let ingest = build_ingest(&config, backend);
            let state = AppState::new(config.clone(), session, ingest);
            routes::start_server(&config, state).await?;
        }
        Command::Chat { ref mode } => {
            let start_mode = mode.as_deref().map(str::parse::<Mode>).transpose()?;
            let session = build_session(&config, backend)?;
            run_chat(session, start_mode).await?;
        }
        Command::Ingest {
            ref paths,
            ref doc_type,
            ref subtype,
            ref title,
        } => {
            let pipeline = build_ingest(&config, backend);
            run_ingest(
                &pipeline,
                paths,
                DocType::from_label(doc_type),
                subtype.clone(),
                title.clone(),
            )
            .await?;
        }
    }

    Ok(())
}
