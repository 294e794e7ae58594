//! # doc-rag CLI (`docrag`)
//!
//! Command-line front end for the document store and retriever.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag init` | Create the SQLite database and run schema migrations |
//! | `docrag add` | Chunk, embed, and store a document |
//! | `docrag update <id>` | Replace a document's content and regenerate its chunks |
//! | `docrag delete <id>` | Delete a document and its chunks |
//! | `docrag get <id>` | Show a document and its chunks |
//! | `docrag list` | List an owner's documents |
//! | `docrag search "<query>"` | Semantic search over an owner's chunks |
//! | `docrag chunk` | Preview how a file would be chunked |
//!
//! ## Examples
//!
//! ```bash
//! docrag init
//! docrag add --owner alice --title "Runbook" --file ./runbook.md
//! docrag search "how do I rotate keys" --owner alice --limit 3
//! docrag chunk --file ./runbook.md --target 400 --overlap 100
//! ```
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use doc_rag::chunk::{chunk_text, ChunkParams};
use doc_rag::config::{self, Config};
use doc_rag::embedding::{create_provider, Embedder};
use doc_rag::ingest::{DocumentPipeline, WritePath};
use doc_rag::search::Retriever;
use doc_rag::store::{ChunkStore, SqliteStore};
use doc_rag::{db, migrate};

/// doc-rag: chunk, embed, and search documents per owner.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "Sentence-aware chunking and semantic retrieval over a local document store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Chunk, embed, and store a new document.
    Add {
        /// Owning user.
        #[arg(long)]
        owner: String,

        #[arg(long)]
        title: String,

        /// File holding the document body.
        #[arg(long)]
        file: PathBuf,
    },

    /// Replace a document's content, regenerating chunks and embeddings.
    Update {
        id: String,

        /// File holding the new document body.
        #[arg(long)]
        file: PathBuf,

        /// New title; the current one is kept if omitted.
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete a document and its chunks.
    Delete { id: String },

    /// Show a document and its chunks.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List an owner's documents, newest first.
    List {
        #[arg(long)]
        owner: String,
    },

    /// Semantic search over an owner's chunks.
    Search {
        query: String,

        #[arg(long)]
        owner: String,

        /// Maximum results. Defaults to `retrieval.default_limit`.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Preview chunking for a file without embedding or storing it.
    Chunk {
        #[arg(long)]
        file: PathBuf,

        /// Override the configured target size.
        #[arg(long)]
        target: Option<usize>,

        /// Override the configured overlap size.
        #[arg(long)]
        overlap: Option<usize>,

        /// Use the update profile instead of the create profile.
        #[arg(long)]
        update: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Add { owner, title, file } => {
            let content = read_body(&file)?;
            let pipeline = open_pipeline(&cfg).await?;
            let doc = pipeline.create_document(&owner, &title, &content).await?;
            println!("{}", doc.id);
        }
        Commands::Update { id, file, title } => {
            let content = read_body(&file)?;
            let pipeline = open_pipeline(&cfg).await?;
            let doc = pipeline
                .update_document(&id, title.as_deref(), &content)
                .await?;
            println!("updated {}", doc.id);
        }
        Commands::Delete { id } => {
            let pipeline = open_pipeline(&cfg).await?;
            pipeline.delete_document(&id).await?;
            println!("deleted {}", id);
        }
        Commands::Get { id, json } => {
            let pipeline = open_pipeline(&cfg).await?;
            let found = pipeline.get_document(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                let doc = &found.document;
                println!("--- Document ---");
                println!("id:         {}", doc.id);
                println!("owner:      {}", doc.owner_id);
                println!("title:      {}", doc.title);
                println!("created_at: {}", format_ts(doc.created_at));
                println!("updated_at: {}", format_ts(doc.updated_at));
                println!();
                println!("--- Chunks ({}) ---", found.chunks.len());
                for chunk in &found.chunks {
                    let embedded = if chunk.embedding.is_some() { "" } else { " (no embedding)" };
                    println!("[chunk {}]{}", chunk.chunk_index, embedded);
                    println!("{}", chunk.content);
                    println!();
                }
            }
        }
        Commands::List { owner } => {
            let pipeline = open_pipeline(&cfg).await?;
            let docs = pipeline.list_documents(&owner).await?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!("{}  {}  {}", doc.id, format_ts(doc.updated_at), doc.title);
            }
        }
        Commands::Search {
            query,
            owner,
            limit,
            json,
        } => {
            let store = open_store(&cfg).await?;
            let retriever = Retriever::new(store, open_embedder(&cfg)?)
                .with_params(cfg.retrieval.params())
                .with_default_limit(cfg.retrieval.default_limit);
            let results = retriever.search_chunks(&owner, &query, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} #{}",
                        i + 1,
                        r.score,
                        r.document_title,
                        r.chunk_index
                    );
                    println!("    excerpt: \"{}\"", r.content.replace('\n', " ").trim());
                    println!("    document: {}", r.document_id);
                    println!();
                }
            }
        }
        Commands::Chunk {
            file,
            target,
            overlap,
            update,
        } => {
            let content = read_body(&file)?;
            let path = if update {
                WritePath::Update
            } else {
                WritePath::Create
            };
            let base = cfg.chunking.params_for(path);
            let params = ChunkParams {
                target_size: target.unwrap_or(base.target_size),
                overlap_size: overlap.unwrap_or(base.overlap_size),
                ..base
            };
            let chunks = chunk_text(&content, &params)?;
            println!(
                "{} chunks ({} profile, target {}, overlap {})",
                chunks.len(),
                path.as_str(),
                params.target_size,
                params.overlap_size
            );
            for (i, chunk) in chunks.iter().enumerate() {
                println!("[chunk {}] {} chars", i, chunk.chars().count());
                println!("{}", chunk);
                println!();
            }
        }
    }

    Ok(())
}

fn read_body(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document file: {}", path.display()))
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

async fn open_store(cfg: &Config) -> Result<Arc<dyn ChunkStore>> {
    let pool = db::connect(cfg).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn open_embedder(cfg: &Config) -> Result<Embedder> {
    let provider = create_provider(&cfg.embedding)?;
    Ok(Embedder::from_config(provider, &cfg.embedding))
}

async fn open_pipeline(cfg: &Config) -> Result<DocumentPipeline> {
    let store = open_store(cfg).await?;
    Ok(DocumentPipeline::new(
        store,
        open_embedder(cfg)?,
        cfg.chunking.clone(),
    ))
}
