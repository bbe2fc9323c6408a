//! # docquery CLI (`docq`)
//!
//! ## Usage
//!
//! ```bash
//! docq --config ./config/docq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docq serve` | Start the document Q&A HTTP server |
//! | `docq ask <file> "<question>"` | Answer one question against a local file |
//! | `docq extract <file>` | Print the text extracted from a file |
//!
//! ## Examples
//!
//! ```bash
//! # Serve on a different port
//! docq serve --bind 127.0.0.1:9000
//!
//! # One-off question, JSON on stdout
//! docq ask ./paper.pdf "What dataset was used?"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docquery::analyzer::EnglishAnalyzer;
use docquery::config;
use docquery::embedding::create_embedder;
use docquery::extract::{DocumentExtractor, TextExtractor};
use docquery::logging::init_tracing;
use docquery::retrieval::RetrievalEngine;
use docquery::server;

/// docquery: ask questions against a document, get the best-matching sentence.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Built-in defaults are used when the file does not exist.
#[derive(Parser)]
#[command(
    name = "docq",
    about = "Document Q&A: upload a document, ask a question, get the most relevant sentence",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves the client page at `GET /`, uploads at `POST /upload`, and
    /// questions at `POST /`.
    Serve {
        /// Override `[server].bind` (e.g. `127.0.0.1:9000`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Answer one question against a local document.
    ///
    /// Prints `{"answer": ..., "similarity": ...}` as JSON.
    Ask {
        /// PDF, DOCX, or text file.
        file: PathBuf,
        question: String,
    },

    /// Print the plain text extracted from a document.
    Extract {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config_or_default(&cli.config)?;
    init_tracing(&cfg.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Ask { file, question } => {
            let text = extract_file(&file)?;
            let embedder = create_embedder(&cfg.embedding)?;
            let engine = RetrievalEngine::new(Arc::new(EnglishAnalyzer), embedder, &cfg.retrieval);
            let result = engine.answer(&text, &question).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Extract { file } => {
            print!("{}", extract_file(&file)?);
        }
    }

    Ok(())
}

fn extract_file(path: &std::path::Path) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(DocumentExtractor.extract(&filename, &bytes)?)
}
