//! docquery CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use docquery::{
    commands::{
        cmd_ask, cmd_ingest_file, cmd_ingest_text, cmd_ingest_url, cmd_init, cmd_remove,
        cmd_status, print_ask_report, print_ingest_report, print_remove_report, print_status,
        AskOptions, IngestOptions,
    },
    config::Config,
    error::Result,
    meta::MetaDb,
    providers::ProviderRegistry,
    store::QdrantStore,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docquery")]
#[command(version, about = "Ask questions about your documents: OCR, embed, retrieve, answer", long_about = None)]
struct Cli {
    /// Base directory for config and database (defaults to ~/.docquery)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docquery configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest a document into the index
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Ask a question about ingested documents
    Ask {
        /// The question
        question: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Restrict to one document by filename
        #[arg(long)]
        filename: Option<String>,

        /// Restrict to one document by ID
        #[arg(long)]
        document: Option<String>,

        /// Preferred generation provider
        #[arg(long)]
        generator: Option<String>,
    },

    /// Show ingested documents and system status
    Status,

    /// Remove a document and all its data
    Remove {
        /// Document ID to remove (see 'docquery status')
        document_id: String,
    },

    /// Manage the Qdrant vector database
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IngestSource {
    /// Ingest a local file (PDF, image or text)
    File {
        /// Path to the file
        path: PathBuf,

        /// Preferred extraction provider
        #[arg(long)]
        extractor: Option<String>,

        /// Preferred embedding provider
        #[arg(long)]
        embedder: Option<String>,

        /// Extract and chunk only; skip embedding and vector storage
        #[arg(long)]
        skip_embeddings: bool,
    },

    /// Ingest a web page
    Url {
        /// URL to ingest
        url: String,

        /// Preferred embedding provider
        #[arg(long)]
        embedder: Option<String>,
    },

    /// Ingest raw text
    Text {
        /// The text to ingest
        text: String,

        /// Name to record for this text
        #[arg(short, long)]
        name: Option<String>,

        /// Preferred embedding provider
        #[arg(long)]
        embedder: Option<String>,
    },
}

/// Database management actions
#[derive(Subcommand)]
enum DbAction {
    /// Initialize/create the Qdrant collection
    Init,

    /// Show Qdrant collection status
    Status,

    /// Reset the collection (delete all vectors and recreate)
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        if let Some(history) = e.attempt_history() {
            error!("provider attempts: {}", history);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init doesn't need an existing config
    if let Commands::Init { force } = cli.command {
        return cmd_init(cli.data_dir, force).await;
    }

    // Completions don't need config or database
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "docquery", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load_from(cli.data_dir)?;
    if !config.is_initialized() {
        return Err(docquery::error::Error::NotInitialized);
    }
    config.validate()?;

    let db = MetaDb::connect(&config).await?;
    let registry = ProviderRegistry::from_config(&config);

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest { source } => {
            let report = match source {
                IngestSource::File {
                    path,
                    extractor,
                    embedder,
                    skip_embeddings,
                } => {
                    let options = IngestOptions {
                        extraction_provider: extractor,
                        embedding_provider: embedder,
                        skip_embeddings,
                    };
                    cmd_ingest_file(&config, &db, &registry, &path, options).await?
                }
                IngestSource::Url { url, embedder } => {
                    let options = IngestOptions {
                        embedding_provider: embedder,
                        ..Default::default()
                    };
                    cmd_ingest_url(&config, &db, &registry, &url, options).await?
                }
                IngestSource::Text {
                    text,
                    name,
                    embedder,
                } => {
                    let options = IngestOptions {
                        embedding_provider: embedder,
                        ..Default::default()
                    };
                    cmd_ingest_text(&config, &db, &registry, &text, name, options).await?
                }
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_ingest_report(&report);
            }
        }

        Commands::Ask {
            question,
            top_k,
            filename,
            document,
            generator,
        } => {
            let options = AskOptions {
                top_k,
                filename,
                document_id: document,
                generation_provider: generator,
            };

            let report = cmd_ask(&config, &db, &registry, &question, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_ask_report(&report);
            }
        }

        Commands::Status => {
            let report = cmd_status(&config, &db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
        }

        Commands::Remove { document_id } => {
            let report = cmd_remove(&config, &db, &document_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_remove_report(&report);
            }
        }

        Commands::Db { action } => {
            handle_db_action(&config, &registry, action, cli.json).await?;
        }
    }

    Ok(())
}

async fn handle_db_action(
    config: &Config,
    registry: &ProviderRegistry,
    action: DbAction,
    json: bool,
) -> Result<()> {
    let dimension = registry
        .get(&config.embedding.default_provider)
        .and_then(|spec| spec.dimension)
        .unwrap_or(384);
    let store = QdrantStore::connect(config, dimension).await?;

    match action {
        DbAction::Init => {
            store.ensure_collection().await?;
            if json {
                println!(r#"{{"status": "ok", "message": "Collection initialized"}}"#);
            } else {
                println!("✓ Qdrant collection initialized");
            }
        }
        DbAction::Status => match store.get_collection_info().await? {
            Some(info) => {
                if json {
                    println!(
                        r#"{{"exists": true, "points_count": {}, "indexed_vectors_count": {}, "status": "{}"}}"#,
                        info.points_count, info.indexed_vectors_count, info.status
                    );
                } else {
                    println!("Qdrant Collection Status:");
                    println!("  Status: {}", info.status);
                    println!("  Points: {}", info.points_count);
                    println!("  Indexed Vectors: {}", info.indexed_vectors_count);
                }
            }
            None => {
                if json {
                    println!(r#"{{"exists": false}}"#);
                } else {
                    println!("Collection does not exist. Run 'docquery db init' to create it.");
                }
            }
        },
        DbAction::Reset { yes } => {
            if !yes {
                eprintln!("⚠️  This will delete ALL indexed vectors!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            store.delete_collection().await?;
            store.ensure_collection().await?;
            if json {
                println!(r#"{{"status": "ok", "message": "Collection reset"}}"#);
            } else {
                println!("✓ Qdrant collection reset (all vectors deleted and collection recreated)");
            }
        }
    }

    Ok(())
}
