//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::providers::ProviderRegistry;
use crate::store::QdrantStore;
use std::path::PathBuf;
use tracing::{info, warn};

/// Initialize docquery configuration and database.
///
/// Qdrant being unreachable is not fatal here; the collection is created
/// lazily on first ingest as well.
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.validate()?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    let registry = ProviderRegistry::from_config(&config);
    let dimension = registry
        .get(&config.embedding.default_provider)
        .and_then(|spec| spec.dimension)
        .unwrap_or(384);

    match QdrantStore::connect(&config, dimension).await {
        Ok(store) => match store.ensure_collection().await {
            Ok(_) => info!("Qdrant collection '{}' ready", config.collection_name),
            Err(e) => {
                warn!(
                    "Could not create Qdrant collection: {}. You can create it later with 'docquery db init'.",
                    e
                );
            }
        },
        Err(e) => {
            warn!(
                "Could not connect to Qdrant at {}: {}. Make sure Qdrant is running.",
                config.qdrant_url, e
            );
        }
    }

    println!("✓ Initialized docquery at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!("  docquery ingest file ./report.pdf        # Index a document");
    println!("  docquery ingest url https://example.com  # Index a web page");
    println!("  docquery ask \"what does the report say\"  # Ask a question");

    Ok(())
}
