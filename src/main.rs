//! # Merchsync Main Entry Point
//!
//! Loads configuration, runs database migrations, and starts the trigger API.

use merchsync::migration::{Migrator, MigratorTrait};
use merchsync::{config::ConfigLoader, db, logging, server::run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new().load()?;
    logging::init_subscriber(&config);
    tracing::info!(profile = %config.profile, "Loaded configuration");

    let pool = db::init_pool(&config).await?;
    Migrator::up(&pool, None).await?;

    run_server(config, pool).await
}
