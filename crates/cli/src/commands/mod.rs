//! CLI subcommands.
//!
//! # Environment Variables
//!
//! - `CARTSHIELD_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPIFY_*`, `SYNC_CONCURRENCY` - Same meaning as for the server (sync and prune only)

pub mod migrate;
pub mod store;
pub mod sync;

use sqlx::PgPool;
use thiserror::Error;

use cartshield_core::DomainError;
use cartshield_server::config::{ConfigError, get_database_url};
use cartshield_server::db::{self, RepositoryError};
use cartshield_server::services::SyncError;
use cartshield_server::shopify::ShopifyError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid domain: {0}")]
    InvalidDomain(#[from] DomainError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("Shopify client error: {0}")]
    Shopify(#[from] ShopifyError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Store {0} not found")]
    StoreNotFound(i32),
}

/// Load `.env` and connect to the service database.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();
    let database_url = get_database_url("CARTSHIELD_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
