//! Database migration command.
//!
//! Applies `crates/server/migrations/` (schema `failover`, including the
//! session table). The server never migrates on startup.

use super::{CommandError, connect};

/// Run all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    cartshield_server::db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
