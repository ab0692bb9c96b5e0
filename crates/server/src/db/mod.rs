//! Database operations for the failover registry and mapping table.
//!
//! # Database schema: `failover`
//!
//! ## Tables
//!
//! - `stores` - Primary storefronts and their Admin API tokens
//! - `multi_store_config` - Per-store feature flag gating checkout routing
//! - `backup_stores` - Failover storefronts (at most 5 per store)
//! - `product_mappings` - SKU-joined primary → backup variant correspondences
//! - `session` - tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p cartshield-cli -- migrate
//! ```

#[cfg(test)]
pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use cartshield_core::{BackupStoreId, ShopDomain, StoreId, VariantRef};

use crate::models::{BackupStore, MappingDraft, MappingStats, NewBackupStore, Store};

pub use postgres::PgFailoverRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate domain).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The owning store already has the maximum number of backup stores.
    #[error("store already has {max} backup stores")]
    CapacityExceeded {
        /// The cap that was hit.
        max: usize,
    },
}

/// Persistence for stores, backup stores and product mappings.
///
/// Every backup-store and mapping operation is scoped by the owning
/// [`StoreId`], so a caller can never reach another merchant's rows.
#[async_trait]
pub trait FailoverRepository: Send + Sync {
    /// Check database connectivity.
    async fn health_check(&self) -> Result<(), RepositoryError>;

    // ---- Stores ------------------------------------------------------------

    /// Get a primary store by ID.
    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// Get a primary store by canonical domain.
    async fn find_store_by_domain(
        &self,
        domain: &ShopDomain,
    ) -> Result<Option<Store>, RepositoryError>;

    /// Create a primary store. Fails with `Conflict` if the domain exists.
    async fn create_store(
        &self,
        domain: &ShopDomain,
        access_token: Option<&SecretString>,
    ) -> Result<Store, RepositoryError>;

    /// Replace a primary store's Admin API token.
    async fn set_store_token(
        &self,
        id: StoreId,
        access_token: &SecretString,
    ) -> Result<(), RepositoryError>;

    // ---- Feature flag ------------------------------------------------------

    /// Whether checkout routing is enabled. A missing row means disabled.
    async fn multi_store_enabled(&self, store_id: StoreId) -> Result<bool, RepositoryError>;

    /// Enable or disable checkout routing.
    async fn set_multi_store_enabled(
        &self,
        store_id: StoreId,
        enabled: bool,
    ) -> Result<(), RepositoryError>;

    // ---- Backup stores -----------------------------------------------------

    /// List a store's backup stores in insertion order.
    async fn list_backup_stores(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<BackupStore>, RepositoryError>;

    /// Get a backup store if it belongs to `store_id`.
    async fn find_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<Option<BackupStore>, RepositoryError>;

    /// Insert a backup store, enabled.
    ///
    /// The cap and domain uniqueness are checked atomically with the insert:
    /// `CapacityExceeded` if the store already has `max` backups, `Conflict`
    /// if the domain is already registered for the store.
    async fn insert_backup_store(
        &self,
        new: NewBackupStore,
        max: usize,
    ) -> Result<BackupStore, RepositoryError>;

    /// Delete a backup store and its mappings. Returns false if not owned.
    async fn delete_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<bool, RepositoryError>;

    /// Set a backup store's enabled flag. Returns `None` if not owned.
    async fn set_backup_store_enabled(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
        enabled: bool,
    ) -> Result<Option<BackupStore>, RepositoryError>;

    // ---- Product mappings --------------------------------------------------

    /// Upsert a batch of mappings for one backup store in one transaction,
    /// keyed by (store, backup store, SKU), and advance the backup store's
    /// sync epoch to `synced_at`. An empty batch still advances the epoch.
    /// Returns rows written; `NotFound` if the backup store is gone.
    async fn upsert_mappings(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        drafts: &[MappingDraft],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Resolve primary variant IDs to backup variant IDs for one backup store.
    /// Unmapped IDs are absent from the result.
    async fn resolve_variants(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        primary_variant_ids: &[VariantRef],
    ) -> Result<HashMap<VariantRef, VariantRef>, RepositoryError>;

    /// Most recent `last_synced_at` across all of a store's mappings.
    async fn last_synced_at(
        &self,
        store_id: StoreId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    /// Mapping count and last sync time per backup store.
    async fn mapping_stats(&self, store_id: StoreId)
    -> Result<Vec<MappingStats>, RepositoryError>;

    /// Delete rows older than their backup store's sync epoch. Backup stores
    /// never synced keep all their rows.
    async fn prune_stale_mappings(&self, store_id: StoreId) -> Result<u64, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded migrations against `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
