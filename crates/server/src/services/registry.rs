//! Backup store registration and the multi-store feature flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use cartshield_core::{BackupStoreId, ShopDomain, StoreId};

use super::sync::ProductSynchronizer;
use crate::db::{FailoverRepository, RepositoryError};
use crate::models::{BackupStore, MAX_BACKUP_STORES, MappingStats, NewBackupStore};
use crate::shopify::{CommerceApi, ShopifyError};

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid access token for {0}")]
    InvalidCredential(ShopDomain),

    #[error("maximum of {max} backup stores reached")]
    CapacityExceeded { max: usize },

    #[error("backup store already exists")]
    AlreadyExists,

    #[error("backup store not found")]
    NotFound,

    #[error("could not verify store with the platform: {0}")]
    Upstream(#[source] ShopifyError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RegistryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::CapacityExceeded { max } => Self::CapacityExceeded { max },
            RepositoryError::Conflict(_) => Self::AlreadyExists,
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// A backup store as shown to the merchant. Never carries the token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStoreView {
    pub id: BackupStoreId,
    pub domain: ShopDomain,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub mapping_count: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl BackupStoreView {
    fn new(backup: BackupStore, stats: Option<&MappingStats>) -> Self {
        Self {
            id: backup.id,
            domain: backup.domain,
            enabled: backup.enabled,
            created_at: backup.created_at,
            mapping_count: stats.map_or(0, |s| s.mapping_count),
            last_synced_at: stats.and_then(|s| s.last_synced_at),
        }
    }
}

impl From<BackupStore> for BackupStoreView {
    fn from(backup: BackupStore) -> Self {
        Self::new(backup, None)
    }
}

/// Multi-store configuration for one primary store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiStoreConfigView {
    pub enabled: bool,
    pub backup_stores: Vec<BackupStoreView>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub max_backup_stores: usize,
}

/// Owns the set of backup stores per primary store.
#[derive(Clone)]
pub struct BackupStoreRegistry {
    repo: Arc<dyn FailoverRepository>,
    api: Arc<dyn CommerceApi>,
    sync: ProductSynchronizer,
}

impl BackupStoreRegistry {
    #[must_use]
    pub fn new(
        repo: Arc<dyn FailoverRepository>,
        api: Arc<dyn CommerceApi>,
        sync: ProductSynchronizer,
    ) -> Self {
        Self { repo, api, sync }
    }

    /// Register a backup store after validating its token against the platform.
    ///
    /// The store is saved under the canonical domain the platform reports and
    /// starts enabled. A sync scoped to the new store runs in the background.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed domain or blank token
    /// - `InvalidCredential` if the platform rejects the token
    /// - `CapacityExceeded` if the store already has the maximum
    /// - `AlreadyExists` if the canonical domain is already registered
    /// - `Upstream` if the platform cannot be reached
    #[instrument(skip(self, access_token), fields(store_id = %store_id))]
    pub async fn add_backup_store(
        &self,
        store_id: StoreId,
        domain: &str,
        access_token: SecretString,
    ) -> Result<BackupStore, RegistryError> {
        let domain = ShopDomain::parse(domain)
            .map_err(|e| RegistryError::Validation(format!("invalid domain: {e}")))?;
        let access_token = SecretString::from(access_token.expose_secret().trim().to_owned());
        if access_token.expose_secret().is_empty() {
            return Err(RegistryError::Validation(
                "access token is required".to_string(),
            ));
        }

        // Fail fast before calling the platform; the insert re-checks atomically.
        let existing = self.repo.list_backup_stores(store_id).await?;
        if existing.len() >= MAX_BACKUP_STORES {
            return Err(RegistryError::CapacityExceeded {
                max: MAX_BACKUP_STORES,
            });
        }

        let shop = self
            .api
            .shop_info(&domain, &access_token)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    RegistryError::InvalidCredential(domain.clone())
                } else {
                    tracing::warn!(error = %e, domain = %domain, "shop lookup failed");
                    RegistryError::Upstream(e)
                }
            })?;

        let canonical = match shop.canonical_domain().map(ShopDomain::parse) {
            Some(Ok(canonical)) => canonical,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "platform returned an unusable domain");
                domain
            }
            None => domain,
        };

        let backup = self
            .repo
            .insert_backup_store(
                NewBackupStore {
                    store_id,
                    domain: canonical,
                    access_token,
                },
                MAX_BACKUP_STORES,
            )
            .await?;

        tracing::info!(backup_store_id = %backup.id, domain = %backup.domain, "backup store added");
        self.sync.spawn_backup_sync(store_id, backup.id);

        Ok(backup)
    }

    /// Remove a backup store and its mappings.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the backup store does not belong to `store_id`.
    #[instrument(skip(self), fields(store_id = %store_id, backup_store_id = %id))]
    pub async fn remove_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<(), RegistryError> {
        if self.repo.delete_backup_store(store_id, id).await? {
            tracing::info!("backup store removed");
            Ok(())
        } else {
            Err(RegistryError::NotFound)
        }
    }

    /// Enable or disable a backup store. Its mappings are kept either way.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the backup store does not belong to `store_id`.
    #[instrument(skip(self), fields(store_id = %store_id, backup_store_id = %id))]
    pub async fn toggle_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
        enabled: bool,
    ) -> Result<BackupStore, RegistryError> {
        self.repo
            .set_backup_store_enabled(store_id, id, enabled)
            .await?
            .ok_or(RegistryError::NotFound)
    }

    /// Turn checkout routing on or off for a store.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the flag cannot be saved.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn toggle_multi_store(
        &self,
        store_id: StoreId,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.repo.set_multi_store_enabled(store_id, enabled).await?;
        tracing::info!(enabled, "multi-store checkout toggled");
        Ok(())
    }

    /// Current multi-store configuration.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the configuration cannot be loaded.
    pub async fn get_config(&self, store_id: StoreId) -> Result<MultiStoreConfigView, RegistryError> {
        let enabled = self.repo.multi_store_enabled(store_id).await?;
        let backups = self.repo.list_backup_stores(store_id).await?;
        let stats = self.repo.mapping_stats(store_id).await?;
        let last_synced_at = self.repo.last_synced_at(store_id).await?;

        let backup_stores = backups
            .into_iter()
            .map(|b| {
                let s = stats.iter().find(|s| s.backup_store_id == b.id);
                BackupStoreView::new(b, s)
            })
            .collect();

        Ok(MultiStoreConfigView {
            enabled,
            backup_stores,
            last_synced_at,
            max_backup_stores: MAX_BACKUP_STORES,
        })
    }
}
