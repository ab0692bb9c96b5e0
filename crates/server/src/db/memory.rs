//! In-memory [`FailoverRepository`] for tests.
//!
//! Mirrors the `PostgreSQL` semantics the services rely on: ownership
//! scoping, the backup-store cap, (store, domain) uniqueness, cascade delete
//! and per-backup sync epochs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

use cartshield_core::{BackupStoreId, ShopDomain, Sku, StoreId, VariantRef};

use super::{FailoverRepository, RepositoryError};
use crate::models::{
    BackupStore, MappingDraft, MappingStats, NewBackupStore, ProductMapping, Store,
};

#[derive(Default)]
struct State {
    next_id: i32,
    stores: Vec<Store>,
    enabled: HashMap<StoreId, bool>,
    backups: Vec<BackupStore>,
    mappings: Vec<(i32, ProductMapping)>,
    sync_epochs: HashMap<BackupStoreId, DateTime<Utc>>,
    fail_reads: bool,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Repository holding everything in a mutex-guarded `Vec`s.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mapping read fail with a database error.
    pub async fn fail_mapping_reads(&self) {
        self.state.lock().await.fail_reads = true;
    }

    /// All mapping rows for a store, ordered by backup store then SKU.
    pub async fn mappings(&self, store_id: StoreId) -> Vec<ProductMapping> {
        let state = self.state.lock().await;
        let mut rows: Vec<ProductMapping> = state
            .mappings
            .iter()
            .filter(|(_, m)| m.store_id == store_id)
            .map(|(_, m)| m.clone())
            .collect();
        rows.sort_by(|a, b| {
            (a.backup_store_id, a.sku.as_str()).cmp(&(b.backup_store_id, b.sku.as_str()))
        });
        rows
    }

    /// Insert a mapping row directly, bypassing the synchronizer.
    pub async fn insert_mapping(&self, mapping: ProductMapping) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.mappings.push((id, mapping));
    }

    /// Convenience for tests: a store with the given domain and token.
    pub async fn seed_store(&self, domain: &str, token: Option<&str>) -> Store {
        let domain = ShopDomain::parse(domain).unwrap();
        let token = token.map(SecretString::from);
        self.create_store(&domain, token.as_ref()).await.unwrap()
    }

    /// Convenience for tests: a mapping row synced now.
    pub async fn seed_mapping(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        sku: &str,
        primary: &str,
        backup: &str,
    ) {
        self.insert_mapping(ProductMapping {
            store_id,
            backup_store_id,
            sku: Sku::parse(sku).unwrap(),
            primary_variant_id: VariantRef::parse(primary).unwrap(),
            backup_variant_id: VariantRef::parse(backup).unwrap(),
            primary_product_title: format!("Product {sku}"),
            last_synced_at: Utc::now(),
        })
        .await;
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl FailoverRepository for MemoryRepository {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.stores.iter().find(|s| s.id == id).cloned())
    }

    async fn find_store_by_domain(
        &self,
        domain: &ShopDomain,
    ) -> Result<Option<Store>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.stores.iter().find(|s| &s.domain == domain).cloned())
    }

    async fn create_store(
        &self,
        domain: &ShopDomain,
        access_token: Option<&SecretString>,
    ) -> Result<Store, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.stores.iter().any(|s| &s.domain == domain) {
            return Err(RepositoryError::Conflict(format!(
                "store {domain} already exists"
            )));
        }
        let store = Store {
            id: StoreId::new(state.next_id()),
            domain: domain.clone(),
            access_token: access_token.cloned(),
            created_at: Utc::now(),
        };
        state.stores.push(store.clone());
        Ok(store)
    }

    async fn set_store_token(
        &self,
        id: StoreId,
        access_token: &SecretString,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let store = state
            .stores
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound)?;
        store.access_token = Some(access_token.clone());
        Ok(())
    }

    async fn multi_store_enabled(&self, store_id: StoreId) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.enabled.get(&store_id).copied().unwrap_or(false))
    }

    async fn set_multi_store_enabled(
        &self,
        store_id: StoreId,
        enabled: bool,
    ) -> Result<(), RepositoryError> {
        self.state.lock().await.enabled.insert(store_id, enabled);
        Ok(())
    }

    async fn list_backup_stores(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<BackupStore>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .backups
            .iter()
            .filter(|b| b.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn find_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<Option<BackupStore>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .backups
            .iter()
            .find(|b| b.id == id && b.store_id == store_id)
            .cloned())
    }

    async fn insert_backup_store(
        &self,
        new: NewBackupStore,
        max: usize,
    ) -> Result<BackupStore, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.stores.iter().any(|s| s.id == new.store_id) {
            return Err(RepositoryError::NotFound);
        }

        let owned = state
            .backups
            .iter()
            .filter(|b| b.store_id == new.store_id)
            .count();
        if owned >= max {
            return Err(RepositoryError::CapacityExceeded { max });
        }

        if state
            .backups
            .iter()
            .any(|b| b.store_id == new.store_id && b.domain == new.domain)
        {
            return Err(RepositoryError::Conflict(format!(
                "backup store {} already exists",
                new.domain
            )));
        }

        let backup = BackupStore {
            id: BackupStoreId::new(state.next_id()),
            store_id: new.store_id,
            domain: new.domain,
            access_token: new.access_token,
            enabled: true,
            created_at: Utc::now(),
        };
        state.backups.push(backup.clone());
        Ok(backup)
    }

    async fn delete_backup_store(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.backups.len();
        state
            .backups
            .retain(|b| !(b.id == id && b.store_id == store_id));
        let deleted = state.backups.len() < before;
        if deleted {
            state.mappings.retain(|(_, m)| m.backup_store_id != id);
            state.sync_epochs.remove(&id);
        }
        Ok(deleted)
    }

    async fn set_backup_store_enabled(
        &self,
        store_id: StoreId,
        id: BackupStoreId,
        enabled: bool,
    ) -> Result<Option<BackupStore>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(backup) = state
            .backups
            .iter_mut()
            .find(|b| b.id == id && b.store_id == store_id)
        else {
            return Ok(None);
        };
        backup.enabled = enabled;
        Ok(Some(backup.clone()))
    }

    async fn upsert_mappings(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        drafts: &[MappingDraft],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state
            .backups
            .iter()
            .any(|b| b.id == backup_store_id && b.store_id == store_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let epoch = state.sync_epochs.entry(backup_store_id).or_insert(synced_at);
        *epoch = (*epoch).max(synced_at);

        for draft in drafts {
            let row = ProductMapping {
                store_id,
                backup_store_id,
                sku: draft.sku.clone(),
                primary_variant_id: draft.primary_variant_id.clone(),
                backup_variant_id: draft.backup_variant_id.clone(),
                primary_product_title: draft.primary_product_title.clone(),
                last_synced_at: synced_at,
            };

            if let Some((_, existing)) = state.mappings.iter_mut().find(|(_, m)| {
                m.store_id == store_id && m.backup_store_id == backup_store_id && m.sku == draft.sku
            }) {
                *existing = row;
            } else {
                let id = state.next_id();
                state.mappings.push((id, row));
            }
        }

        Ok(drafts.len() as u64)
    }

    async fn resolve_variants(
        &self,
        store_id: StoreId,
        backup_store_id: BackupStoreId,
        primary_variant_ids: &[VariantRef],
    ) -> Result<HashMap<VariantRef, VariantRef>, RepositoryError> {
        let state = self.state.lock().await;
        if state.fail_reads {
            return Err(unavailable());
        }

        let mut rows: Vec<&(i32, ProductMapping)> = state
            .mappings
            .iter()
            .filter(|(_, m)| {
                m.store_id == store_id
                    && m.backup_store_id == backup_store_id
                    && primary_variant_ids.contains(&m.primary_variant_id)
            })
            .collect();
        rows.sort_by_key(|(id, m)| (m.last_synced_at, *id));

        Ok(rows
            .into_iter()
            .map(|(_, m)| (m.primary_variant_id.clone(), m.backup_variant_id.clone()))
            .collect())
    }

    async fn last_synced_at(
        &self,
        store_id: StoreId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .mappings
            .iter()
            .filter(|(_, m)| m.store_id == store_id)
            .map(|(_, m)| m.last_synced_at)
            .max())
    }

    async fn mapping_stats(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<MappingStats>, RepositoryError> {
        let state = self.state.lock().await;
        let mut stats: HashMap<BackupStoreId, MappingStats> = HashMap::new();
        for (_, m) in state.mappings.iter().filter(|(_, m)| m.store_id == store_id) {
            let entry = stats.entry(m.backup_store_id).or_insert(MappingStats {
                backup_store_id: m.backup_store_id,
                mapping_count: 0,
                last_synced_at: None,
            });
            entry.mapping_count += 1;
            entry.last_synced_at = entry.last_synced_at.max(Some(m.last_synced_at));
        }
        let mut stats: Vec<MappingStats> = stats.into_values().collect();
        stats.sort_by_key(|s| s.backup_store_id);
        Ok(stats)
    }

    async fn prune_stale_mappings(&self, store_id: StoreId) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let State {
            mappings,
            sync_epochs,
            ..
        } = &mut *state;

        let before = mappings.len();
        mappings.retain(|(_, m)| {
            m.store_id != store_id
                || sync_epochs
                    .get(&m.backup_store_id)
                    .is_none_or(|epoch| m.last_synced_at >= *epoch)
        });
        Ok((before - mappings.len()) as u64)
    }
}
