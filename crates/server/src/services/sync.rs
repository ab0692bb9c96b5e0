//! SKU-joined product mapping between a primary store and its backups.
//!
//! A sync run indexes the primary catalog by SKU, walks each enabled backup
//! catalog, and upserts one mapping row per backup variant whose SKU appears
//! in the index. Each backup store is written in its own transaction; a
//! backup that cannot be read is skipped and keeps its previous rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::instrument;

use cartshield_core::{BackupStoreId, ShopDomain, Sku, StoreId, VariantRef};

use super::catalog::{CatalogError, CatalogFetcher};
use crate::db::{FailoverRepository, RepositoryError};
use crate::models::{BackupStore, MappingDraft};
use crate::shopify::Product;

/// Which backup stores a sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Every enabled backup store.
    All,
    /// One backup store, if enabled.
    Backup(BackupStoreId),
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store not found")]
    NotFound,

    #[error("store has no Admin API token")]
    NoApiToken,

    #[error("no enabled backup stores")]
    NoEnabledBackups,

    #[error("primary store catalog is empty")]
    EmptyPrimaryCatalog,

    /// The primary catalog could not be read.
    #[error(transparent)]
    Upstream(#[from] CatalogError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A backup store left out of a run, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStore {
    pub backup_store_id: BackupStoreId,
    pub domain: ShopDomain,
    pub reason: String,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub mappings_upserted: u64,
    pub primary_skus: usize,
    pub stores_processed: usize,
    pub skipped: Vec<SkippedStore>,
    pub synced_at: DateTime<Utc>,
}

/// Outcome of a prune.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub mappings_removed: u64,
}

/// A primary variant found under a SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PrimaryEntry {
    variant_id: VariantRef,
    title: String,
}

/// Index `products` by SKU. Variants without a SKU are ignored; a repeated
/// SKU keeps the last variant seen.
fn build_sku_index(products: &[Product]) -> HashMap<Sku, PrimaryEntry> {
    let mut index = HashMap::new();
    for product in products {
        for variant in &product.variants {
            let Some(sku) = variant.sku.as_deref().and_then(Sku::parse) else {
                continue;
            };
            index.insert(
                sku,
                PrimaryEntry {
                    variant_id: VariantRef::from(variant.id),
                    title: product.title.clone(),
                },
            );
        }
    }
    index
}

/// Match a backup catalog against the primary index. One draft per SKU; a
/// repeated backup SKU keeps the last variant seen.
fn match_backup(index: &HashMap<Sku, PrimaryEntry>, products: &[Product]) -> Vec<MappingDraft> {
    let mut drafts: BTreeMap<Sku, MappingDraft> = BTreeMap::new();
    for variant in products.iter().flat_map(|p| &p.variants) {
        let Some(sku) = variant.sku.as_deref().and_then(Sku::parse) else {
            continue;
        };
        let Some(primary) = index.get(&sku) else {
            continue;
        };
        drafts.insert(
            sku.clone(),
            MappingDraft {
                sku,
                primary_variant_id: primary.variant_id.clone(),
                backup_variant_id: VariantRef::from(variant.id),
                primary_product_title: primary.title.clone(),
            },
        );
    }
    drafts.into_values().collect()
}

/// Builds and refreshes product mappings.
#[derive(Clone)]
pub struct ProductSynchronizer {
    repo: Arc<dyn FailoverRepository>,
    catalog: CatalogFetcher,
    concurrency: usize,
}

impl ProductSynchronizer {
    #[must_use]
    pub fn new(repo: Arc<dyn FailoverRepository>, catalog: CatalogFetcher, concurrency: usize) -> Self {
        Self {
            repo,
            catalog,
            concurrency: concurrency.max(1),
        }
    }

    /// Sync mappings for `store_id` across the backup stores in `scope`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the store cannot be synced at all. Failures of
    /// individual backup stores are reported in [`SyncReport::skipped`].
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn sync_products(
        &self,
        store_id: StoreId,
        scope: SyncScope,
    ) -> Result<SyncReport, SyncError> {
        let store = self
            .repo
            .find_store(store_id)
            .await?
            .ok_or(SyncError::NotFound)?;
        let token = store.access_token.clone().ok_or(SyncError::NoApiToken)?;

        let backups: Vec<BackupStore> = self
            .repo
            .list_backup_stores(store_id)
            .await?
            .into_iter()
            .filter(|b| b.enabled)
            .filter(|b| match scope {
                SyncScope::All => true,
                SyncScope::Backup(id) => b.id == id,
            })
            .collect();
        if backups.is_empty() {
            return Err(SyncError::NoEnabledBackups);
        }

        let primary = self.catalog.fetch_all(&store.domain, &token).await?;
        if primary.is_empty() {
            return Err(SyncError::EmptyPrimaryCatalog);
        }

        let index = Arc::new(build_sku_index(&primary));
        let synced_at = Utc::now();
        tracing::info!(
            primary_skus = index.len(),
            backups = backups.len(),
            "starting product sync"
        );

        // Each future owns its inputs so the whole run stays `Send`.
        let outcomes: Vec<Result<u64, SkippedStore>> = stream::iter(backups)
            .map(|backup| {
                let this = self.clone();
                let index = Arc::clone(&index);
                async move { this.sync_backup(store_id, &index, &backup, synced_at).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            mappings_upserted: 0,
            primary_skus: index.len(),
            stores_processed: 0,
            skipped: Vec::new(),
            synced_at,
        };
        for outcome in outcomes {
            match outcome {
                Ok(written) => {
                    report.mappings_upserted += written;
                    report.stores_processed += 1;
                }
                Err(skipped) => report.skipped.push(skipped),
            }
        }
        report.skipped.sort_by_key(|s| s.backup_store_id);

        tracing::info!(
            mappings_upserted = report.mappings_upserted,
            stores_processed = report.stores_processed,
            skipped = report.skipped.len(),
            "product sync finished"
        );
        Ok(report)
    }

    async fn sync_backup(
        &self,
        store_id: StoreId,
        index: &HashMap<Sku, PrimaryEntry>,
        backup: &BackupStore,
        synced_at: DateTime<Utc>,
    ) -> Result<u64, SkippedStore> {
        let skip = |reason: String| {
            tracing::warn!(
                backup_store_id = %backup.id,
                domain = %backup.domain,
                reason = %reason,
                "skipping backup store"
            );
            SkippedStore {
                backup_store_id: backup.id,
                domain: backup.domain.clone(),
                reason,
            }
        };

        let products = self
            .catalog
            .fetch_all(&backup.domain, &backup.access_token)
            .await
            .map_err(|e| skip(e.to_string()))?;
        if products.is_empty() {
            return Err(skip("catalog is empty".to_string()));
        }

        let drafts = match_backup(index, &products);
        self.repo
            .upsert_mappings(store_id, backup.id, &drafts, synced_at)
            .await
            .map_err(|e| skip(format!("failed to save mappings: {e}")))
    }

    /// Run a sync scoped to one backup store in the background. Failures are
    /// logged only.
    pub fn spawn_backup_sync(&self, store_id: StoreId, backup_store_id: BackupStoreId) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this
                .sync_products(store_id, SyncScope::Backup(backup_store_id))
                .await
            {
                Ok(report) => tracing::info!(
                    store_id = %store_id,
                    backup_store_id = %backup_store_id,
                    mappings_upserted = report.mappings_upserted,
                    "background sync finished"
                ),
                Err(e) => tracing::warn!(
                    store_id = %store_id,
                    backup_store_id = %backup_store_id,
                    error = %e,
                    "background sync failed"
                ),
            }
        })
    }

    /// Delete mappings not refreshed by the latest sync of their backup store.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` for an unknown store, or a repository error.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn prune_stale_mappings(&self, store_id: StoreId) -> Result<PruneReport, SyncError> {
        if self.repo.find_store(store_id).await?.is_none() {
            return Err(SyncError::NotFound);
        }
        let mappings_removed = self.repo.prune_stale_mappings(store_id).await?;
        tracing::info!(mappings_removed, "pruned stale mappings");
        Ok(PruneReport { mappings_removed })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::config::ShopifyApiConfig;
    use crate::db::memory::MemoryRepository;
    use crate::models::{MAX_BACKUP_STORES, NewBackupStore, Store};
    use crate::services::catalog::testing::{FakeCommerce, product};
    use crate::shopify::Variant;

    const PRIMARY: &str = "primary.myshopify.com";
    const B1: &str = "backup-one.myshopify.com";
    const B2: &str = "backup-two.myshopify.com";

    struct Harness {
        repo: Arc<MemoryRepository>,
        api: Arc<FakeCommerce>,
        sync: ProductSynchronizer,
        store: Store,
    }

    async fn harness(api: FakeCommerce) -> Harness {
        let repo = Arc::new(MemoryRepository::new());
        let api = Arc::new(api);
        let catalog = CatalogFetcher::new(api.clone(), &ShopifyApiConfig::default());
        let sync = ProductSynchronizer::new(repo.clone(), catalog, 2);
        let store = repo.seed_store(PRIMARY, Some("shpat_primary")).await;
        Harness {
            repo,
            api,
            sync,
            store,
        }
    }

    async fn add_backup(h: &Harness, domain: &str) -> BackupStore {
        h.repo
            .insert_backup_store(
                NewBackupStore {
                    store_id: h.store.id,
                    domain: ShopDomain::parse(domain).unwrap(),
                    access_token: SecretString::from("shpat_backup"),
                },
                MAX_BACKUP_STORES,
            )
            .await
            .unwrap()
    }

    fn primary_catalog() -> Vec<Product> {
        vec![
            product("Tee", &[(111, "ABC"), (112, "ABD")]),
            product("Mug", &[(113, "MUG-1")]),
        ]
    }

    #[test]
    fn test_index_ignores_blank_skus_and_last_write_wins() {
        let mut products = vec![product("First", &[(1, "DUP"), (2, "  ")])];
        products.push(Product {
            title: "No SKU".to_string(),
            variants: vec![Variant {
                id: 3,
                sku: None,
                price: None,
                title: None,
            }],
        });
        products.push(product("Second", &[(4, "DUP")]));

        let index = build_sku_index(&products);
        assert_eq!(index.len(), 1);
        let entry = &index[&Sku::parse("DUP").unwrap()];
        assert_eq!(entry.variant_id.as_str(), "4");
        assert_eq!(entry.title, "Second");
    }

    #[test]
    fn test_match_backup_dedupes_backup_skus() {
        let index = build_sku_index(&[product("Tee", &[(111, "ABC")])]);
        let drafts = match_backup(
            &index,
            &[product("Tee", &[(222, "ABC"), (223, "ABC"), (224, "ZZZ")])],
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].primary_variant_id.as_str(), "111");
        assert_eq!(drafts[0].backup_variant_id.as_str(), "223");
    }

    #[test]
    fn test_sku_match_is_case_sensitive() {
        let index = build_sku_index(&[product("Tee", &[(111, "abc")])]);
        let drafts = match_backup(&index, &[product("Tee", &[(222, "ABC")])]);
        assert!(drafts.is_empty());
    }

    #[tokio::test]
    async fn test_sync_maps_by_sku() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC"), (999, "OTHER")])]);
        let h = harness(api).await;
        let b1 = add_backup(&h, B1).await;

        let report = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();

        assert_eq!(report.mappings_upserted, 1);
        assert_eq!(report.primary_skus, 3);
        assert_eq!(report.stores_processed, 1);
        assert!(report.skipped.is_empty());

        let rows = h.repo.mappings(h.store.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].backup_store_id, b1.id);
        assert_eq!(rows[0].sku.as_str(), "ABC");
        assert_eq!(rows[0].primary_variant_id.as_str(), "111");
        assert_eq!(rows[0].backup_variant_id.as_str(), "222");
        assert_eq!(rows[0].primary_product_title, "Tee");
        assert_eq!(rows[0].last_synced_at, report.synced_at);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC"), (223, "ABD")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;

        let first = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();

        let rows = h.repo.mappings(h.store.id).await;
        assert_eq!(rows.len(), 2);
        assert!(second.synced_at > first.synced_at);
        assert!(rows.iter().all(|r| r.last_synced_at == second.synced_at));
    }

    #[tokio::test]
    async fn test_failing_backup_is_skipped_and_keeps_rows() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])])
            .with_catalog(B2, vec![product("Tee", &[(333, "ABC")])]);
        let h = harness(api).await;
        let b1 = add_backup(&h, B1).await;
        let b2 = add_backup(&h, B2).await;

        h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 2);
        tokio::time::sleep(Duration::from_millis(5)).await;

        h.api.set_catalog(B2, vec![]);
        let report = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();

        assert_eq!(report.stores_processed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].backup_store_id, b2.id);
        assert_eq!(report.skipped[0].reason, "catalog is empty");

        let rows = h.repo.mappings(h.store.id).await;
        assert_eq!(rows.len(), 2);
        let b1_row = rows.iter().find(|r| r.backup_store_id == b1.id).unwrap();
        let b2_row = rows.iter().find(|r| r.backup_store_id == b2.id).unwrap();
        assert_eq!(b1_row.last_synced_at, report.synced_at);
        assert!(b2_row.last_synced_at < report.synced_at);
    }

    #[tokio::test]
    async fn test_upstream_backup_error_is_skipped() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_failing_catalog(B1, 500)
            .with_catalog(B2, vec![product("Mug", &[(444, "MUG-1")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;
        add_backup(&h, B2).await;

        let report = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        assert_eq!(report.mappings_upserted, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("500"));
    }

    #[tokio::test]
    async fn test_scope_limits_to_one_backup() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])])
            .with_catalog(B2, vec![product("Tee", &[(333, "ABC")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;
        let b2 = add_backup(&h, B2).await;

        let report = h
            .sync
            .sync_products(h.store.id, SyncScope::Backup(b2.id))
            .await
            .unwrap();
        assert_eq!(report.stores_processed, 1);

        let rows = h.repo.mappings(h.store.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].backup_store_id, b2.id);
        assert!(h.api.product_calls().iter().all(|(d, _)| d != B1));
    }

    #[tokio::test]
    async fn test_disabled_backups_are_not_synced() {
        let api = FakeCommerce::new().with_catalog(PRIMARY, primary_catalog());
        let h = harness(api).await;
        let b1 = add_backup(&h, B1).await;
        h.repo
            .set_backup_store_enabled(h.store.id, b1.id, false)
            .await
            .unwrap();

        let err = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap_err();
        assert!(matches!(err, SyncError::NoEnabledBackups));
        assert!(h.api.product_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let api = FakeCommerce::new();
        let h = harness(api).await;
        let store = h.repo.seed_store("tokenless.myshopify.com", None).await;

        let err = h.sync.sync_products(store.id, SyncScope::All).await.unwrap_err();
        assert!(matches!(err, SyncError::NoApiToken));
    }

    #[tokio::test]
    async fn test_unknown_store() {
        let h = harness(FakeCommerce::new()).await;
        let err = h
            .sync
            .sync_products(StoreId::new(999), SyncScope::All)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_primary_catalog() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, vec![])
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;

        let err = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap_err();
        assert!(matches!(err, SyncError::EmptyPrimaryCatalog));
    }

    #[tokio::test]
    async fn test_primary_fetch_failure_surfaces() {
        let api = FakeCommerce::new()
            .with_failing_catalog(PRIMARY, 502)
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;

        let err = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));
        assert!(h.repo.mappings(h.store.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_rows_older_than_epoch() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC"), (223, "ABD")])])
            .with_catalog(B2, vec![product("Tee", &[(333, "ABC")])]);
        let h = harness(api).await;
        let b1 = add_backup(&h, B1).await;
        add_backup(&h, B2).await;

        h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // ABD disappears from B1; B2 fails and keeps its rows.
        h.api.set_catalog(B1, vec![product("Tee", &[(222, "ABC")])]);
        h.api.set_catalog(B2, vec![]);
        h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 3);

        let pruned = h.sync.prune_stale_mappings(h.store.id).await.unwrap();
        assert_eq!(pruned.mappings_removed, 1);

        let rows = h.repo.mappings(h.store.id).await;
        assert_eq!(rows.len(), 2);
        assert!(!rows.iter().any(|r| r.backup_store_id == b1.id && r.sku.as_str() == "ABD"));
    }

    #[tokio::test]
    async fn test_prune_after_sync_matching_no_skus() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC"), (223, "ABD")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;

        h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 2);
        tokio::time::sleep(Duration::from_millis(5)).await;

        // B1 re-SKUed everything: the fetch succeeds but nothing matches.
        h.api
            .set_catalog(B1, vec![product("Tee", &[(222, "NEW-1"), (223, "NEW-2")])]);
        let report = h.sync.sync_products(h.store.id, SyncScope::All).await.unwrap();
        assert_eq!(report.stores_processed, 1);
        assert_eq!(report.mappings_upserted, 0);
        assert!(report.skipped.is_empty());

        let pruned = h.sync.prune_stale_mappings(h.store.id).await.unwrap();
        assert_eq!(pruned.mappings_removed, 2);
        assert!(h.repo.mappings(h.store.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_rows_of_never_synced_backup() {
        let h = harness(FakeCommerce::new()).await;
        let b1 = add_backup(&h, B1).await;
        h.repo
            .seed_mapping(h.store.id, b1.id, "ABC", "111", "222")
            .await;

        let pruned = h.sync.prune_stale_mappings(h.store.id).await.unwrap();
        assert_eq!(pruned.mappings_removed, 0);
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_unknown_store() {
        let h = harness(FakeCommerce::new()).await;
        let err = h.sync.prune_stale_mappings(StoreId::new(42)).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sync_runs_on_spawned_task() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])])
            .with_catalog(B2, vec![product("Mug", &[(444, "MUG-1")])]);
        let h = harness(api).await;
        add_backup(&h, B1).await;
        add_backup(&h, B2).await;

        let sync = h.sync.clone();
        let store_id = h.store.id;
        let report = tokio::spawn(async move { sync.sync_products(store_id, SyncScope::All).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.stores_processed, 2);
        assert_eq!(report.mappings_upserted, 2);
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_spawn_backup_sync() {
        let api = FakeCommerce::new()
            .with_catalog(PRIMARY, primary_catalog())
            .with_catalog(B1, vec![product("Tee", &[(222, "ABC")])]);
        let h = harness(api).await;
        let b1 = add_backup(&h, B1).await;

        h.sync.spawn_backup_sync(h.store.id, b1.id).await.unwrap();
        assert_eq!(h.repo.mappings(h.store.id).await.len(), 1);
    }
}
