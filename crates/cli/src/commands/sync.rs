//! Product mapping sync and prune.
//!
//! Prints the JSON report on stdout, the same body the HTTP endpoints return.

use std::sync::Arc;

use serde::Serialize;

use cartshield_core::{BackupStoreId, StoreId};
use cartshield_server::config::{ShopifyApiConfig, SyncConfig};
use cartshield_server::db::PgFailoverRepository;
use cartshield_server::services::{CatalogFetcher, ProductSynchronizer, SyncScope};
use cartshield_server::shopify::ShopifyRestClient;

use super::{CommandError, connect};

async fn synchronizer() -> Result<ProductSynchronizer, CommandError> {
    let shopify = ShopifyApiConfig::from_env()?;
    let sync = SyncConfig::from_env()?;
    let client = ShopifyRestClient::new(&shopify)?;
    let repo = PgFailoverRepository::new(connect().await?);

    Ok(ProductSynchronizer::new(
        Arc::new(repo),
        CatalogFetcher::new(Arc::new(client), &shopify),
        sync.concurrency,
    ))
}

/// Sync one store's mappings, optionally limited to a single backup store.
pub async fn sync(store_id: i32, backup_id: Option<i32>) -> Result<(), CommandError> {
    let scope = backup_id.map_or(SyncScope::All, |id| SyncScope::Backup(BackupStoreId::new(id)));

    let report = synchronizer()
        .await?
        .sync_products(StoreId::new(store_id), scope)
        .await?;

    for skipped in &report.skipped {
        tracing::warn!(domain = %skipped.domain, reason = %skipped.reason, "Backup store skipped");
    }
    print_report(&report);
    Ok(())
}

/// Delete one store's stale mappings.
pub async fn prune(store_id: i32) -> Result<(), CommandError> {
    let report = synchronizer()
        .await?
        .prune_stale_mappings(StoreId::new(store_id))
        .await?;

    print_report(&report);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_report<T: Serialize>(report: &T) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
    }
}
