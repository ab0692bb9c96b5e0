//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::FailoverRepository;
use crate::services::{BackupStoreRegistry, CatalogFetcher, CheckoutRouter, ProductSynchronizer};
use crate::shopify::CommerceApi;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and wires the services to one
/// repository and one commerce API client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    repo: Arc<dyn FailoverRepository>,
    registry: BackupStoreRegistry,
    sync: ProductSynchronizer,
    checkout: CheckoutRouter,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        repo: Arc<dyn FailoverRepository>,
        api: Arc<dyn CommerceApi>,
    ) -> Self {
        let catalog = CatalogFetcher::new(api.clone(), &config.shopify);
        let sync = ProductSynchronizer::new(repo.clone(), catalog, config.sync.concurrency);
        let registry = BackupStoreRegistry::new(repo.clone(), api, sync.clone());
        let checkout = CheckoutRouter::new(repo.clone(), config.checkout.selector.build());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                repo,
                registry,
                sync,
                checkout,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the repository.
    #[must_use]
    pub fn repo(&self) -> &Arc<dyn FailoverRepository> {
        &self.inner.repo
    }

    #[must_use]
    pub fn registry(&self) -> &BackupStoreRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn sync(&self) -> &ProductSynchronizer {
        &self.inner.sync
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutRouter {
        &self.inner.checkout
    }
}
