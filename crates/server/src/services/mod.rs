//! Business logic for multi-store failover.
//!
//! - [`registry`] - Backup store registration and the feature flag
//! - [`catalog`] - Paginated catalog retrieval
//! - [`sync`] - SKU-based product mapping
//! - [`checkout`] - Routing carts to a backup store

pub mod catalog;
pub mod checkout;
pub mod registry;
pub mod sync;

pub use catalog::{CatalogError, CatalogFetcher, ProductPages};
pub use checkout::{
    BackupSelector, CheckoutRouter, NoRedirectReason, OrderedSelector, RouteResult, SelectorKind,
    UniformRandomSelector,
};
pub use registry::{BackupStoreRegistry, BackupStoreView, MultiStoreConfigView, RegistryError};
pub use sync::{ProductSynchronizer, PruneReport, SkippedStore, SyncError, SyncReport, SyncScope};
