//! Full-catalog retrieval over cursor-paginated `products.json`.
//!
//! [`ProductPages`] walks a catalog one page at a time and can be restarted
//! from the first page. [`CatalogFetcher::fetch_all`] drains it under a
//! deadline. A store with zero products yields `Ok(vec![])`; any failure
//! yields `Err`, so callers never confuse the two.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tracing::instrument;

use cartshield_core::ShopDomain;

use crate::config::ShopifyApiConfig;
use crate::shopify::{CommerceApi, Product, ShopifyError};

/// Errors from catalog retrieval.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The platform call failed.
    #[error("catalog fetch from {domain} failed: {source}")]
    Upstream {
        domain: ShopDomain,
        #[source]
        source: ShopifyError,
    },

    /// The catalog has more pages than the configured bound.
    #[error("catalog for {domain} exceeds {max_pages} pages")]
    PageLimit { domain: ShopDomain, max_pages: usize },

    /// Draining the catalog took longer than the deadline.
    #[error("catalog fetch from {domain} timed out after {}s", .after.as_secs())]
    Timeout { domain: ShopDomain, after: Duration },
}

impl CatalogError {
    /// Upstream HTTP status, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { source, .. } => source.status(),
            Self::PageLimit { .. } | Self::Timeout { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy page-by-page walk over one store's catalog.
pub struct ProductPages<'a> {
    api: &'a dyn CommerceApi,
    domain: &'a ShopDomain,
    token: &'a SecretString,
    max_pages: usize,
    fetched: usize,
    cursor: Cursor,
}

impl<'a> ProductPages<'a> {
    /// Fetch the next page. Returns `None` once the catalog is exhausted or
    /// after an error has been returned.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Product>, CatalogError>> {
        let page_info = match &self.cursor {
            Cursor::Done => return None,
            Cursor::Start => None,
            Cursor::Next(cursor) => Some(cursor.clone()),
        };

        if self.fetched >= self.max_pages {
            self.cursor = Cursor::Done;
            return Some(Err(CatalogError::PageLimit {
                domain: self.domain.clone(),
                max_pages: self.max_pages,
            }));
        }

        match self
            .api
            .products_page(self.domain, self.token, page_info.as_deref())
            .await
        {
            Ok(page) => {
                self.fetched += 1;
                self.cursor = page.next_page_info.map_or(Cursor::Done, Cursor::Next);
                Some(Ok(page.products))
            }
            Err(source) => {
                self.cursor = Cursor::Done;
                Some(Err(CatalogError::Upstream {
                    domain: self.domain.clone(),
                    source,
                }))
            }
        }
    }

    /// Rewind to the first page.
    pub fn restart(&mut self) {
        self.fetched = 0;
        self.cursor = Cursor::Start;
    }

    /// Pages fetched since the last (re)start.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// Drain the remaining pages into one list.
    ///
    /// # Errors
    ///
    /// Returns the first page error; products from earlier pages are dropped.
    pub async fn collect_all(&mut self) -> Result<Vec<Product>, CatalogError> {
        let mut products = Vec::new();
        while let Some(page) = self.next_page().await {
            products.extend(page?);
        }
        Ok(products)
    }
}

/// Retrieves complete catalogs through a [`CommerceApi`].
#[derive(Clone)]
pub struct CatalogFetcher {
    api: Arc<dyn CommerceApi>,
    max_pages: usize,
    fetch_timeout: Duration,
}

impl CatalogFetcher {
    #[must_use]
    pub fn new(api: Arc<dyn CommerceApi>, config: &ShopifyApiConfig) -> Self {
        Self {
            api,
            max_pages: config.max_pages,
            fetch_timeout: config.fetch_timeout,
        }
    }

    /// The underlying API client.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn CommerceApi> {
        &self.api
    }

    /// Start a lazy walk over `domain`'s catalog.
    #[must_use]
    pub fn pages<'a>(&'a self, domain: &'a ShopDomain, token: &'a SecretString) -> ProductPages<'a> {
        ProductPages {
            api: self.api.as_ref(),
            domain,
            token,
            max_pages: self.max_pages,
            fetched: 0,
            cursor: Cursor::Start,
        }
    }

    /// Fetch every product of `domain`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if any page fails, the page bound is hit, or
    /// the whole fetch exceeds the deadline.
    #[instrument(skip(self, token), fields(shop = %domain))]
    pub async fn fetch_all(
        &self,
        domain: &ShopDomain,
        token: &SecretString,
    ) -> Result<Vec<Product>, CatalogError> {
        let mut pages = self.pages(domain, token);

        let result = match tokio::time::timeout(self.fetch_timeout, pages.collect_all()).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout {
                domain: domain.clone(),
                after: self.fetch_timeout,
            }),
        };

        match &result {
            Ok(products) => tracing::debug!(products = products.len(), "catalog fetched"),
            Err(e) => tracing::warn!(error = %e, "catalog fetch failed"),
        }
        result
    }
}
