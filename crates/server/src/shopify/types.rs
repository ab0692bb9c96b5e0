//! Shopify Admin REST response types.
//!
//! Only the fields the failover subsystem reads are modeled; serde ignores
//! the rest. Variant prices arrive as decimal strings (`"19.99"`) and are
//! passed through untouched.

use serde::Deserialize;

/// Response from `GET /admin/api/{version}/shop.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopResponse {
    pub shop: ShopInfo,
}

/// Store identity as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopInfo {
    /// Primary domain, which may be a custom domain.
    pub domain: Option<String>,
    /// The permanent `*.myshopify.com` domain.
    pub myshopify_domain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ShopInfo {
    /// The domain to register the store under: `myshopify_domain`, falling
    /// back to `domain`. Blank values are skipped.
    #[must_use]
    pub fn canonical_domain(&self) -> Option<&str> {
        [self.myshopify_domain.as_deref(), self.domain.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|d| !d.is_empty())
    }
}

/// Response from `GET /admin/api/{version}/products.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// A product and its variants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Variant {
    /// Numeric variant ID (e.g., `40123456789012`).
    pub id: u64,
    /// Merchant-assigned SKU. `null` or `""` when unset.
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One page of a catalog plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub next_page_info: Option<String>,
}
