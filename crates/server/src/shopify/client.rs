//! `reqwest`-backed Shopify Admin REST client.
//!
//! - Authentication: `X-Shopify-Access-Token: <token>` per request
//! - Base URL: `https://{shop}/admin/api/{version}`
//! - Pagination: cursor in the `Link` response header

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use cartshield_core::ShopDomain;

use super::pagination::next_page_info;
use super::{CommerceApi, ProductPage, ProductsResponse, ShopInfo, ShopResponse, ShopifyError};
use crate::config::ShopifyApiConfig;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Largest error body kept in [`ShopifyError::Api`] messages.
const MAX_ERROR_BODY: usize = 512;

/// Shopify Admin REST client.
///
/// Cheap to clone; holds one connection pool shared by every store.
#[derive(Clone)]
pub struct ShopifyRestClient {
    inner: Arc<ShopifyRestClientInner>,
}

struct ShopifyRestClientInner {
    client: reqwest::Client,
    api_version: String,
    page_size: u32,
}

impl ShopifyRestClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ShopifyApiConfig) -> Result<Self, ShopifyError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!("cartshield/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyRestClientInner {
                client,
                api_version: config.api_version.clone(),
                page_size: config.page_size,
            }),
        })
    }

    /// Build an Admin API endpoint URL for `domain`.
    fn endpoint(&self, domain: &ShopDomain, resource: &str) -> Result<Url, ShopifyError> {
        let raw = format!(
            "https://{domain}/admin/api/{}/{resource}",
            self.inner.api_version
        );
        Url::parse(&raw).map_err(|e| ShopifyError::Parse(format!("invalid endpoint {raw}: {e}")))
    }

    fn products_url(
        &self,
        domain: &ShopDomain,
        page_info: Option<&str>,
    ) -> Result<Url, ShopifyError> {
        let mut url = self.endpoint(domain, "products.json")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.inner.page_size.to_string());
            if let Some(cursor) = page_info {
                query.append_pair("page_info", cursor);
            }
        }
        Ok(url)
    }

    /// Execute an authenticated GET.
    async fn get(&self, url: Url, token: &SecretString) -> Result<reqwest::Response, ShopifyError> {
        let token = HeaderValue::from_str(token.expose_secret())
            .map_err(|_| ShopifyError::Parse("access token is not a valid header value".into()))?;

        let response = self
            .inner
            .client
            .get(url)
            .header(ACCESS_TOKEN_HEADER, token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::parse_error(response).await)
        }
    }

    /// Map a non-success response to an error.
    async fn parse_error(response: reqwest::Response) -> ShopifyError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(2, |secs| secs.ceil() as u64);
            return ShopifyError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return ShopifyError::Unauthorized(status);
        }

        let mut message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| message.is_char_boundary(*i))
                .unwrap_or(0);
            message.truncate(cut);
        }

        ShopifyError::Api { status, message }
    }
}

#[async_trait]
impl CommerceApi for ShopifyRestClient {
    #[instrument(skip(self, token), fields(shop = %domain))]
    async fn shop_info(
        &self,
        domain: &ShopDomain,
        token: &SecretString,
    ) -> Result<ShopInfo, ShopifyError> {
        let url = self.endpoint(domain, "shop.json")?;
        let response = self.get(url, token).await?;
        let body: ShopResponse = response
            .json()
            .await
            .map_err(|e| ShopifyError::Parse(format!("Failed to parse shop response: {e}")))?;
        Ok(body.shop)
    }

    #[instrument(skip(self, token), fields(shop = %domain))]
    async fn products_page(
        &self,
        domain: &ShopDomain,
        token: &SecretString,
        page_info: Option<&str>,
    ) -> Result<ProductPage, ShopifyError> {
        let url = self.products_url(domain, page_info)?;
        let response = self.get(url, token).await?;

        let next_page_info = next_page_info(
            response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok()),
        );

        let body: ProductsResponse = response
            .json()
            .await
            .map_err(|e| ShopifyError::Parse(format!("Failed to parse products response: {e}")))?;

        Ok(ProductPage {
            products: body.products,
            next_page_info,
        })
    }
}

impl std::fmt::Debug for ShopifyRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyRestClient")
            .field("api_version", &self.inner.api_version)
            .field("page_size", &self.inner.page_size)
            .finish_non_exhaustive()
    }
}
