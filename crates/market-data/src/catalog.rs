//! One-shot fetcher for the upstream catalog API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::errors::FetchError;
use crate::models::{CatalogItem, CatalogResponse};

/// Default HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only source of catalog data.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the catalog and return the items in the target category
    /// along with the upstream `lastUpdated` timestamp (epoch ms).
    async fn fetch_catalog(&self) -> Result<(Vec<CatalogItem>, i64), FetchError>;
}

/// HTTP client for the catalog API.
///
/// The catalog is not rate limited the way the price API is, so this
/// client does not go through the request pacer.
pub struct CatalogClient {
    http: Client,
    url: String,
    category: String,
}

impl CatalogClient {
    /// Create a catalog client filtering on the given category.
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            url: url.into(),
            category: category.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    /// Fails closed: a non-200 status or a `success: false` payload is
    /// a hard error with no partial result.
    async fn fetch_catalog(&self) -> Result<(Vec<CatalogItem>, i64), FetchError> {
        let resp = self.http.get(&self.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::status(resp.status()));
        }

        let body: CatalogResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        if !body.success {
            return Err(FetchError::Rejected);
        }

        let items = filter_category(body.items, &self.category);
        Ok((items, body.last_updated))
    }
}

/// Keep only the items in the target category.
fn filter_category(items: Vec<CatalogItem>, category: &str) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter(|item| item.category == category)
        .collect()
}
