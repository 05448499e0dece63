/// Remote catalog API
///
/// Pages are requested with `GET {base}/products?offset=&limit=` and an
/// optional comma-separated `store_ids` restriction. The body is a
/// `CatalogPage` JSON object.
use crate::{
    error::{AppError, AppResult},
    models::CatalogPage,
    services::catalog::{CatalogSource, MAX_PAGE_SIZE},
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct HttpCatalogSource {
    http_client: HttpClient,
    api_url: String,
    store_ids: Vec<i64>,
}

impl HttpCatalogSource {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(HttpClient::new(), api_url)
    }

    pub fn with_client(http_client: HttpClient, api_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            store_ids: Vec::new(),
        }
    }

    /// Restricts every page to the given storefronts
    pub fn with_store_ids(mut self, store_ids: Vec<i64>) -> Self {
        self.store_ids = store_ids;
        self
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.api_url)
    }

    fn query(&self, offset: usize, limit: usize) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("offset", offset.to_string()),
            ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if !self.store_ids.is_empty() {
            let ids: Vec<String> = self.store_ids.iter().map(i64::to_string).collect();
            query.push(("store_ids", ids.join(",")));
        }
        query
    }
}

#[async_trait::async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> AppResult<CatalogPage> {
        let response = self
            .http_client
            .get(self.products_url())
            .query(&self.query(offset, limit))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Catalog API returned status {}: {}",
                status, body
            )));
        }

        let page: CatalogPage = response.json().await?;

        tracing::info!(
            offset,
            items = page.items.len(),
            has_more = page.has_more,
            source = self.name(),
            "Catalog page fetched"
        );

        Ok(page)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
