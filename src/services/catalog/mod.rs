//! Catalog data sources and the paginated feed buffer built on them.

use crate::{
    error::AppResult,
    models::{CatalogPage, CatalogProduct},
};

pub mod http;
pub mod pagination;

pub use http::HttpCatalogSource;
pub use pagination::{InfiniteCatalog, LoadOutcome};

/// Largest page a source is asked for
pub const MAX_PAGE_SIZE: usize = 120;

/// Anything that can serve the product catalog page by page
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches up to `limit` products starting at `offset`
    async fn fetch_page(&self, offset: usize, limit: usize) -> AppResult<CatalogPage>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Fixed in-memory catalog, served in pages like a remote one
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    products: Vec<CatalogProduct>,
}

impl StaticCatalogSource {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        Self { products }
    }
}

#[async_trait::async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> AppResult<CatalogPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let items: Vec<_> = self
            .products
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let next = offset + items.len();
        Ok(CatalogPage {
            has_more: next < self.products.len(),
            next_offset: Some(next),
            items,
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
