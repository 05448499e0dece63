use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    error::AppResult,
    models::CatalogProduct,
    services::catalog::CatalogSource,
};

/// What a `load_more` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched; `added` new products were appended
    Loaded { added: usize },
    /// Another load was in flight or the catalog is exhausted
    Skipped,
}

#[derive(Debug, Default)]
struct CatalogState {
    items: Vec<CatalogProduct>,
    known_ids: HashSet<i64>,
    next_offset: usize,
    has_more: bool,
    pages_loaded: usize,
    last_error: Option<String>,
    /// Bumped by every reset; a fetch started under an older value is discarded
    generation: u64,
}

impl CatalogState {
    fn fresh() -> Self {
        Self {
            has_more: true,
            ..Default::default()
        }
    }
}

/// Clears the in-flight flag even if the load future is dropped mid-fetch
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Accumulating, append-only product buffer fed by a [`CatalogSource`]
pub struct InfiniteCatalog {
    source: Arc<dyn CatalogSource>,
    page_size: usize,
    in_flight: AtomicBool,
    state: Mutex<CatalogState>,
}

impl InfiniteCatalog {
    pub fn new(source: Arc<dyn CatalogSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(CatalogState::fresh()),
        }
    }

    /// Fetches the next page. Overlapping calls are skipped, not queued.
    pub async fn load_more(&self) -> AppResult<LoadOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Catalog load already in flight, skipping");
            return Ok(LoadOutcome::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        let (offset, generation) = {
            let mut state = self.state.lock().await;
            if !state.has_more {
                return Ok(LoadOutcome::Skipped);
            }
            state.last_error = None;
            (state.next_offset, state.generation)
        };

        let fetched_page = self.source.fetch_page(offset, self.page_size).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(offset, "Catalog was reset during load, discarding page");
            return Ok(LoadOutcome::Skipped);
        }

        let page = match fetched_page {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(error = %e, offset, source = self.source.name(), "Catalog load failed");
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let fetched = page.items.len();
        let mut added = 0;
        for product in page.items {
            if state.known_ids.insert(product.id) {
                state.items.push(product);
                added += 1;
            }
        }
        state.next_offset = page.next_offset.unwrap_or(offset + fetched);
        state.has_more = page.has_more && fetched > 0;
        state.pages_loaded += 1;

        tracing::debug!(
            offset,
            fetched,
            added,
            has_more = state.has_more,
            "Catalog page appended"
        );

        Ok(LoadOutcome::Loaded { added })
    }

    /// Loads the first page unless something was loaded already
    pub async fn ensure_loaded(&self) -> AppResult<LoadOutcome> {
        if self.state.lock().await.pages_loaded > 0 {
            return Ok(LoadOutcome::Skipped);
        }
        self.load_more().await
    }

    /// Drops every loaded item and starts over from offset 0
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let generation = state.generation + 1;
        *state = CatalogState {
            generation,
            ..CatalogState::fresh()
        };
    }

    pub async fn items(&self) -> Vec<CatalogProduct> {
        self.state.lock().await.items.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
