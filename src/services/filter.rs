use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::CatalogProduct;
use crate::services::facets::{categories_of, sizes_of};

/// Chip label meaning "no category restriction"
pub const ALL_CATEGORIES_CHIP: &str = "Tudo";

/// Text and facet filters applied before deduplication and ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub query: String,
    /// Single category chip; ignored when `categories` is non-empty
    #[serde(default)]
    pub chip_category: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub genders: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Nearest store per brand for the user; empty means every store
    #[serde(default)]
    pub nearest_store_ids: Vec<i64>,
}

impl FilterCriteria {
    /// Whether any filter would drop a product
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
            || !self.nearest_store_ids.is_empty()
            || !self.categories.is_empty()
            || !self.genders.is_empty()
            || !self.sizes.is_empty()
            || self.chip().is_some()
    }

    fn chip(&self) -> Option<String> {
        self.chip_category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES_CHIP.to_lowercase())
    }
}

/// Keeps the products matching every active filter, in input order
pub fn apply_filters(products: Vec<CatalogProduct>, criteria: &FilterCriteria) -> Vec<CatalogProduct> {
    let query = criteria.query.trim().to_lowercase();
    let categories: HashSet<String> = criteria
        .categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    let genders: HashSet<String> = criteria
        .genders
        .iter()
        .map(|g| g.trim().to_lowercase())
        .collect();
    let sizes: HashSet<String> = criteria
        .sizes
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect();
    let stores: HashSet<i64> = criteria.nearest_store_ids.iter().copied().collect();
    let chip = criteria.chip();

    products
        .into_iter()
        .filter(|p| {
            if !stores.is_empty() && !p.store_id.is_some_and(|id| stores.contains(&id)) {
                return false;
            }

            let cats = categories_of(p);

            if !query.is_empty() {
                let hit = p.name.to_lowercase().contains(&query)
                    || p.store_name.to_lowercase().contains(&query)
                    || cats.iter().any(|c| c.contains(&query));
                if !hit {
                    return false;
                }
            }

            if !categories.is_empty() {
                if !cats.iter().any(|c| categories.contains(c)) {
                    return false;
                }
            } else if let Some(chip) = &chip {
                if !cats.contains(chip) {
                    return false;
                }
            }

            if !genders.is_empty() {
                let gender = p.gender.as_deref().unwrap_or_default().trim().to_lowercase();
                if gender.is_empty() || !genders.contains(&gender) {
                    return false;
                }
            }

            if !sizes.is_empty() && !sizes_of(p).iter().any(|s| sizes.contains(s)) {
                return false;
            }

            true
        })
        .collect()
}
