//! Implicit feedback recorded from user interactions.

use crate::models::CatalogProduct;
use crate::services::facets::{active_eta_text, eta_bucket, price_bucket, primary_category};
use crate::services::filter::FilterCriteria;
use crate::services::preferences::PreferenceStore;
use crate::services::views::ViewMetrics;

pub const TAP_CATEGORY_WEIGHT: f64 = 1.2;
pub const TAP_STORE_WEIGHT: f64 = 1.0;
pub const TAP_GENDER_WEIGHT: f64 = 0.8;
pub const TAP_PRICE_WEIGHT: f64 = 0.6;
pub const TAP_ETA_WEIGHT: f64 = 0.5;
pub const TAP_PRODUCT_WEIGHT: f64 = 0.25;

pub const FILTER_CATEGORY_WEIGHT: f64 = 0.5;
pub const FILTER_GENDER_WEIGHT: f64 = 0.5;
pub const FILTER_SIZE_WEIGHT: f64 = 0.3;

pub const GENDER_CHIP_WEIGHT: f64 = 1.0;

/// Product card opened from the feed
pub fn record_tap(prefs: &mut PreferenceStore, views: &mut ViewMetrics, product: &CatalogProduct) {
    let category = primary_category(product);
    if !category.is_empty() {
        prefs.bump_category(&category, TAP_CATEGORY_WEIGHT);
    }
    prefs.bump_store(&product.store_name, TAP_STORE_WEIGHT);
    if let Some(gender) = product.gender.as_deref() {
        prefs.bump_gender(gender, TAP_GENDER_WEIGHT);
    }
    prefs.bump_price_bucket(price_bucket(product.price_tag), TAP_PRICE_WEIGHT);
    prefs.bump_eta_bucket(eta_bucket(active_eta_text(product)), TAP_ETA_WEIGHT);
    prefs.bump_product(product.id, TAP_PRODUCT_WEIGHT);
    views.bump_view(product.id);

    tracing::debug!(product_id = product.id, "Tap recorded");
}

/// Filter sheet confirmed
pub fn record_filters_applied(prefs: &mut PreferenceStore, criteria: &FilterCriteria) {
    for category in &criteria.categories {
        prefs.bump_category(category, FILTER_CATEGORY_WEIGHT);
    }
    for gender in &criteria.genders {
        prefs.bump_gender(gender, FILTER_GENDER_WEIGHT);
    }
    for size in &criteria.sizes {
        prefs.bump_size(size, FILTER_SIZE_WEIGHT);
    }
}

pub fn record_gender_chip(prefs: &mut PreferenceStore, gender: &str) {
    prefs.bump_gender(gender, GENDER_CHIP_WEIGHT);
}

pub fn record_product_view(views: &mut ViewMetrics, product_id: i64) {
    views.bump_view(product_id);
}
