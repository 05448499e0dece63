use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::models::{
    CatalogProduct, DedupedProduct, EffectivePreferences, LegacyPreferences, VersionedPreferences,
    ViewCounts,
};
use crate::services::{FilterCriteria, LoadOutcome};

use super::AppState;

// Request/Response types

/// Feed filters as query parameters; list values are comma-separated
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub q: Option<String>,
    pub chip: Option<String>,
    pub categories: Option<String>,
    pub genders: Option<String>,
    pub sizes: Option<String>,
    pub store_ids: Option<String>,
}

impl FeedQuery {
    pub fn into_criteria(self) -> AppResult<FilterCriteria> {
        let nearest_store_ids = split_list(self.store_ids)
            .iter()
            .map(|id| {
                id.parse::<i64>()
                    .map_err(|_| AppError::InvalidInput(format!("Invalid store id: {}", id)))
            })
            .collect::<AppResult<Vec<i64>>>()?;

        Ok(FilterCriteria {
            query: self.q.unwrap_or_default(),
            chip_category: self.chip,
            categories: split_list(self.categories),
            genders: split_list(self.genders),
            sizes: split_list(self.sizes),
            nearest_store_ids,
        })
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<DedupedProduct>,
    pub explore: bool,
    pub has_more: bool,
    pub loaded: usize,
    /// Last catalog load failure, if the most recent load failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoadMoreResponse {
    pub loaded: bool,
    pub added: usize,
    pub has_more: bool,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct GenderChipRequest {
    pub gender: String,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub legacy: LegacyPreferences,
    pub versioned: VersionedPreferences,
    pub effective: EffectivePreferences,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ranked feed over every product loaded so far.
/// Loads the first catalog page when nothing has been loaded yet; a failed
/// load still serves whatever is buffered and reports the error.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
) -> AppResult<Json<FeedResponse>> {
    let criteria = params.into_criteria()?;

    if let Err(e) = state.catalog.ensure_loaded().await {
        tracing::warn!(error = %e, "Serving feed without a fresh catalog page");
    }
    let error = state.catalog.last_error().await;
    let products = state.catalog.items().await;
    let loaded = products.len();
    let has_more = state.catalog.has_more().await;

    let pass = state.session.lock().await.render(products, &criteria);

    Ok(Json(FeedResponse {
        items: pass.items,
        explore: pass.explore,
        has_more,
        loaded,
        error,
    }))
}

/// Appends the next catalog page
pub async fn load_more(State(state): State<AppState>) -> AppResult<Json<LoadMoreResponse>> {
    let (loaded, added) = match state.catalog.load_more().await? {
        LoadOutcome::Loaded { added } => (true, added),
        LoadOutcome::Skipped => (false, 0),
    };

    Ok(Json(LoadMoreResponse {
        loaded,
        added,
        has_more: state.catalog.has_more().await,
        total: state.catalog.items().await.len(),
    }))
}

/// Drops every loaded page
pub async fn reset_feed(State(state): State<AppState>) -> StatusCode {
    state.catalog.reset().await;
    StatusCode::OK
}

/// A product card was opened
pub async fn record_tap(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(product): Json<CatalogProduct>,
) -> StatusCode {
    tracing::info!(request_id = %request_id, product_id = product.id, "Tap received");
    state.session.lock().await.record_tap(&product);
    StatusCode::OK
}

/// The filter sheet was confirmed
pub async fn record_filters(
    State(state): State<AppState>,
    Json(criteria): Json<FilterCriteria>,
) -> StatusCode {
    state.session.lock().await.record_filters_applied(&criteria);
    StatusCode::OK
}

/// A gender chip was toggled on
pub async fn record_gender_chip(
    State(state): State<AppState>,
    Json(request): Json<GenderChipRequest>,
) -> AppResult<StatusCode> {
    if request.gender.trim().is_empty() {
        return Err(AppError::InvalidInput("Gender cannot be empty".to_string()));
    }
    state.session.lock().await.record_gender_chip(&request.gender);
    Ok(StatusCode::OK)
}

/// A product page was opened
pub async fn record_view(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Json<Value> {
    let mut session = state.session.lock().await;
    session.record_product_view(product_id);
    let views = session.views().get(&product_id.to_string()).copied().unwrap_or(0);
    Json(json!({ "product_id": product_id, "views": views }))
}

/// Local view counters
pub async fn get_views(State(state): State<AppState>) -> Json<ViewCounts> {
    let mut session = state.session.lock().await;
    Json(session.sync_views().clone())
}

/// Both stored schema generations and their reconciled view
pub async fn get_preferences(State(state): State<AppState>) -> Json<PreferencesResponse> {
    let mut session = state.session.lock().await;
    session.sync_remote();
    let prefs = session.preferences();

    Json(PreferencesResponse {
        legacy: prefs.read_legacy().clone(),
        versioned: prefs.read_versioned().clone(),
        effective: prefs.read_effective(),
    })
}
