use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Feed
        .route("/feed", get(handlers::get_feed))
        .route("/feed/more", post(handlers::load_more))
        .route("/feed/reset", post(handlers::reset_feed))
        // Implicit feedback
        .route("/interactions/tap", post(handlers::record_tap))
        .route("/interactions/filters", post(handlers::record_filters))
        .route("/interactions/gender", post(handlers::record_gender_chip))
        // View counters
        .route("/views", get(handlers::get_views))
        .route("/views/:id", post(handlers::record_view))
        // Preference snapshots
        .route("/preferences", get(handlers::get_preferences))
}
