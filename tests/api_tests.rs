use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};

use look_feed::api::{create_router, AppState};
use look_feed::config::Config;
use look_feed::error::{AppError, AppResult};
use look_feed::models::{CatalogPage, CatalogProduct};
use look_feed::services::{CatalogSource, FeedSession, InfiniteCatalog, StaticCatalogSource};
use look_feed::storage::MemoryStorage;

fn product(id: i64, name: &str, store: &str, category: &str, price: f64) -> CatalogProduct {
    let mut p = CatalogProduct::new(id, name, store);
    p.category = Some(category.to_string());
    p.price_tag = Some(price);
    p.store_id = Some(id % 3);
    p
}

fn catalog() -> Vec<CatalogProduct> {
    vec![
        product(1, "Camisa Linho", "Loja A", "Camisas", 120.0),
        product(2, "Saia Midi", "Loja B", "Saias", 90.0),
        product(3, "Camisa Linho", "Loja C", "Camisas", 110.0),
        product(4, "Bolsa Couro", "Loja A", "Acessorios", 300.0),
        product(5, "Vestido", "Loja B", "Vestidos", 200.0),
    ]
}

/// Catalog backend that is always down
struct UnreachableCatalog;

#[async_trait::async_trait]
impl CatalogSource for UnreachableCatalog {
    async fn fetch_page(&self, _offset: usize, _limit: usize) -> AppResult<CatalogPage> {
        Err(AppError::ExternalApi("catalog unreachable".to_string()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

fn create_test_server_from(
    storage: MemoryStorage,
    source: Arc<dyn CatalogSource>,
    page_size: usize,
) -> TestServer {
    let config = Config {
        explore_epsilon: 0.0,
        jitter: 0.0,
        ..Config::default()
    };
    let session = FeedSession::with_rng(Arc::new(storage), &config, StdRng::seed_from_u64(1));
    let state = AppState::new(session, InfiniteCatalog::new(source, page_size));
    TestServer::new(create_router(state)).unwrap()
}

fn create_test_server_with(storage: MemoryStorage, page_size: usize) -> TestServer {
    let source = StaticCatalogSource::new(catalog());
    create_test_server_from(storage, Arc::new(source), page_size)
}

fn create_test_server() -> TestServer {
    create_test_server_with(MemoryStorage::new(), 10)
}

fn ids(feed: &Value) -> Vec<i64> {
    feed["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let response = server
        .get("/health")
        .add_header(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_static("abc-123"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "abc-123");
}

#[tokio::test]
async fn test_feed_loads_first_page_and_dedupes() {
    let server = create_test_server();

    let response = server.get("/api/v1/feed").await;
    response.assert_status_ok();
    let feed: Value = response.json();

    assert_eq!(feed["loaded"], 5);
    assert_eq!(feed["has_more"], false);
    assert_eq!(feed["explore"], false);
    assert_eq!(ids(&feed).len(), 4);

    let shirt = feed["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["name"] == "Camisa Linho")
        .unwrap();
    assert_eq!(shirt["id"], 3);
    assert_eq!(shirt["store_count"], 2);
    assert_eq!(shirt["stores"], json!(["Loja A", "Loja C"]));
}

#[tokio::test]
async fn test_feed_filters_from_query() {
    let server = create_test_server();

    let response = server
        .get("/api/v1/feed")
        .add_query_param("categories", "Saias,Vestidos")
        .await;
    response.assert_status_ok();
    let mut found = ids(&response.json::<Value>());
    found.sort();
    assert_eq!(found, vec![2, 5]);

    let response = server.get("/api/v1/feed").add_query_param("q", "couro").await;
    assert_eq!(ids(&response.json::<Value>()), vec![4]);
}

#[tokio::test]
async fn test_feed_rejects_bad_store_ids() {
    let server = create_test_server();
    let response = server.get("/api/v1/feed").add_query_param("store_ids", "x").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_load_more_pages_through_catalog() {
    let server = create_test_server_with(MemoryStorage::new(), 2);

    let feed: Value = server.get("/api/v1/feed").await.json();
    assert_eq!(feed["loaded"], 2);
    assert_eq!(feed["has_more"], true);

    let more: Value = server.post("/api/v1/feed/more").await.json();
    assert_eq!(more["loaded"], true);
    assert_eq!(more["added"], 2);
    assert_eq!(more["total"], 4);

    let more: Value = server.post("/api/v1/feed/more").await.json();
    assert_eq!(more["total"], 5);
    assert_eq!(more["has_more"], false);

    let more: Value = server.post("/api/v1/feed/more").await.json();
    assert_eq!(more["loaded"], false);

    server.post("/api/v1/feed/reset").await.assert_status_ok();
    let feed: Value = server.get("/api/v1/feed").await.json();
    assert_eq!(feed["loaded"], 2);
}

#[tokio::test]
async fn test_tap_moves_product_to_top() {
    let server = create_test_server();

    server
        .post("/api/v1/interactions/tap")
        .json(&json!({
            "id": 4,
            "name": "Bolsa Couro",
            "store_name": "Loja A",
            "category": "Acessorios",
            "price_tag": "300"
        }))
        .await
        .assert_status_ok();

    let feed: Value = server.get("/api/v1/feed").await.json();
    assert_eq!(ids(&feed)[0], 4);

    let prefs: Value = server.get("/api/v1/preferences").await.json();
    assert_eq!(prefs["effective"]["cat"]["acessorios"], 1.2);
    assert_eq!(prefs["versioned"]["store"]["loja a"]["w"], 1.0);
    assert_eq!(prefs["effective"]["price"]["200-399"], 0.6);

    let views: Value = server.get("/api/v1/views").await.json();
    assert_eq!(views["4"], 1);
}

#[tokio::test]
async fn test_filters_and_gender_chip_are_recorded() {
    let server = create_test_server();

    server
        .post("/api/v1/interactions/filters")
        .json(&json!({ "categories": ["Saias"], "sizes": ["M"] }))
        .await
        .assert_status_ok();
    server
        .post("/api/v1/interactions/gender")
        .json(&json!({ "gender": "female" }))
        .await
        .assert_status_ok();
    server
        .post("/api/v1/interactions/gender")
        .json(&json!({ "gender": "  " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let prefs: Value = server.get("/api/v1/preferences").await.json();
    assert_eq!(prefs["effective"]["cat"]["saias"], 0.5);
    assert_eq!(prefs["effective"]["size"]["m"], 0.3);
    assert_eq!(prefs["effective"]["gender"]["female"], 1.0);
}

#[tokio::test]
async fn test_record_view_counts() {
    let server = create_test_server();

    server.post("/api/v1/views/2").await.assert_status_ok();
    let response = server.post("/api/v1/views/2").await;
    let body: Value = response.json();
    assert_eq!(body["product_id"], 2);
    assert_eq!(body["views"], 2);

    let views: Value = server.get("/api/v1/views").await.json();
    assert_eq!(views, json!({ "2": 2 }));
}

#[tokio::test]
async fn test_legacy_preferences_are_reported() {
    let storage = MemoryStorage::new();
    storage.preload(
        look_feed::storage::StorageKey::LegacyPreferences,
        r#"{"cat":{"Vestidos":3.0}}"#,
    );
    let server = create_test_server_with(storage, 10);

    let prefs: Value = server.get("/api/v1/preferences").await.json();
    assert_eq!(prefs["legacy"]["cat"]["vestidos"], 3.0);
    assert_eq!(prefs["effective"]["cat"]["vestidos"], 3.0);

    let feed: Value = server.get("/api/v1/feed").await.json();
    assert_eq!(ids(&feed)[0], 5);
}

#[tokio::test]
async fn test_feed_survives_catalog_outage() {
    let server = create_test_server_from(MemoryStorage::new(), Arc::new(UnreachableCatalog), 10);

    let response = server.get("/api/v1/feed").await;
    response.assert_status_ok();
    let feed: Value = response.json();
    assert!(ids(&feed).is_empty());
    assert_eq!(feed["loaded"], 0);
    assert_eq!(feed["has_more"], true);
    assert!(feed["error"].as_str().unwrap().contains("catalog unreachable"));

    server
        .post("/api/v1/feed/more")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
