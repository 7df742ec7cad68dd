use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use citytailor_api::api::{create_router, AppState};
use citytailor_api::db::{MemoryStore, PlaceCatalog, PopularitySignal};
use citytailor_api::models::{ActivityKind, ActivityRecord, Identity, PlaceAggregate};

fn create_test_server(store: MemoryStore) -> TestServer {
    let store = Arc::new(store);
    let state = AppState::new(
        store.clone(),
        store,
        PopularitySignal::disabled(),
        30,
        Duration::from_millis(500),
    );
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

async fn seed_catalog(store: &MemoryStore, count: usize, cities: &[&str]) {
    for i in 0..count {
        let city = cities[i % cities.len()];
        let mut place = PlaceAggregate::new(
            format!("p{i}"),
            format!("Place {i}"),
            city.to_string(),
            Utc::now(),
        );
        place.trending_score = (count - i) as i64 * 3;
        place.popularity_score = (count - i) as i64 * 2;
        store.seed_place(place).await;
    }
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(MemoryStore::new());
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_empty_catalog_returns_no_data() {
    let server = create_test_server(MemoryStore::new());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "identity": { "session_id": "s1" } }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["recommendation_type"], "no_data");
    assert_eq!(body["main_recommendations"].as_array().unwrap().len(), 0);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_new_session_gets_diverse_discovery() {
    // 20 places across 8 cities, fresh session, limit 8
    let store = MemoryStore::new();
    let cities = ["Paris", "Rome", "Tokyo", "Lima", "Oslo", "Cairo", "Porto", "Quito"];
    seed_catalog(&store, 20, &cities).await;
    let server = create_test_server(store);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "identity": { "session_id": "fresh" }, "limit": 8 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let recommendations = body["main_recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 8);

    let mut seen_cities = std::collections::HashSet::new();
    for rec in recommendations {
        let source = rec["recommendation_source"].as_str().unwrap();
        assert!(
            source == "discovery" || source == "trending",
            "unexpected source {source}"
        );
        assert!(seen_cities.insert(rec["city"].as_str().unwrap().to_string()));
        let rating = rec["rating"].as_f64().unwrap();
        assert!((3.0..=5.0).contains(&rating));
        assert_eq!(rec["category"], "Experience");
    }
}

#[tokio::test]
async fn test_tracked_search_drives_next_recommendation() {
    let store = MemoryStore::new();
    seed_catalog(&store, 12, &["Paris", "Rome", "Tokyo", "Lima"]).await;
    let server = create_test_server(store);

    let response = server
        .post("/api/v1/track/search")
        .json(&json!({
            "identity": { "session_id": "s1" },
            "city": "Paris",
            "categories": ["Cultural"],
            "duration": "2-4h"
        }))
        .await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["tracked"], true);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "identity": { "session_id": "s1" }, "limit": 5 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    let first = &body["main_recommendations"][0];
    assert_eq!(first["recommendation_source"], "search_context");
    assert_eq!(first["city"], "Paris");
    assert_eq!(body["recommendation_type"], "context_aware_session");
}

#[tokio::test]
async fn test_established_user_insights_order_cities() {
    // 60% Rome / 40% Tokyo history
    let store = MemoryStore::new();
    seed_catalog(&store, 16, &["Rome", "Tokyo", "Paris", "Lima"]).await;

    let user_id = Uuid::new_v4();
    store.register_user(user_id).await;
    let identity = Identity::User {
        user_id,
        session_id: None,
    };
    for i in 0..20 {
        let city = if i < 12 { "Rome" } else { "Tokyo" };
        store
            .seed_activity(ActivityRecord::new(&identity, ActivityKind::View, Utc::now()).with_city(city))
            .await;
    }

    let server = create_test_server(store);
    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "identity": { "user_id": user_id }, "limit": 8 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    let favorites = body["user_insights"]["favorite_cities"].as_array().unwrap();
    assert_eq!(favorites[0]["name"], "Rome");
    assert_eq!(favorites[0]["score"], 100.0);
    assert_eq!(favorites[1]["name"], "Tokyo");
    assert_eq!(favorites[1]["score"], 67.0);
    assert_eq!(body["recommendation_type"], "personalized");
    assert_ne!(body["personalization_level"], "new");
}

#[tokio::test]
async fn test_track_interaction_updates_catalog() {
    let store = MemoryStore::new();
    let server = create_test_server(store.clone());

    let response = server
        .post("/api/v1/track/interaction")
        .json(&json!({
            "identity": { "session_id": "s1" },
            "kind": "favorite",
            "place_name": "Hidden Garden",
            "city": "Kyoto"
        }))
        .await;
    response.assert_status_ok();

    // Aggregate created with one favorite, popularity 15
    let place = store.find("hidden-garden-kyoto").await.unwrap().unwrap();
    assert_eq!(place.total_favorites, 1);
    assert_eq!(place.popularity_score, 15);
}

#[tokio::test]
async fn test_recommendations_require_an_identity() {
    let server = create_test_server(MemoryStore::new());
    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "limit": 5 }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_names_never_repeat_in_output() {
    // Two cities, each with one place carrying the same name
    let store = MemoryStore::new();
    for (id, city) in [("a", "Paris"), ("b", "Rome")] {
        let mut place = PlaceAggregate::new(
            id.to_string(),
            "Grand Museum".to_string(),
            city.to_string(),
            Utc::now(),
        );
        place.trending_score = 10;
        store.seed_place(place).await;
    }
    let server = create_test_server(store);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "identity": { "session_id": "s1" }, "limit": 8 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let names: Vec<&str> = body["main_recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 1);
}
