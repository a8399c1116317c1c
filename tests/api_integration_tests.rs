//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shelter_query::{api::create_router, store::MemoryStore, AppState, Config};
use tower::ServiceExt;

// == Helper Functions ==

fn seeded_state() -> AppState {
    let records = [
        ("Dog", "Beagle", "Neutered Male", 10),
        ("Dog", "Beagle", "Spayed Female", 30),
        ("Dog", "Boxer", "Intact Male", 60),
        ("Cat", "Siamese", "Spayed Female", 600),
    ]
    .into_iter()
    .map(|(animal_type, breed, sex, age)| {
        json!({
            "animal_type": animal_type,
            "breed": breed,
            "sex_upon_outcome": sex,
            "age_upon_outcome_in_weeks": age,
            "name": "unlisted",
        })
        .as_object()
        .cloned()
        .unwrap()
    });
    let store = MemoryStore::from_documents(records).unwrap();
    AppState::from_config(Arc::new(store), &Config::default())
}

fn create_test_app() -> Router {
    create_router(seeded_state())
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == Page Endpoint Tests ==

#[tokio::test]
async fn test_page_endpoint_walks_all_rows() {
    let app = create_test_app();

    let (status, first) = send(&app, json_request("POST", "/animals/page", json!({ "page_size": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["count"], 3);
    let cursor = first["next_cursor"].as_str().unwrap().to_string();

    let (_, second) = send(
        &app,
        json_request("POST", "/animals/page", json!({ "page_size": 3, "cursor": cursor })),
    )
    .await;
    assert_eq!(second["count"], 1);
    assert_eq!(second["rows"][0]["breed"], "Siamese");

    let cursor = second["next_cursor"].as_str().unwrap().to_string();
    let (_, third) = send(
        &app,
        json_request("POST", "/animals/page", json!({ "page_size": 3, "cursor": cursor })),
    )
    .await;
    assert_eq!(third["count"], 0);
    assert!(third["next_cursor"].is_null());
}

#[tokio::test]
async fn test_page_rows_omit_unprojected_fields() {
    let app = create_test_app();

    let (_, page) = send(&app, json_request("POST", "/animals/page", json!({}))).await;
    let row = page["rows"][0].as_object().unwrap();
    assert!(row.contains_key("_id"));
    assert!(!row.contains_key("name"));
}

#[tokio::test]
async fn test_page_with_selection() {
    let app = create_test_app();

    let body = json!({
        "selection": { "species": ["Dog"], "sex": ["Spayed Female"], "age_range": [0, 52] }
    });
    let (status, page) = send(&app, json_request("POST", "/animals/page", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["rows"][0]["age_upon_outcome_in_weeks"], 30);
}

#[tokio::test]
async fn test_page_invalid_cursor() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        json_request("POST", "/animals/page", json!({ "cursor": "***" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cursor"));
}

#[tokio::test]
async fn test_page_size_out_of_range() {
    let app = create_test_app();

    let (status, _) = send(&app, json_request("POST", "/animals/page", json!({ "page_size": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == Count Endpoint Tests ==

#[tokio::test]
async fn test_count_ignores_disallowed_keys() {
    let app = create_test_app();

    let body = json!({ "filters": { "animal_type": "Dog", "name": "unlisted", "$where": "1" } });
    let (status, json) = send(&app, json_request("POST", "/animals/count", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
}

#[tokio::test]
async fn test_count_rejects_non_object_filters() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        json_request("POST", "/animals/count", json!({ "filters": "animal_type=Dog" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_unsupported_operators_are_bad_requests() {
    let app = create_test_app();

    let cases = [
        ("/animals/count", json!({ "filters": { "breed": { "$regex": "^B" } } })),
        ("/animals/page", json!({ "filters": { "breed": { "$in": "Beagle" } } })),
        ("/metrics/top-breeds", json!({ "filters": { "breed": { "$regex": "^B" } } })),
    ];
    for (uri, body) in cases {
        let (status, json) = send(&app, json_request("POST", uri, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(json["error"].as_str().unwrap().contains("rejected"), "{uri}");
    }
}

// == Metrics Endpoint Tests ==

#[tokio::test]
async fn test_top_breeds_endpoint() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        json_request("POST", "/metrics/top-breeds", json!({ "limit": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["breeds"],
        json!([{ "key": "Beagle", "count": 2 }, { "key": "Boxer", "count": 1 }])
    );
}

#[tokio::test]
async fn test_age_histogram_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, json_request("POST", "/metrics/age-histogram", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let labels: Vec<&str> = json["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bucket| bucket["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["[0,26)", "[26,52)", "[52,78)", "≥520"]);
}

#[tokio::test]
async fn test_age_histogram_rejects_zero_step() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        json_request("POST", "/metrics/age-histogram", json!({ "step": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_age_histogram_rejects_oversized_layout() {
    let app = create_test_app();

    for body in [
        json!({ "step": 1, "max_weeks": u64::MAX }),
        json!({ "step": 1, "max_weeks": 2_000_000 }),
    ] {
        let (status, json) = send(&app, json_request("POST", "/metrics/age-histogram", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("buckets"));
    }

    let (_, stats) = send(&app, get_request("/stats")).await;
    assert_eq!(stats["total_entries"], 0);
}

// == Mutation Endpoint Tests ==

#[tokio::test]
async fn test_create_then_metrics_reflect_it() {
    let app = create_test_app();

    let (_, before) = send(&app, json_request("POST", "/metrics/top-breeds", json!({}))).await;
    assert_eq!(before["breeds"][1]["key"], "Boxer");
    assert_eq!(before["breeds"][1]["count"], 1);

    let (status, created) = send(
        &app,
        json_request(
            "POST",
            "/animals",
            json!({ "document": { "animal_type": "Dog", "breed": "Boxer" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["inserted_id"], 5);
    assert_eq!(created["status"], "success");

    let (_, after) = send(&app, json_request("POST", "/metrics/top-breeds", json!({}))).await;
    let boxer = after["breeds"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["key"] == "Boxer")
        .unwrap();
    assert_eq!(boxer["count"], 2);
}

#[tokio::test]
async fn test_update_and_delete_endpoints() {
    let app = create_test_app();

    let (status, updated) = send(
        &app,
        json_request(
            "PATCH",
            "/animals",
            json!({ "filter": { "breed": "Beagle" }, "changes": { "outcome_type": "Adoption" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["matched"], 2);
    assert_eq!(updated["modified"], 2);

    let (status, deleted) = send(
        &app,
        json_request("DELETE", "/animals", json!({ "filter": { "animal_type": "Cat" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted_count"], 1);

    let (_, count) = send(&app, json_request("POST", "/animals/count", json!({}))).await;
    assert_eq!(count["total"], 3);
}

#[tokio::test]
async fn test_create_duplicate_id_conflicts() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        json_request("POST", "/animals", json!({ "document": { "_id": 1, "breed": "Pug" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_stats_and_invalidate() {
    let app = create_test_app();

    send(&app, json_request("POST", "/metrics/top-breeds", json!({}))).await;
    send(&app, json_request("POST", "/metrics/top-breeds", json!({}))).await;

    let (status, stats) = send(&app, get_request("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["total_entries"], 1);

    let (status, cleared) = send(&app, json_request("POST", "/cache/invalidate", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["cleared"], 1);

    let (_, stats) = send(&app, get_request("/stats")).await;
    assert_eq!(stats["total_entries"], 0);
    assert_eq!(stats["invalidations"], 1);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store_reachable"], true);
    assert!(json.get("timestamp").is_some());
}
