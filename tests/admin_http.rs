mod support;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use toggleboard::application::resolver::CacheTier;
use toggleboard::domain::types::ValueType;
use toggleboard::infra::http::{ACTOR_HEADER, build_admin_router};
use tower::ServiceExt;
use uuid::Uuid;

use support::Harness;

struct AdminClient {
    app: Router,
    actor: Uuid,
}

impl AdminClient {
    fn new(harness: &Harness) -> Self {
        Self {
            app: build_admin_router(harness.admin_state()),
            actor: Uuid::new_v4(),
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACTOR_HEADER, self.actor.to_string());
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        split(response).await
    }
}

async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, body)
}

#[tokio::test]
async fn requests_without_author_are_rejected() {
    let harness = Harness::new();
    let app = build_admin_router(harness.admin_state());

    for header in [None, Some("not-a-uuid")] {
        let mut builder = Request::builder().uri("/api/toggles");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let request = builder.body(Body::empty()).expect("request should build");
        let (status, body) = split(app.clone().oneshot(request).await.expect("respond")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], json!("unauthorized"));
    }
}

#[tokio::test]
async fn unknown_routes_are_not_found_without_auth() {
    let harness = Harness::new();
    let app = build_admin_router(harness.admin_state());

    let request = Request::builder()
        .uri("/api/nowhere")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("respond");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_toggle_then_read_it_publicly() {
    let harness = Harness::new();
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(
            Method::POST,
            "/api/toggles",
            Some(json!({"key": "dark-mode", "name": "Dark mode", "value": true, "type": "BOOLEAN"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["key"], json!("dark-mode"));
    assert_eq!(body["value"], json!("true"));
    assert_eq!(body["isActive"], json!(true));
    assert_eq!(body["createdBy"], json!(client.actor.to_string()));

    let resolution = harness.resolver.resolve("dark-mode").await.expect("resolve");
    assert!(resolution.view.is_enabled());
}

#[tokio::test]
async fn create_without_key_generates_one() {
    let harness = Harness::new();
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(
            Method::POST,
            "/api/toggles",
            Some(json!({"name": "New Checkout", "value": "v2"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let key = body["key"].as_str().expect("key");
    assert!(key.starts_with("new-checkout-"), "{key}");
    assert_eq!(body["type"], json!("STRING"));
}

#[tokio::test]
async fn duplicate_key_conflicts() {
    let harness = Harness::new();
    harness
        .repo
        .insert_toggle("dark-mode", "Dark mode", "true", ValueType::Boolean, true);
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(
            Method::POST,
            "/api/toggles",
            Some(json!({"key": "dark-mode", "name": "Again", "value": "false", "type": "BOOLEAN"})),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("duplicate"));
}

#[tokio::test]
async fn invalid_value_names_the_field() {
    let harness = Harness::new();
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(
            Method::POST,
            "/api/toggles",
            Some(json!({"name": "Limit", "value": "lots", "type": "NUMBER"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_input"));
    assert_eq!(body["error"]["field"], json!("value"));
}

#[tokio::test]
async fn toggle_lifecycle_reconciles_the_caches() {
    let harness = Harness::new();
    let toggle = harness
        .repo
        .insert_toggle("banner", "Banner", "hello", ValueType::String, true);
    let client = AdminClient::new(&harness);
    let uri = format!("/api/toggles/{}", toggle.id);

    harness.resolver.resolve("banner").await.expect("warm");

    let (status, body) = client
        .call(
            Method::PUT,
            &uri,
            Some(json!({"name": "Banner", "value": "updated", "type": "STRING"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!("updated"));
    let after_update = harness.resolver.resolve("banner").await.expect("resolve");
    assert_eq!(after_update.tier, CacheTier::Edge);

    let (status, body) = client
        .call(Method::PATCH, &uri, Some(json!({"isActive": false})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], json!(false));
    let after_patch = harness.resolver.resolve("banner").await.expect("resolve");
    assert!(!after_patch.view.is_enabled());

    let (status, _) = client.call(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = client.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn listing_is_paginated() {
    let harness = Harness::new();
    for key in ["a-one", "a-two", "a-three"] {
        harness
            .repo
            .insert_toggle(key, key, "x", ValueType::String, true);
    }
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(Method::GET, "/api/toggles?page=2&limit=2", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["toggles"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        body["pagination"],
        json!({"page": 2, "limit": 2, "total": 3, "totalPages": 2})
    );
}

#[tokio::test]
async fn rollout_crud_and_impact() {
    let harness = Harness::new();
    let toggle = harness
        .repo
        .insert_toggle("search-v2", "Search v2", "true", ValueType::Boolean, true);
    let client = AdminClient::new(&harness);

    let (status, created) = client
        .call(
            Method::POST,
            "/api/rollouts",
            Some(json!({"toggleId": toggle.id, "strategy": "PERCENTAGE", "percentage": 25})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["percentage"], json!(25));
    assert_eq!(created["strategyLabel"], json!("Percentage-based"));
    assert_eq!(created["statusText"], json!("25% Rollout"));
    assert_eq!(created["nextStep"], json!(50));
    assert_eq!(created["previousStep"], json!(10));
    let id = created["id"].as_str().expect("id").to_string();

    let (status, body) = client
        .call(
            Method::PATCH,
            &format!("/api/rollouts/{id}/percentage"),
            Some(json!({"percentage": 75})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusColor"], json!("green"));

    let (status, body) = client
        .call(
            Method::GET,
            &format!("/api/rollouts/{id}/impact?totalUsers=1000"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affectedUsers"], json!(750));

    let (status, body) = client
        .call(Method::GET, &format!("/api/rollouts/{id}/impact"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));

    let (status, body) = client
        .call(
            Method::GET,
            &format!("/api/toggles/{}/rollouts", toggle.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = client
        .call(Method::DELETE, &format!("/api/rollouts/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(harness.repo.rollout_count(), 0);
}

#[tokio::test]
async fn rollout_percentage_is_validated() {
    let harness = Harness::new();
    let toggle = harness
        .repo
        .insert_toggle("search-v2", "Search v2", "true", ValueType::Boolean, true);
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(
            Method::POST,
            "/api/rollouts",
            Some(json!({"toggleId": toggle.id, "percentage": 150})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], json!("percentage"));

    let (status, _) = client
        .call(
            Method::POST,
            "/api/rollouts",
            Some(json!({"toggleId": Uuid::new_v4(), "percentage": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn purge_clears_the_memory_tier() {
    let harness = Harness::new();
    harness
        .repo
        .insert_toggle("alpha", "Alpha", "a", ValueType::String, true);
    harness
        .repo
        .insert_toggle("beta", "Beta", "b", ValueType::String, true);
    harness.resolver.resolve("alpha").await.expect("warm");
    harness.resolver.resolve("beta").await.expect("warm");
    let client = AdminClient::new(&harness);

    let (status, body) = client
        .call(Method::POST, "/api/cache/purge", Some(json!({"keys": ["alpha"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"purged": 1, "scope": "keys"}));
    assert_eq!(harness.memory.len(), 1);

    let (status, body) = client.call(Method::POST, "/api/cache/purge", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"purged": 1, "scope": "all"}));
    assert!(harness.memory.is_empty());

    let after = harness.resolver.resolve("alpha").await.expect("resolve");
    assert_eq!(after.tier, CacheTier::Edge);
}

#[tokio::test]
async fn admin_health_does_not_require_author() {
    let harness = Harness::new();
    let app = build_admin_router(harness.admin_state());

    let request = Request::builder()
        .uri("/_health/db")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
