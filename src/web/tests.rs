use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use super::{AppState, create_axum_router, create_static_file_service};
use crate::db::test_support::setup_db;
use crate::server::config::ServerConfig;
use crate::services::auth_service;

struct TestApp {
    router: Router,
    _upload_dir: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::new("sqlite::memory:", "test-secret");
    config.bcrypt_cost = 4;
    config.upload_dir = upload_dir.path().to_string_lossy().into_owned();
    config.admin_username = Some("root".to_string());
    config.admin_password = Some("rootpass1".to_string());

    let db = setup_db().await;
    auth_service::seed_admin(&db, &config).await.unwrap();
    let state = Arc::new(AppState::new(db, Arc::new(config)));
    TestApp {
        router: create_axum_router(state),
        _upload_dir: upload_dir,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &TestApp, username: &str) -> (i64, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn create_tag(app: &TestApp, token: &str, name: &str, parents: &[i64]) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/tags",
        Some(token),
        Some(json!({ "name": name, "parent_tags": parents })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create tag failed: {body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app().await;

    let (status, body) = send(&app, "POST", "/api/tags", None, Some(json!({ "name": "rust" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = send(&app, "GET", "/api/auth/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cycle_is_rejected_over_http() {
    let app = test_app().await;
    let (_, token) = register(&app, "alice").await;

    let a = create_tag(&app, &token, "A", &[]).await;
    let b = create_tag(&app, &token, "B", &[a]).await;
    let c = create_tag(&app, &token, "C", &[b]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/tags/validate-relation",
        Some(&token),
        Some(json!({ "parent_tag_id": c, "child_tag_id": a })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/tags/relations",
        Some(&token),
        Some(json!({ "parent_tag_id": c, "child_tag_id": a })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_relation");

    let (status, body) = send(
        &app,
        "POST",
        "/api/tags/relations",
        Some(&token),
        Some(json!({ "parent_tag_id": a, "child_tag_id": c })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "shortcut edge should be allowed: {body}");

    let (status, graph) = send(&app, "GET", "/api/tags/graph", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_public_tag_listing_needs_a_user() {
    let app = test_app().await;
    let (user_id, token) = register(&app, "bob").await;
    let parent = create_tag(&app, &token, "systems", &[]).await;
    create_tag(&app, &token, "rust", &[parent]).await;

    let (status, body) = send(&app, "GET", &format!("/api/tags?user_id={user_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", &format!("/api/tags?user_id={user_id}&parent_id={parent}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "rust");

    let (status, body) = send(&app, "GET", "/api/tags", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_article_visibility_follows_status() {
    let app = test_app().await;
    let (user_id, token) = register(&app, "carol").await;
    let tag = create_tag(&app, &token, "notes", &[]).await;

    let (status, draft) = send(
        &app,
        "POST",
        "/api/articles",
        Some(&token),
        Some(json!({ "title": "Draft", "content": {"type": "doc", "content": []}, "tags": [tag] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create article failed: {draft}");
    let article_id = draft["id"].as_i64().unwrap();

    let (status, _) = send(&app, "GET", &format!("/api/articles/{article_id}"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, own) = send(&app, "GET", &format!("/api/articles/{article_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["status"], "draft");

    let (status, published) =
        send(&app, "POST", &format!("/api/articles/{article_id}/publish"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let (status, page) = send(&app, "GET", &format!("/api/articles?user_id={user_id}&tag_id={tag}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["items"][0]["tags"][0]["name"], "notes");
}

#[tokio::test]
async fn test_admin_routes_check_role() {
    let app = test_app().await;
    let (_, user_token) = register(&app, "dave").await;

    let (status, body) = send(&app, "GET", "/api/admin/tags", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/login",
        None,
        Some(json!({ "username": "dave", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "non-admin login: {body}");

    let (status, session) = send(
        &app,
        "POST",
        "/api/admin/login",
        None,
        Some(json!({ "username": "root", "password": "rootpass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let admin_token = session["token"].as_str().unwrap().to_string();

    let (status, view) = send(
        &app,
        "POST",
        "/api/admin/tags",
        Some(&admin_token),
        Some(json!({ "name": "Databases", "description": "Storage engines" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "admin tag: {view}");
    assert_eq!(view["article"]["title"], "Databases");
    assert_eq!(view["article"]["is_tag_article"], true);
}

#[tokio::test]
async fn test_missing_body_fields_are_invalid_input() {
    let app = test_app().await;
    let (_, token) = register(&app, "erin").await;

    let (status, body) = send(&app, "POST", "/api/tags/relations", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "empty relation: {body}");
    assert_eq!(body["kind"], "invalid_input");

    let (status, body) = send(&app, "POST", "/api/tags", Some(&token), Some(json!({ "description": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "nameless tag: {body}");
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_static_fallback_serves_index() {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<p>inkstone</p>").unwrap();
    let service = create_static_file_service(&static_dir.path().to_string_lossy());

    let request = Request::builder().uri("/articles/42").body(Body::empty()).unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<p>inkstone</p>");
}
