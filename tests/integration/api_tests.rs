//! API integration tests, driving the router over an in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_catalog::{
    api,
    config::{AppConfig, BootstrapAdmin, StoreBackend},
    repository::MemoryStore,
    services::{auth::PermissionSetAuthorizer, clock::ManualClock, Services},
    AppState,
};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
}

async fn spawn_app() -> TestApp {
    let mut config = AppConfig::default();
    config.database.backend = StoreBackend::Memory;
    config.auth.jwt_secret = "integration-secret".to_string();
    config.auth.bootstrap_admin = Some(BootstrapAdmin {
        username: "admin".to_string(),
        password: "admin".to_string(),
    });

    let services = Services::new(
        Arc::new(MemoryStore::new()),
        Arc::new(PermissionSetAuthorizer),
        config.auth.clone(),
    );
    services.auth.ensure_bootstrap_admin().await.unwrap();

    let clock = Arc::new(ManualClock::new(start_date()));
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        clock: clock.clone(),
    };

    TestApp {
        router: api::create_router(state),
        clock,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(format!("/api/v1{}", uri));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_borrower(&self, admin: &str, username: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/users",
                Some(admin),
                Some(json!({ "username": username, "password": "reader-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    /// A book with `copies` available copies; returns the copy ids
    async fn stock_book(&self, admin: &str, copies: usize) -> Vec<String> {
        let (status, book) = self
            .send(
                Method::POST,
                "/books",
                Some(admin),
                Some(json!({
                    "title": "The Left Hand of Darkness",
                    "summary": "",
                    "isbn": "9780441478125",
                    "author_id": null,
                    "language_id": null
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{book}");
        let book_id = book["id"].as_i64().unwrap();

        let mut ids = Vec::new();
        for n in 0..copies {
            let (status, copy) = self
                .send(
                    Method::POST,
                    &format!("/books/{}/instances", book_id),
                    Some(admin),
                    Some(json!({ "imprint": format!("Ace, printing {}", n + 1) })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{copy}");
            assert_eq!(copy["status"], "maintenance");
            let id = copy["id"].as_str().unwrap().to_string();

            let (status, copy) = self
                .send(
                    Method::PUT,
                    &format!("/instances/{}/status", id),
                    Some(admin),
                    Some(json!({ "status": "available" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{copy}");
            ids.push(id);
        }
        ids
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "not_authenticated");
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = spawn_app().await;

    let (status, _) = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login("admin", "admin").await;
    let (status, body) = app.send(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_summary_counts_visits_in_cookie() {
    let app = spawn_app().await;

    let request = Request::builder()
        .uri("/api/v1/catalog/summary")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("num_visits=1"), "{set_cookie}");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["num_visits"], 0);

    let request = Request::builder()
        .uri("/api/v1/catalog/summary")
        .header(header::COOKIE, "num_visits=1")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("num_visits=2"), "{set_cookie}");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["num_visits"], 1);
}

#[tokio::test]
async fn test_visit_counter_saturates() {
    let app = spawn_app().await;

    let request = Request::builder()
        .uri("/api/v1/catalog/summary")
        .header(header::COOKIE, format!("num_visits={}", u64::MAX))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with(&format!("num_visits={};", u64::MAX)), "{set_cookie}");
}

#[tokio::test]
async fn test_public_book_view_hides_borrower() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    let reader_id = app.create_borrower(&admin, "reader").await;
    let copies = app.stock_book(&admin, 1).await;

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/instances/{}/checkout", copies[0]),
            Some(&admin),
            Some(json!({ "borrower": reader_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, copy) = app
        .send(Method::GET, &format!("/instances/{}", copies[0]), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(copy["status"], "on_loan");
    assert_eq!(copy["due_back"], json!(start_date() + Duration::days(14)));
    assert!(copy.get("borrower").is_none());

    let book_id = copy["book_id"].as_i64().unwrap();
    let (status, book) = app
        .send(Method::GET, &format!("/books/{}", book_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed = &book["instances"][0];
    assert_eq!(listed["status"], "on_loan");
    assert!(listed.get("borrower").is_none());
}

#[tokio::test]
async fn test_user_creation_cannot_grant_more_than_creator_holds() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/users",
            Some(&admin),
            Some(json!({
                "username": "clerk",
                "password": "clerk-pass",
                "permissions": ["add_user"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let clerk = app.login("clerk", "clerk-pass").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(&clerk),
            Some(json!({
                "username": "sneaky",
                "password": "sneaky-pass",
                "permissions": ["add_user", "can_mark_returned"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = app
        .send(
            Method::POST,
            "/users",
            Some(&clerk),
            Some(json!({ "username": "reader", "password": "reader-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_checkout_then_overdue() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    let reader_id = app.create_borrower(&admin, "reader").await;
    let copies = app.stock_book(&admin, 2).await;

    let (_, summary) = app.send(Method::GET, "/catalog/summary", None, None).await;
    assert_eq!(summary["num_instances_available"], 2);

    let due = start_date() + Duration::days(5);
    let (status, copy) = app
        .send(
            Method::POST,
            &format!("/instances/{}/checkout", copies[0]),
            Some(&admin),
            Some(json!({ "borrower": reader_id, "due_back": due })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{copy}");
    assert_eq!(copy["status"], "on_loan");
    assert_eq!(copy["borrower"], reader_id);

    let (_, summary) = app.send(Method::GET, "/catalog/summary", None, None).await;
    assert_eq!(summary["num_instances_available"], 1);

    let reader = app.login("reader", "reader-pass").await;
    let (status, loans) = app.send(Method::GET, "/loans/mine", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans["total"], 1);
    assert_eq!(loans["items"][0]["id"], copies[0].as_str());
    assert_eq!(loans["items"][0]["is_overdue"], false);
    assert_eq!(loans["items"][0]["book_title"], "The Left Hand of Darkness");

    app.clock.advance(Duration::days(6));
    let (_, loans) = app.send(Method::GET, "/loans/mine", Some(&reader), None).await;
    assert_eq!(loans["items"][0]["is_overdue"], true);

    let (status, copy) = app
        .send(Method::POST, &format!("/instances/{}/return", copies[0]), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(copy["status"], "available");
    assert!(copy.get("borrower").is_none());
}

#[tokio::test]
async fn test_renewal_window_enforced() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    let reader_id = app.create_borrower(&admin, "reader").await;
    let copies = app.stock_book(&admin, 1).await;
    let id = &copies[0];

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/instances/{}/checkout", id),
            Some(&admin),
            Some(json!({ "borrower": reader_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, proposal) = app
        .send(Method::GET, &format!("/instances/{}/renew", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let proposed = start_date() + Duration::days(14);
    assert_eq!(proposal["proposed_due_back"], proposed.to_string());

    let past = start_date() - Duration::days(1);
    let (status, error) = app
        .send(
            Method::POST,
            &format!("/instances/{}/renew", id),
            Some(&admin),
            Some(json!({ "due_back": past })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "past_date");
    assert_eq!(error["field"], "due_back");
    assert_eq!(error["message"], "Invalid date - renewal in past");

    let too_far = start_date() + Duration::days(22);
    let (status, error) = app
        .send(
            Method::POST,
            &format!("/instances/{}/renew", id),
            Some(&admin),
            Some(json!({ "due_back": too_far })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "too_far_ahead");

    let last_day = start_date() + Duration::days(21);
    let (status, copy) = app
        .send(
            Method::POST,
            &format!("/instances/{}/renew", id),
            Some(&admin),
            Some(json!({ "due_back": last_day })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(copy["due_back"], last_day.to_string());
    assert_eq!(copy["borrower"], reader_id);
}

#[tokio::test]
async fn test_stale_version_conflicts() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    let reader_id = app.create_borrower(&admin, "reader").await;
    let copies = app.stock_book(&admin, 1).await;
    let id = &copies[0];

    let (_, copy) = app
        .send(
            Method::POST,
            &format!("/instances/{}/checkout", id),
            Some(&admin),
            Some(json!({ "borrower": reader_id })),
        )
        .await;
    let seen = copy["version"].as_i64().unwrap();
    let due = start_date() + Duration::days(10);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/instances/{}/renew", id),
            Some(&admin),
            Some(json!({ "due_back": due, "version": seen })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = app
        .send(
            Method::POST,
            &format!("/instances/{}/renew", id),
            Some(&admin),
            Some(json!({ "due_back": due, "version": seen })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "conflict");
}

#[tokio::test]
async fn test_borrower_cannot_manage_loans() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    app.create_borrower(&admin, "reader").await;
    let copies = app.stock_book(&admin, 1).await;
    let reader = app.login("reader", "reader-pass").await;

    let (status, error) = app.send(Method::GET, "/loans", Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], "permission_denied");

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/instances/{}/status", copies[0]),
            Some(&reader),
            Some(json!({ "status": "maintenance" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, loans) = app.send(Method::GET, "/loans", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans["total"], 0);
}

#[tokio::test]
async fn test_illegal_transition_rejected() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    let copies = app.stock_book(&admin, 1).await;
    let id = &copies[0];

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/instances/{}/status", id),
            Some(&admin),
            Some(json!({ "status": "maintenance" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = app
        .send(
            Method::PUT,
            &format!("/instances/{}/status", id),
            Some(&admin),
            Some(json!({ "status": "reserved" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "illegal_transition");
}

#[tokio::test]
async fn test_book_listing_pages_and_search() {
    let app = spawn_app().await;
    let admin = app.login("admin", "admin").await;
    for title in ["Dune", "Dune Messiah", "Children of Dune", "Emma"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/books",
                Some(&admin),
                Some(json!({ "title": title, "summary": "", "isbn": "9780000000001" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = app.send(Method::GET, "/books", None, None).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 3);
    assert_eq!(page["num_pages"], 2);

    let (_, page) = app.send(Method::GET, "/books?title=dune", None, None).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["has_next"], false);

    let (status, _) = app.send(Method::GET, "/books?page=3", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
