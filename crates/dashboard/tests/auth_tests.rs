//! Signup, login and refresh rotation through the router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{TestApp, TestResponse};
use serde_json::{json, Value};

async fn post_public(app: &TestApp, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.send(builder.body(Body::from(body.to_string())).unwrap())
        .await
}

/// `refresh_token=<value>` from the response's `Set-Cookie`.
fn refresh_pair(resp: &TestResponse) -> String {
    let cookie = resp
        .headers
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    cookie.split(';').next().unwrap().to_string()
}

async fn register(app: &TestApp) -> TestResponse {
    post_public(
        app,
        "/auth/register",
        json!({"name": "Grace", "email": "Grace@Agency.io", "password": "correct horse"}),
        None,
    )
    .await
}

#[tokio::test]
async fn test_register_signs_in() {
    let app = TestApp::new().await;
    let resp = register(&app).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert!(refresh_pair(&resp).starts_with("refresh_token="));

    let body = resp.json();
    assert_eq!(body["data"]["user"]["email"], "grace@agency.io");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["data"]["user"].get("password_hash").is_none());

    let token = body["data"]["accessToken"].as_str().unwrap();
    let me = app
        .send(
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["data"]["name"], "Grace");
}

#[tokio::test]
async fn test_register_rejects_duplicate_and_weak_input() {
    let app = TestApp::new().await;
    assert_eq!(register(&app).await.status, StatusCode::CREATED);
    assert_eq!(register(&app).await.status, StatusCode::CONFLICT);

    let weak = post_public(
        &app,
        "/auth/register",
        json!({"name": "Eve", "email": "eve@agency.io", "password": "short"}),
        None,
    )
    .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    register(&app).await;

    let wrong = post_public(
        &app,
        "/auth/login",
        json!({"email": "grace@agency.io", "password": "wrong password"}),
        None,
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = post_public(
        &app,
        "/auth/login",
        json!({"email": "nobody@agency.io", "password": "correct horse"}),
        None,
    )
    .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["message"], unknown.json()["message"]);

    let ok = post_public(
        &app,
        "/auth/login",
        json!({"email": "grace@agency.io", "password": "correct horse"}),
        None,
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_the_session() {
    let app = TestApp::new().await;
    let first = refresh_pair(&register(&app).await);

    let rotated = post_public(&app, "/auth/refresh", json!({}), Some(&first)).await;
    assert_eq!(rotated.status, StatusCode::OK);
    let second = refresh_pair(&rotated);
    assert_ne!(first, second);

    // The spent cookie no longer works.
    let replay = post_public(&app, "/auth/refresh", json!({}), Some(&first)).await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let logout = post_public(&app, "/auth/logout", json!({}), Some(&second)).await;
    assert_eq!(logout.status, StatusCode::OK);
    let after_logout = post_public(&app, "/auth/refresh", json!({}), Some(&second)).await;
    assert_eq!(after_logout.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_database() {
    let app = TestApp::new().await;
    let resp = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}
