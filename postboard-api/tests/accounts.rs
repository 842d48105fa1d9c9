mod common;

use axum::http::StatusCode;
use common::TestApp;
use postboard_api::server::ServerSettings;
use postboard_common::util::PositiveDuration;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn register_and_fetch_user() {
    let app = TestApp::new();

    let user = app.register("user1", "hunter2").await;
    assert_eq!(user["id"], 1);
    assert_eq!(user["handle"], "user1");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let (status, fetched) = app.get("/users/1/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, user);

    let (status, _) = app.get("/users/2/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new();
    app.register("user1", "hunter2").await;

    let (status, error) = app
        .post(
            "/users/",
            None,
            json!({ "handle": "user1", "password": "other" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["status"], 409);

    let (status, _) = app
        .post("/users/", None, json!({ "handle": "", "password": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post("/users/", None, json!({ "handle": "user2", "password": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registering_creates_one_profile() {
    let app = TestApp::new();
    let user = app.register("user1", "hunter2").await;

    let (_, profiles) = app.get("/profiles/", None).await;
    assert_eq!(profiles["count"], 1);
    assert_eq!(profiles["results"][0]["owner"], user);
    assert_eq!(profiles["results"][0]["name"], "");
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = TestApp::new();
    app.register("user1", "hunter2").await;

    let (status, issued) = app
        .post(
            "/auth/login/",
            None,
            json!({ "handle": "user1", "password": "hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(issued["user_id"], 1);
    assert!(issued["expires_at"].is_null());
    assert!(issued["token"].as_str().unwrap().starts_with("1:"));

    let (status, _) = app
        .post(
            "/auth/login/",
            None,
            json!({ "handle": "user1", "password": "wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .post(
            "/auth/login/",
            None,
            json!({ "handle": "nobody", "password": "hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new();
    let user = app.user("user1").await;
    let other_session = app.login("user1", "password").await;

    let (status, body) = app
        .post("/auth/logout/", Some(&user.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .post("/posts/", Some(&user.token), json!({ "title": "late" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/posts/", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.create_post(&other_session, "still logged in").await;
}

#[tokio::test]
async fn malformed_tokens_are_bad_requests() {
    let app = TestApp::new();
    app.register("user1", "hunter2").await;

    let (status, _) = app.get("/posts/", Some("garbage")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post("/posts/", Some("1:not base64:at all"), json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tokens_expire() {
    let app = TestApp::with_settings(ServerSettings {
        token_lifetime: Some(PositiveDuration::from_seconds(1).unwrap()),
        ..ServerSettings::default()
    });
    app.register("user1", "hunter2").await;

    let (_, issued) = app
        .post(
            "/auth/login/",
            None,
            json!({ "handle": "user1", "password": "hunter2" }),
        )
        .await;
    assert!(issued["expires_at"].is_string());
    let token = issued["token"].as_str().unwrap();

    app.create_post(token, "in time").await;

    std::thread::sleep(Duration::from_millis(1100));

    let (status, _) = app
        .post("/posts/", Some(token), json!({ "title": "too late" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lifetime_past_the_last_date_never_expires() {
    let app = TestApp::with_settings(ServerSettings {
        token_lifetime: Some(PositiveDuration::from_seconds(i64::MAX / 2).unwrap()),
        ..ServerSettings::default()
    });
    app.register("user1", "hunter2").await;

    let (status, issued) = app
        .post(
            "/auth/login/",
            None,
            json!({ "handle": "user1", "password": "hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(issued["expires_at"].is_null());

    app.create_post(issued["token"].as_str().unwrap(), "forever").await;
}
