mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn profile_counts_are_exact() {
    let app = TestApp::new();
    let user1 = app.user("user1").await;
    let user2 = app.user("user2").await;
    let user3 = app.user("user3").await;

    app.create_post(&user1.token, "one").await;
    app.create_post(&user1.token, "two").await;
    app.follow(&user2.token, user1.id).await;
    app.follow(&user3.token, user1.id).await;
    app.follow(&user1.token, user3.id).await;

    let (status, profile) = app
        .get(&format!("/profiles/{}/", user1.profile_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["posts_count"], 2);
    assert_eq!(profile["followers_count"], 2);
    assert_eq!(profile["following_count"], 1);

    let (_, profiles) = app.get("/profiles/?ordering=-followers_count", None).await;
    assert_eq!(profiles["results"][0]["id"], user1.profile_id);
    assert_eq!(profiles["results"][1]["id"], user3.profile_id);

    let (_, profiles) = app
        .get(&format!("/profiles/?followed_by={}", user1.profile_id), None)
        .await;
    assert_eq!(profiles["count"], 1);
    assert_eq!(profiles["results"][0]["id"], user3.profile_id);

    let (_, profiles) = app
        .get(&format!("/profiles/?follows={}", user1.profile_id), None)
        .await;
    assert_eq!(profiles["count"], 2);
}

#[tokio::test]
async fn only_the_owner_may_update_a_profile() {
    let app = TestApp::new();
    let user1 = app.user("user1").await;
    let user2 = app.user("user2").await;
    let uri = format!("/profiles/{}/", user1.profile_id);

    let (status, _) = app
        .put(&uri, Some(&user2.token), json!({ "name": "Mallory" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.patch(&uri, None, json!({ "name": "Mallory" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&user2.token),
            Some(("application/x-www-form-urlencoded", b"name=Mallory".to_vec())),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = app
        .put(&uri, Some(&user1.token), json!({ "name": "Alice" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Alice");
    assert_eq!(profile["is_owner"], true);

    let (status, profile) = app
        .patch(&uri, Some(&user1.token), json!({ "content": "About me" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Alice");
    assert_eq!(profile["content"], "About me");

    let (status, _) = app.get("/profiles/999/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_lifecycle() {
    let app = TestApp::new();
    let user1 = app.user("user1").await;
    let user2 = app.user("user2").await;

    let follow = app.follow(&user1.token, user2.id).await;
    assert_eq!(follow["owner"]["id"], user1.id);
    assert_eq!(follow["followed"]["id"], user2.id);
    assert_eq!(follow["is_owner"], true);
    let uri = format!("/follows/{}/", follow["id"]);

    let (status, _) = app
        .post("/follows/", Some(&user1.token), json!({ "followed": user2.id }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .post("/follows/", Some(&user1.token), json!({ "followed": 999 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post("/follows/", None, json!({ "followed": user2.id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, follows) = app.get("/follows/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(follows["count"], 1);

    let (status, _) = app.delete(&uri, Some(&user2.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, Some(&user1.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&user1.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.follow(&user1.token, user2.id).await;
}
