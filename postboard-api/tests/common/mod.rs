#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use http_body_util::BodyExt;
use postboard_api::server::{self, ServerSettings, ServerState};
use postboard_db::MemoryStore;
use serde_json::{Value, json};
use std::{num::NonZeroU32, sync::Arc};
use tower::ServiceExt;

/// The full router over a fresh in-memory store.
pub struct TestApp {
    router: Router,
}

/// A registered and logged in user.
pub struct TestUser {
    pub id: u64,
    pub profile_id: u64,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(ServerSettings::default())
    }

    pub fn with_page_size(page_size: u32) -> Self {
        Self::with_settings(ServerSettings {
            page_size: NonZeroU32::new(page_size).unwrap(),
            ..ServerSettings::default()
        })
    }

    pub fn with_settings(settings: ServerSettings) -> Self {
        let state = ServerState {
            store: Arc::new(MemoryStore::new()),
            settings,
        };
        Self {
            router: server::routes().with_state(state),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        match body {
            Some(body) => {
                let body = serde_json::to_vec(&body).unwrap();
                self.send(method, uri, token, Some(("application/json", body)))
                    .await
            }
            None => self.send(method, uri, token, None).await,
        }
    }

    /// Sends `body` verbatim with the given content type.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<(&str, Vec<u8>)>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some((content_type, body)) => request
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body)),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, handle: &str, password: &str) -> Value {
        let (status, user) = self
            .post(
                "/users/",
                None,
                json!({ "handle": handle, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");
        user
    }

    pub async fn login(&self, handle: &str, password: &str) -> String {
        let (status, issued) = self
            .post(
                "/auth/login/",
                None,
                json!({ "handle": handle, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{issued}");
        issued["token"].as_str().unwrap().to_owned()
    }

    /// Registers `handle`, logs in, and looks up the user's profile.
    pub async fn user(&self, handle: &str) -> TestUser {
        let user = self.register(handle, "password").await;
        let id = user["id"].as_u64().unwrap();
        let token = self.login(handle, "password").await;

        let (_, profiles) = self.get("/profiles/", None).await;
        let profile_id = profiles["results"]
            .as_array()
            .unwrap()
            .iter()
            .find(|profile| profile["owner"]["id"] == id)
            .map(|profile| profile["id"].as_u64().unwrap())
            .unwrap();

        TestUser {
            id,
            profile_id,
            token,
        }
    }

    pub async fn create_post(&self, token: &str, title: &str) -> Value {
        let (status, post) = self
            .post("/posts/", Some(token), json!({ "title": title }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{post}");
        post
    }

    pub async fn follow(&self, token: &str, followed: u64) -> Value {
        let (status, follow) = self
            .post("/follows/", Some(token), json!({ "followed": followed }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{follow}");
        follow
    }
}
