use crate::server::{
    Result, ServerError, ServerRouter, ServerSettings, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::model::auth::{AuthToken, Authentication, IssuedToken, Login};
use postboard_db::Store;
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(login)
        .typed_post(logout)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(ServerError))]
struct LoginPath();

/// Exchanges a handle and password for a fresh bearer token.
async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<ServerSettings>,
    Json(Login { handle, password }): Json<Login>,
) -> Result<(StatusCode, Json<IssuedToken>)> {
    let Some(credentials) = store.fetch_credentials(&handle).await? else {
        warn!(handle = handle.get(), "Login for unknown handle");
        return Err(ServerError::InvalidCredentials);
    };

    if !credentials.password_hash.verify(&password)? {
        warn!(user = %credentials.user.id, "Login with wrong password");
        return Err(ServerError::InvalidCredentials);
    }

    let user_id = credentials.user.id;
    let token = AuthToken::generate_random(user_id);
    let authentication = Authentication {
        user: user_id,
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: settings.token_lifetime,
    };
    store.create_auth(&authentication).await?;

    info!(user = %user_id, "Logged in");

    let issued = IssuedToken {
        token: token.as_token_str(),
        user_id,
        expires_at: authentication.expires_at(),
    };
    Ok((StatusCode::CREATED, Json(issued)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout/", rejection(ServerError))]
struct LogoutPath();

/// Revokes the session behind the presented token.
async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    if !store.delete_auth(user.token_hash()).await? {
        return Err(ServerError::InvalidToken);
    }

    info!(user = %user.user_id(), "Logged out");

    Ok(StatusCode::NO_CONTENT)
}
