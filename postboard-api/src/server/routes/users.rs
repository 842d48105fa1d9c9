use crate::server::{
    Result, ServerError, ServerRouter, ServerSettings,
    auth::{AuthenticatedUser, requester_id},
    json::Json,
    query::{Page, Query, pagination, sort_order},
    view::Viewed,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::{
    model::{
        Id,
        auth::PasswordDigest,
        post::Post,
        user::{CreateUser, User, UserMarker},
    },
    query::PostFilter,
};
use postboard_db::Store;
use serde::Deserialize;
use std::{num::NonZeroU32, sync::Arc};
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_get(get_user)
        .typed_get(list_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/", rejection(ServerError))]
struct UsersPath();

async fn create_user(
    UsersPath(): UsersPath,
    State(store): State<Arc<dyn Store>>,
    Json(CreateUser { handle, password }): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    let password_hash = PasswordDigest::hash(&password)?;
    let user = store.create_user(&handle, &password_hash).await?;

    info!(user = %user.id, handle = user.handle.get(), "Registered user");

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<User>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts/", rejection(ServerError))]
struct UserPostsPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct UserPostListParams {
    ordering: Option<String>,
    page: Option<NonZeroU32>,
}

async fn list_user_posts(
    UserPostsPath { id }: UserPostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<ServerSettings>,
    requester: Option<AuthenticatedUser>,
    Query(params): Query<UserPostListParams>,
) -> Result<Json<Page<Viewed<Post>>>> {
    if store.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    let filter = PostFilter {
        owner: Some(id),
        ..PostFilter::default()
    };
    let pagination = pagination(params.page, settings.page_size);

    let listing = store
        .list_posts(&filter, sort_order(params.ordering.as_deref()), pagination)
        .await?;

    let requester = requester_id(requester.as_ref());
    let page = Page::new(listing, pagination, |post| Viewed::new(post, requester))?;
    Ok(Json(page))
}
