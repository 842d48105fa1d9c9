use crate::server::{
    Result, ServerError, ServerRouter, ServerSettings,
    auth::{AuthenticatedUser, authorize, requester_id},
    json::{Json, JsonBody},
    query::{Page, Query, pagination, sort_order},
    view::Viewed,
};
use axum::{
    extract::State,
    http::{Method, StatusCode},
};
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::{
    model::{
        Id,
        post::{NewPost, Post, PostChanges, PostMarker, ReplacePost},
        profile::ProfileMarker,
    },
    query::PostFilter,
};
use postboard_db::Store;
use serde::{Deserialize, de::DeserializeOwned};
use std::{num::NonZeroU32, sync::Arc};
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(replace_post)
        .typed_patch(patch_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/", rejection(ServerError))]
struct PostsPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PostListParams {
    profile: Option<Id<ProfileMarker>>,
    followed_by: Option<Id<ProfileMarker>>,
    search: Option<String>,
    ordering: Option<String>,
    page: Option<NonZeroU32>,
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<ServerSettings>,
    requester: Option<AuthenticatedUser>,
    Query(params): Query<PostListParams>,
) -> Result<Json<Page<Viewed<Post>>>> {
    let filter = PostFilter {
        owner: None,
        profile: params.profile,
        followed_by: params.followed_by,
        search: params.search.filter(|search| !search.is_empty()),
    };
    let pagination = pagination(params.page, settings.page_size);

    let listing = store
        .list_posts(&filter, sort_order(params.ordering.as_deref()), pagination)
        .await?;

    let requester = requester_id(requester.as_ref());
    let page = Page::new(listing, pagination, |post| Viewed::new(post, requester))?;
    Ok(Json(page))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(post): Json<NewPost>,
) -> Result<(StatusCode, Json<Viewed<Post>>)> {
    let post = store.create_post(user.user_id(), &post).await?;

    info!(post = %post.id, owner = %user.user_id(), "Created post");

    Ok((
        StatusCode::CREATED,
        Json(Viewed::new(post, Some(user.user_id()))),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
) -> Result<Json<Viewed<Post>>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(Viewed::new(post, requester_id(requester.as_ref()))))
}

async fn replace_post(
    PostPath { id }: PostPath,
    method: Method,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
    body: JsonBody,
) -> Result<Json<Viewed<Post>>> {
    update_post::<ReplacePost>(store.as_ref(), &method, id, requester, body).await
}

async fn patch_post(
    PostPath { id }: PostPath,
    method: Method,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
    body: JsonBody,
) -> Result<Json<Viewed<Post>>> {
    update_post::<PostChanges>(store.as_ref(), &method, id, requester, body).await
}

/// Load, authorize, then validate and apply the changes.
async fn update_post<B>(
    store: &dyn Store,
    method: &Method,
    id: Id<PostMarker>,
    requester: Option<AuthenticatedUser>,
    body: JsonBody,
) -> Result<Json<Viewed<Post>>>
where
    B: DeserializeOwned + Into<PostChanges>,
{
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    authorize(method, requester.as_ref(), &post)?;

    let changes: PostChanges = body.decode::<B>()?.into();
    let post = store
        .update_post(id, &changes)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    info!(post = %id, "Updated post");

    Ok(Json(Viewed::new(post, requester_id(requester.as_ref()))))
}
