use crate::server::{
    Result, ServerError, ServerRouter, ServerSettings,
    auth::{AuthenticatedUser, authorize, requester_id},
    json::Json,
    query::{Page, Query, pagination},
    view::Viewed,
};
use axum::{
    extract::State,
    http::{Method, StatusCode},
};
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::model::{
    Id,
    follow::{Follow, FollowMarker, NewFollow},
};
use postboard_db::Store;
use serde::Deserialize;
use std::{num::NonZeroU32, sync::Arc};
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_follows)
        .typed_post(create_follow)
        .typed_get(get_follow)
        .typed_delete(delete_follow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follows/", rejection(ServerError))]
struct FollowsPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct FollowListParams {
    page: Option<NonZeroU32>,
}

async fn list_follows(
    FollowsPath(): FollowsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<ServerSettings>,
    requester: Option<AuthenticatedUser>,
    Query(params): Query<FollowListParams>,
) -> Result<Json<Page<Viewed<Follow>>>> {
    let pagination = pagination(params.page, settings.page_size);
    let listing = store.list_follows(pagination).await?;

    let requester = requester_id(requester.as_ref());
    let page = Page::new(listing, pagination, |follow| Viewed::new(follow, requester))?;
    Ok(Json(page))
}

async fn create_follow(
    FollowsPath(): FollowsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(NewFollow { followed }): Json<NewFollow>,
) -> Result<(StatusCode, Json<Viewed<Follow>>)> {
    if store.fetch_user(followed).await?.is_none() {
        return Err(ServerError::FollowedUserNotFound(followed));
    }

    let follow = store.create_follow(user.user_id(), followed).await?;

    info!(follow = %follow.id, owner = %user.user_id(), %followed, "Created follow");

    Ok((
        StatusCode::CREATED,
        Json(Viewed::new(follow, Some(user.user_id()))),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follows/{id}/", rejection(ServerError))]
struct FollowPath {
    id: Id<FollowMarker>,
}

async fn get_follow(
    FollowPath { id }: FollowPath,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
) -> Result<Json<Viewed<Follow>>> {
    let follow = store
        .fetch_follow(id)
        .await?
        .ok_or(ServerError::FollowByIdNotFound(id))?;

    Ok(Json(Viewed::new(follow, requester_id(requester.as_ref()))))
}

async fn delete_follow(
    FollowPath { id }: FollowPath,
    method: Method,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
) -> Result<StatusCode> {
    let follow = store
        .fetch_follow(id)
        .await?
        .ok_or(ServerError::FollowByIdNotFound(id))?;
    authorize(&method, requester.as_ref(), &follow)?;

    if !store.delete_follow(id).await? {
        return Err(ServerError::FollowByIdNotFound(id));
    }

    info!(follow = %id, "Deleted follow");

    Ok(StatusCode::NO_CONTENT)
}
