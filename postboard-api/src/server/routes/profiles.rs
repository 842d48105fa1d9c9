use crate::server::{
    Result, ServerError, ServerRouter, ServerSettings,
    auth::{AuthenticatedUser, authorize, requester_id},
    json::{Json, JsonBody},
    query::{Page, Query, pagination, sort_order},
    view::Viewed,
};
use axum::{extract::State, http::Method};
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::{
    model::{
        Id,
        profile::{Profile, ProfileChanges, ProfileMarker},
    },
    query::ProfileFilter,
};
use postboard_db::Store;
use serde::Deserialize;
use std::{num::NonZeroU32, sync::Arc};
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_profiles)
        .typed_get(get_profile)
        .typed_put(update_profile)
        .typed_patch(update_profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profiles/", rejection(ServerError))]
struct ProfilesPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct ProfileListParams {
    follows: Option<Id<ProfileMarker>>,
    followed_by: Option<Id<ProfileMarker>>,
    ordering: Option<String>,
    page: Option<NonZeroU32>,
}

/// Profiles are created with their user, so there is no create route.
async fn list_profiles(
    ProfilesPath(): ProfilesPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<ServerSettings>,
    requester: Option<AuthenticatedUser>,
    Query(params): Query<ProfileListParams>,
) -> Result<Json<Page<Viewed<Profile>>>> {
    let filter = ProfileFilter {
        follows: params.follows,
        followed_by: params.followed_by,
    };
    let pagination = pagination(params.page, settings.page_size);

    let listing = store
        .list_profiles(&filter, sort_order(params.ordering.as_deref()), pagination)
        .await?;

    let requester = requester_id(requester.as_ref());
    let page = Page::new(listing, pagination, |profile| {
        Viewed::new(profile, requester)
    })?;
    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profiles/{id}/", rejection(ServerError))]
struct ProfilePath {
    id: Id<ProfileMarker>,
}

async fn get_profile(
    ProfilePath { id }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
) -> Result<Json<Viewed<Profile>>> {
    let profile = store
        .fetch_profile(id)
        .await?
        .ok_or(ServerError::ProfileByIdNotFound(id))?;

    Ok(Json(Viewed::new(profile, requester_id(requester.as_ref()))))
}

/// Serves both `PUT` and `PATCH`: omitted fields are left unchanged either way.
async fn update_profile(
    ProfilePath { id }: ProfilePath,
    method: Method,
    State(store): State<Arc<dyn Store>>,
    requester: Option<AuthenticatedUser>,
    body: JsonBody,
) -> Result<Json<Viewed<Profile>>> {
    let profile = store
        .fetch_profile(id)
        .await?
        .ok_or(ServerError::ProfileByIdNotFound(id))?;
    authorize(&method, requester.as_ref(), &profile)?;

    let changes: ProfileChanges = body.decode()?;
    let profile = store
        .update_profile(id, &changes)
        .await?
        .ok_or(ServerError::ProfileByIdNotFound(id))?;

    info!(profile = %id, "Updated profile");

    Ok(Json(Viewed::new(profile, requester_id(requester.as_ref()))))
}
