use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use postboard_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
        follow::FollowMarker,
        post::PostMarker,
        profile::ProfileMarker,
        user::UserMarker,
    },
    query::DEFAULT_PAGE_SIZE,
    util::PositiveDuration,
};
use postboard_db::{DbError, Store};
use serde::Serialize;
use std::{num::NonZeroU32, sync::Arc};
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod query;
mod routes;
mod view;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub settings: ServerSettings,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ServerSettings {
    pub page_size: NonZeroU32,
    /// `None` keeps sessions valid until logout.
    pub token_lifetime: Option<PositiveDuration>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            token_lifetime: None,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Request body could not be read: {0}")]
    BodyRejection(#[from] BytesRejection),
    #[error("Expected request with `Content-Type: application/json`")]
    UnsupportedContentType,
    #[error("Request body is invalid: {0}")]
    InvalidBody(serde_json::Error),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Handle or password was wrong")]
    InvalidCredentials,
    #[error("Authentication is required for this request")]
    Unauthenticated,
    #[error("Only the owner may modify this resource")]
    Forbidden,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Profile with id {0} was not found.")]
    ProfileByIdNotFound(Id<ProfileMarker>),
    #[error("Follow with id {0} was not found.")]
    FollowByIdNotFound(Id<FollowMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("User with id {0} cannot be followed because it does not exist.")]
    FollowedUserNotFound(Id<UserMarker>),
    #[error("Page {0} is out of range.")]
    InvalidPage(NonZeroU32),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::ProfileByIdNotFound(_)
            | ServerError::FollowByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::InvalidPage(_) => StatusCode::NOT_FOUND,
            ServerError::Unauthenticated | ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::InvalidToken | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(JsonRejection::JsonDataError(_))
            | ServerError::QueryRejection(_)
            | ServerError::InvalidBody(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::FollowedUserNotFound(_)
            | ServerError::Database(DbError::MissingReference) => StatusCode::BAD_REQUEST,
            ServerError::JsonRejection(rejection) => rejection.status(),
            ServerError::BodyRejection(rejection) => rejection.status(),
            ServerError::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServerError::Database(DbError::Conflict) => StatusCode::CONFLICT,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let detail = if status.is_server_error() {
            status
                .canonical_reason()
                .unwrap_or("Internal error")
                .to_owned()
        } else {
            self.to_string()
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            detail,
        };
        (status, Json(error_response)).into_response()
    }
}
