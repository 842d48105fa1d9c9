use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{Method, header::AUTHORIZATION, request::Parts},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use postboard_common::{
    model::{
        Id,
        auth::{AuthToken, AuthTokenHash},
        user::UserMarker,
    },
    permission::{Access, Owned, is_permitted},
};
use postboard_db::Store;
use std::sync::Arc;
use time::OffsetDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The requester, identified by a valid bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

/// Id of an optional requester, for the `is_owner` flag.
#[must_use]
pub fn requester_id(requester: Option<&AuthenticatedUser>) -> Option<Id<UserMarker>> {
    requester.map(AuthenticatedUser::user_id)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        ServerError::Unauthenticated
                    } else {
                        ServerError::InvalidAuthorizationHeader(rejection)
                    }
                })?
                .token()
                .parse()?;

        let token_hash = request_token.hash()?;

        let authentication = Arc::<dyn Store>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(OffsetDateTime::now_utc())
        {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
            token_hash,
        })
    }
}

/// No `Authorization` header means an anonymous requester. A header that is
/// present must still be valid.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }

        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

#[must_use]
pub fn access_for(method: &Method) -> Access {
    if method.is_safe() {
        Access::Read
    } else {
        Access::Write
    }
}

/// Applies the ownership check for `method` on `resource`.
pub fn authorize(
    method: &Method,
    requester: Option<&AuthenticatedUser>,
    resource: &impl Owned,
) -> Result<()> {
    if is_permitted(requester_id(requester), resource, access_for(method)) {
        Ok(())
    } else if requester.is_none() {
        Err(ServerError::Unauthenticated)
    } else {
        Err(ServerError::Forbidden)
    }
}
