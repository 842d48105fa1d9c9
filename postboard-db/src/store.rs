use async_trait::async_trait;
use postboard_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, PasswordDigest, UserCredentials},
        follow::{Follow, FollowMarker},
        post::{NewPost, Post, PostChanges, PostMarker},
        profile::{Profile, ProfileChanges, ProfileMarker},
        user::{User, UserHandle, UserMarker},
    },
    query::{
        Listing, Pagination, PostFilter, PostOrderField, ProfileFilter, ProfileOrderField,
        SortOrder,
    },
};
use std::fmt::Debug;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The record conflicts with an existing one")]
    Conflict,
    #[error("The record references a row that does not exist")]
    MissingReference,
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict,
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::MissingReference
            }
            _ => DbError::Sqlx(err),
        }
    }
}

/// Persistence for every resource the server exposes.
///
/// Each call is atomic on its own. Lists are filtered, sorted with ties
/// broken by descending id, and cut to the requested page; the listing's
/// count covers the whole filtered list.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Creates the user together with their empty profile.
    async fn create_user(&self, handle: &UserHandle, password_hash: &PasswordDigest)
    -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_credentials(&self, handle: &UserHandle) -> Result<Option<UserCredentials>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    /// Returns whether a session was deleted.
    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: SortOrder<PostOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, owner: Id<UserMarker>, post: &NewPost) -> Result<Post>;

    /// Returns `None` if the post does not exist.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>>;

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        order: SortOrder<ProfileOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Profile>>;

    async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>>;

    /// Returns `None` if the profile does not exist.
    async fn update_profile(
        &self,
        profile_id: Id<ProfileMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>>;

    /// Newest first.
    async fn list_follows(&self, pagination: Pagination) -> Result<Listing<Follow>>;

    async fn fetch_follow(&self, follow_id: Id<FollowMarker>) -> Result<Option<Follow>>;

    /// Fails with [`DbError::Conflict`] if `owner` already follows `followed`.
    async fn create_follow(
        &self,
        owner: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<Follow>;

    /// Returns whether a follow was deleted.
    async fn delete_follow(&self, follow_id: Id<FollowMarker>) -> Result<bool>;
}
