use postboard_common::{
    model::{
        Id, ModelValidationError,
        auth::{Authentication, PasswordDigest, UserCredentials},
        follow::Follow,
        post::{Post, PostTitle},
        profile::{Profile, ProfileName},
        user::{User, UserHandle},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub handle: String,
    pub created_at: OffsetDateTime,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
    pub user_created_at: OffsetDateTime,
    pub profile_id: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ProfileRecord {
    pub profile_id: i64,
    pub name: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
    pub user_created_at: OffsetDateTime,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FollowRecord {
    pub follow_id: i64,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
    pub user_created_at: OffsetDateTime,
    pub followed_user_id: i64,
    pub followed_handle: String,
    pub followed_created_at: OffsetDateTime,
}

fn user(
    user_id: i64,
    handle: String,
    created_at: OffsetDateTime,
) -> Result<User, ModelValidationError> {
    Ok(User {
        id: Id::from_signed(user_id)?,
        handle: UserHandle::new(handle)?,
        created_at,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        user(value.user_id, value.handle, value.created_at)
    }
}

impl TryFrom<CredentialsRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: user(value.user_id, value.handle, value.created_at)?,
            password_hash: PasswordDigest::from_stored(value.password_hash),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_signed(value.user_id)?,
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_signed(value.post_id)?,
            owner: user(value.user_id, value.handle, value.user_created_at)?,
            profile_id: Id::from_signed(value.profile_id)?,
            title: PostTitle::new(value.title)?,
            content: value.content,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ModelValidationError;

    fn try_from(value: ProfileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_signed(value.profile_id)?,
            owner: user(value.user_id, value.handle, value.user_created_at)?,
            name: ProfileName::new(value.name)?,
            content: value.content,
            created_at: value.created_at,
            updated_at: value.updated_at,
            posts_count: value.posts_count.cast_unsigned(),
            followers_count: value.followers_count.cast_unsigned(),
            following_count: value.following_count.cast_unsigned(),
        })
    }
}

impl TryFrom<FollowRecord> for Follow {
    type Error = ModelValidationError;

    fn try_from(value: FollowRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_signed(value.follow_id)?,
            owner: user(value.user_id, value.handle, value.user_created_at)?,
            followed: user(
                value.followed_user_id,
                value.followed_handle,
                value.followed_created_at,
            )?,
            created_at: value.created_at,
        })
    }
}
