use crate::{
    model::{
        Id,
        profile::ProfileMarker,
        user::{User, UserMarker},
    },
    permission::Owned,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub owner: User,
    pub profile_id: Id<ProfileMarker>,
    pub title: PostTitle,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Owned for Post {
    fn owner_id(&self) -> Id<UserMarker> {
        self.owner.id
    }
}

/// Body of a post creation.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct NewPost {
    pub title: PostTitle,
    #[serde(default)]
    pub content: String,
}

/// Body of a full post update. Omitted content is kept as is.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct ReplacePost {
    pub title: PostTitle,
    pub content: Option<String>,
}

/// Fields to overwrite on a stored post; `None` leaves a field untouched.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(default)]
pub struct PostChanges {
    pub title: Option<PostTitle>,
    pub content: Option<String>,
}

impl From<ReplacePost> for PostChanges {
    fn from(value: ReplacePost) -> Self {
        Self {
            title: Some(value.title),
            content: value.content,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post title is invalid: {0}")]
pub struct InvalidPostTitleError(String);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidPostTitleError> {
        if !title.trim().is_empty() && title.chars().count() <= POST_TITLE_MAX_LEN {
            Ok(PostTitle(title))
        } else {
            Err(InvalidPostTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PostTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostTitle"))
    }
}
