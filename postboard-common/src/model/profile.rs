use crate::{
    model::{
        Id,
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

pub const PROFILE_NAME_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProfileMarker;

/// A user's profile. The counts are aggregated when the profile is read.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Profile {
    pub id: Id<ProfileMarker>,
    pub owner: User,
    pub name: ProfileName,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
}

impl Owned for Profile {
    fn owner_id(&self) -> Id<UserMarker> {
        self.owner.id
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(default)]
pub struct ProfileChanges {
    pub name: Option<ProfileName>,
    pub content: Option<String>,
}

/// Display name; may be blank.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ProfileName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The profile name is too long: {0}")]
pub struct InvalidProfileNameError(String);

impl ProfileName {
    pub fn new(name: String) -> Result<Self, InvalidProfileNameError> {
        if name.chars().count() <= PROFILE_NAME_MAX_LEN {
            Ok(ProfileName(name))
        } else {
            Err(InvalidProfileNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProfileName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ProfileName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ProfileName"))
    }
}
