pub mod auth;
pub mod follow;
pub mod post;
pub mod profile;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError,
        post::InvalidPostTitleError,
        profile::InvalidProfileNameError,
        user::{InvalidPasswordError, InvalidUserHandleError},
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    Password(#[from] InvalidPasswordError),
    #[error(transparent)]
    PostTitle(#[from] InvalidPostTitleError),
    #[error(transparent)]
    ProfileName(#[from] InvalidProfileNameError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error("Stored id {0} is not a positive integer")]
    InvalidId(i64),
}

/// Store-assigned row id, tagged with the kind of resource it identifies.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// The id as stored in a `BIGINT` column.
    #[must_use]
    pub fn get_signed(self) -> i64 {
        self.0.cast_signed()
    }

    pub fn from_signed(id: i64) -> Result<Self, ModelValidationError> {
        u64::try_from(id)
            .ok()
            .filter(|&id| id > 0)
            .map(Self::new)
            .ok_or(ModelValidationError::InvalidId(id))
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Self::new)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}
