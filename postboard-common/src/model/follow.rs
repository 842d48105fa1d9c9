use crate::{
    model::{
        Id,
        user::{User, UserMarker},
    },
    permission::Owned,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FollowMarker;

/// `owner` follows `followed`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Follow {
    pub id: Id<FollowMarker>,
    pub owner: User,
    pub followed: User,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Owned for Follow {
    fn owner_id(&self) -> Id<UserMarker> {
        self.owner.id
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct NewFollow {
    pub followed: Id<UserMarker>,
}
