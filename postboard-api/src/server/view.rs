use postboard_common::{
    model::{Id, user::UserMarker},
    permission::{Owned, is_owner},
};
use serde::Serialize;

/// A resource as seen by one requester.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Viewed<T> {
    #[serde(flatten)]
    pub resource: T,
    pub is_owner: bool,
}

impl<T: Owned> Viewed<T> {
    pub fn new(resource: T, requester: Option<Id<UserMarker>>) -> Self {
        let is_owner = is_owner(requester, &resource);
        Self { resource, is_owner }
    }
}
