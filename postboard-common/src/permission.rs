//! Ownership-based access control.
//!
//! Reads are open to everyone. Writes are open only to the resource's owner,
//! and an absent identity never owns anything.

use crate::model::{Id, user::UserMarker};

/// A resource with exactly one owning user.
pub trait Owned {
    fn owner_id(&self) -> Id<UserMarker>;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Access {
    /// List or retrieve.
    Read,
    /// Create, update or delete.
    Write,
}

#[must_use]
pub fn is_owner(requester: Option<Id<UserMarker>>, resource: &impl Owned) -> bool {
    requester.is_some_and(|requester| requester == resource.owner_id())
}

#[must_use]
pub fn is_permitted(
    requester: Option<Id<UserMarker>>,
    resource: &impl Owned,
    access: Access,
) -> bool {
    match access {
        Access::Read => true,
        Access::Write => is_owner(requester, resource),
    }
}

#[must_use]
pub fn can_write(requester: Option<Id<UserMarker>>, resource: &impl Owned) -> bool {
    is_permitted(requester, resource, Access::Write)
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{Id, user::UserMarker},
        permission::{Access, Owned, can_write, is_owner, is_permitted},
    };

    struct Thing(Id<UserMarker>);

    impl Owned for Thing {
        fn owner_id(&self) -> Id<UserMarker> {
            self.0
        }
    }

    #[test]
    fn reads_are_always_permitted() {
        let thing = Thing(Id::new(1));

        assert!(is_permitted(None, &thing, Access::Read));
        assert!(is_permitted(Some(Id::new(1)), &thing, Access::Read));
        assert!(is_permitted(Some(Id::new(2)), &thing, Access::Read));
    }

    #[test]
    fn writes_need_the_owner() {
        let thing = Thing(Id::new(1));

        assert!(can_write(Some(Id::new(1)), &thing));
        assert!(!can_write(Some(Id::new(2)), &thing));
        assert!(!can_write(None, &thing));
        assert!(!is_permitted(None, &thing, Access::Write));
    }

    #[test]
    fn ownership_flag() {
        let thing = Thing(Id::new(3));

        assert!(is_owner(Some(Id::new(3)), &thing));
        assert!(!is_owner(Some(Id::new(4)), &thing));
        assert!(!is_owner(None, &thing));
    }
}
