//! Filtering, ordering and pagination of resource lists.

use crate::model::{Id, profile::ProfileMarker, user::UserMarker};
use std::num::NonZeroU32;

pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// One page of a list, 1-based.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Pagination {
    pub page: NonZeroU32,
    pub page_size: NonZeroU32,
}

impl Pagination {
    #[must_use]
    pub fn first(page_size: NonZeroU32) -> Self {
        Self {
            page: NonZeroU32::MIN,
            page_size,
        }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page.get() - 1) * u64::from(self.page_size.get())
    }

    #[must_use]
    pub fn limit(self) -> u64 {
        u64::from(self.page_size.get())
    }

    /// Whether a list of `count` items has anything on this page.
    /// The first page always exists, even when empty.
    #[must_use]
    pub fn exists_for(self, count: u64) -> bool {
        self.page == NonZeroU32::MIN || self.offset() < count
    }

    #[must_use]
    pub fn has_next(self, count: u64) -> bool {
        self.offset() + self.limit() < count
    }
}

/// A page of items plus the size of the whole filtered list.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Listing<T> {
    pub count: u64,
    pub items: Vec<T>,
}

pub trait OrderField: Copy + Sized {
    const DEFAULT: SortOrder<Self>;

    fn from_name(name: &str) -> Option<Self>;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct SortOrder<F> {
    pub field: F,
    pub descending: bool,
}

impl<F: OrderField> SortOrder<F> {
    /// Parses `field` or `-field`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (name, descending) = match value.strip_prefix('-') {
            Some(name) => (name, true),
            None => (value, false),
        };

        F::from_name(name).map(|field| Self { field, descending })
    }
}

impl<F: OrderField> Default for SortOrder<F> {
    fn default() -> Self {
        F::DEFAULT
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum PostOrderField {
    CreatedAt,
    UpdatedAt,
    Title,
}

impl OrderField for PostOrderField {
    const DEFAULT: SortOrder<Self> = SortOrder {
        field: Self::CreatedAt,
        descending: true,
    };

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ProfileOrderField {
    CreatedAt,
    PostsCount,
    FollowersCount,
    FollowingCount,
}

impl OrderField for ProfileOrderField {
    const DEFAULT: SortOrder<Self> = SortOrder {
        field: Self::CreatedAt,
        descending: true,
    };

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(Self::CreatedAt),
            "posts_count" => Some(Self::PostsCount),
            "followers_count" => Some(Self::FollowersCount),
            "following_count" => Some(Self::FollowingCount),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFilter {
    /// Posts owned by this user.
    pub owner: Option<Id<UserMarker>>,
    /// Posts owned by the user of this profile.
    pub profile: Option<Id<ProfileMarker>>,
    /// Posts whose owner is followed by the user of this profile.
    pub followed_by: Option<Id<ProfileMarker>>,
    /// Case-insensitive substring of the title or the owner's handle.
    pub search: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ProfileFilter {
    /// Profiles whose user follows the user of this profile.
    pub follows: Option<Id<ProfileMarker>>,
    /// Profiles whose user is followed by the user of this profile.
    pub followed_by: Option<Id<ProfileMarker>>,
}
