//! In-process [`Store`] with the same semantics as the PostgreSQL client.
//!
//! Serves development runs without a database and the server's tests.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use postboard_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, PasswordDigest, UserCredentials},
        follow::{Follow, FollowMarker},
        post::{NewPost, Post, PostChanges, PostMarker, PostTitle},
        profile::{Profile, ProfileChanges, ProfileMarker, ProfileName},
        user::{User, UserHandle, UserMarker},
    },
    query::{
        Listing, Pagination, PostFilter, PostOrderField, ProfileFilter, ProfileOrderField,
        SortOrder,
    },
};
use std::{cmp::Ordering, collections::BTreeMap};
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<u64, UserRow>,
    authentications: Vec<Authentication>,
    profiles: BTreeMap<u64, ProfileRow>,
    posts: BTreeMap<u64, PostRow>,
    follows: BTreeMap<u64, FollowRow>,
    last_ids: LastIds,
}

#[derive(Debug, Default)]
struct LastIds {
    user: u64,
    profile: u64,
    post: u64,
    follow: u64,
}

#[derive(Debug)]
struct UserRow {
    user: User,
    password_hash: PasswordDigest,
}

#[derive(Debug)]
struct ProfileRow {
    user_id: Id<UserMarker>,
    name: ProfileName,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug)]
struct PostRow {
    user_id: Id<UserMarker>,
    title: PostTitle,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug)]
struct FollowRow {
    user_id: Id<UserMarker>,
    followed_user_id: Id<UserMarker>,
    created_at: OffsetDateTime,
}

fn next_id(last: &mut u64) -> u64 {
    *last += 1;
    *last
}

fn page<T>(mut items: Vec<T>, pagination: Pagination) -> Listing<T> {
    let count = items.len() as u64;
    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);

    let items = if offset < items.len() {
        items.drain(offset..).take(limit).collect()
    } else {
        Vec::new()
    };

    Listing { count, items }
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

impl MemoryState {
    fn user(&self, user_id: Id<UserMarker>) -> Result<&User> {
        self.users
            .get(&user_id.get())
            .map(|row| &row.user)
            .ok_or(DbError::MissingReference)
    }

    fn profile_id_of(&self, user_id: Id<UserMarker>) -> Result<Id<ProfileMarker>> {
        self.profiles
            .iter()
            .find(|(_, row)| row.user_id == user_id)
            .map(|(&id, _)| Id::new(id))
            .ok_or(DbError::MissingReference)
    }

    fn profile_user_id(&self, profile_id: Id<ProfileMarker>) -> Option<Id<UserMarker>> {
        self.profiles.get(&profile_id.get()).map(|row| row.user_id)
    }

    fn is_following(&self, owner: Id<UserMarker>, followed: Id<UserMarker>) -> bool {
        self.follows
            .values()
            .any(|row| row.user_id == owner && row.followed_user_id == followed)
    }

    fn post(&self, id: u64, row: &PostRow) -> Result<Post> {
        Ok(Post {
            id: Id::new(id),
            owner: self.user(row.user_id)?.clone(),
            profile_id: self.profile_id_of(row.user_id)?,
            title: row.title.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn profile(&self, id: u64, row: &ProfileRow) -> Result<Profile> {
        let count = |predicate: &dyn Fn(&FollowRow) -> bool| {
            self.follows.values().filter(|row| predicate(row)).count() as u64
        };

        Ok(Profile {
            id: Id::new(id),
            owner: self.user(row.user_id)?.clone(),
            name: row.name.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            posts_count: self
                .posts
                .values()
                .filter(|post| post.user_id == row.user_id)
                .count() as u64,
            followers_count: count(&|follow| follow.followed_user_id == row.user_id),
            following_count: count(&|follow| follow.user_id == row.user_id),
        })
    }

    fn follow(&self, id: u64, row: &FollowRow) -> Result<Follow> {
        Ok(Follow {
            id: Id::new(id),
            owner: self.user(row.user_id)?.clone(),
            followed: self.user(row.followed_user_id)?.clone(),
            created_at: row.created_at,
        })
    }

    fn matches_post(&self, post: &Post, filter: &PostFilter) -> bool {
        if filter.owner.is_some_and(|owner| owner != post.owner.id) {
            return false;
        }
        if filter.profile.is_some_and(|profile| profile != post.profile_id) {
            return false;
        }
        if let Some(follower_profile) = filter.followed_by {
            let Some(follower) = self.profile_user_id(follower_profile) else {
                return false;
            };
            if !self.is_following(follower, post.owner.id) {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            let search = search.to_lowercase();
            if !post.title.get().to_lowercase().contains(&search)
                && !post.owner.handle.get().to_lowercase().contains(&search)
            {
                return false;
            }
        }
        true
    }

    fn matches_profile(&self, profile: &Profile, filter: &ProfileFilter) -> bool {
        if let Some(followed_profile) = filter.follows {
            let Some(followed) = self.profile_user_id(followed_profile) else {
                return false;
            };
            if !self.is_following(profile.owner.id, followed) {
                return false;
            }
        }
        if let Some(follower_profile) = filter.followed_by {
            let Some(follower) = self.profile_user_id(follower_profile) else {
                return false;
            };
            if !self.is_following(follower, profile.owner.id) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        handle: &UserHandle,
        password_hash: &PasswordDigest,
    ) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|row| &row.user.handle == handle) {
            return Err(DbError::Conflict);
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Id::new(next_id(&mut state.last_ids.user)),
            handle: handle.clone(),
            created_at: now,
        };
        state.users.insert(
            user.id.get(),
            UserRow {
                user: user.clone(),
                password_hash: password_hash.clone(),
            },
        );

        let profile_id = next_id(&mut state.last_ids.profile);
        state.profiles.insert(
            profile_id,
            ProfileRow {
                user_id: user.id,
                name: ProfileName::default(),
                content: String::new(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(user)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id.get()).map(|row| row.user.clone()))
    }

    async fn fetch_credentials(&self, handle: &UserHandle) -> Result<Option<UserCredentials>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|row| &row.user.handle == handle)
            .map(|row| UserCredentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut state = self.state.lock().await;
        state.user(authentication.user)?;
        if state
            .authentications
            .iter()
            .any(|stored| stored.token_hash == authentication.token_hash)
        {
            return Err(DbError::Conflict);
        }

        state.authentications.push(authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let state = self.state.lock().await;
        Ok(state
            .authentications
            .iter()
            .find(|stored| &stored.token_hash == token_hash)
            .cloned())
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.authentications.len();
        state
            .authentications
            .retain(|stored| &stored.token_hash != token_hash);

        Ok(state.authentications.len() < before)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: SortOrder<PostOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Post>> {
        let state = self.state.lock().await;

        let mut posts = Vec::new();
        for (&id, row) in &state.posts {
            let post = state.post(id, row)?;
            if state.matches_post(&post, filter) {
                posts.push(post);
            }
        }

        posts.sort_by(|a, b| {
            let ordering = match order.field {
                PostOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
                PostOrderField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                PostOrderField::Title => a.title.cmp(&b.title),
            };
            directed(ordering, order.descending).then_with(|| b.id.cmp(&a.id))
        });

        Ok(page(posts, pagination))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state.lock().await;
        state
            .posts
            .get(&post_id.get())
            .map(|row| state.post(post_id.get(), row))
            .transpose()
    }

    async fn create_post(&self, owner: Id<UserMarker>, post: &NewPost) -> Result<Post> {
        let mut state = self.state.lock().await;
        state.user(owner)?;

        let now = OffsetDateTime::now_utc();
        let id = next_id(&mut state.last_ids.post);
        let row = PostRow {
            user_id: owner,
            title: post.title.clone(),
            content: post.content.clone(),
            created_at: now,
            updated_at: now,
        };

        let post = state.post(id, &row)?;
        state.posts.insert(id, row);
        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let mut state = self.state.lock().await;
        let Some(row) = state.posts.get_mut(&post_id.get()) else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            row.title = title.clone();
        }
        if let Some(content) = &changes.content {
            row.content.clone_from(content);
        }
        row.updated_at = OffsetDateTime::now_utc();

        let row = &state.posts[&post_id.get()];
        state.post(post_id.get(), row).map(Some)
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        order: SortOrder<ProfileOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Profile>> {
        let state = self.state.lock().await;

        let mut profiles = Vec::new();
        for (&id, row) in &state.profiles {
            let profile = state.profile(id, row)?;
            if state.matches_profile(&profile, filter) {
                profiles.push(profile);
            }
        }

        profiles.sort_by(|a, b| {
            let ordering = match order.field {
                ProfileOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
                ProfileOrderField::PostsCount => a.posts_count.cmp(&b.posts_count),
                ProfileOrderField::FollowersCount => a.followers_count.cmp(&b.followers_count),
                ProfileOrderField::FollowingCount => a.following_count.cmp(&b.following_count),
            };
            directed(ordering, order.descending).then_with(|| b.id.cmp(&a.id))
        });

        Ok(page(profiles, pagination))
    }

    async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>> {
        let state = self.state.lock().await;
        state
            .profiles
            .get(&profile_id.get())
            .map(|row| state.profile(profile_id.get(), row))
            .transpose()
    }

    async fn update_profile(
        &self,
        profile_id: Id<ProfileMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>> {
        let mut state = self.state.lock().await;
        let Some(row) = state.profiles.get_mut(&profile_id.get()) else {
            return Ok(None);
        };

        if let Some(name) = &changes.name {
            row.name = name.clone();
        }
        if let Some(content) = &changes.content {
            row.content.clone_from(content);
        }
        row.updated_at = OffsetDateTime::now_utc();

        let row = &state.profiles[&profile_id.get()];
        state.profile(profile_id.get(), row).map(Some)
    }

    async fn list_follows(&self, pagination: Pagination) -> Result<Listing<Follow>> {
        let state = self.state.lock().await;

        let mut follows = state
            .follows
            .iter()
            .map(|(&id, row)| state.follow(id, row))
            .collect::<Result<Vec<_>>>()?;
        follows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(page(follows, pagination))
    }

    async fn fetch_follow(&self, follow_id: Id<FollowMarker>) -> Result<Option<Follow>> {
        let state = self.state.lock().await;
        state
            .follows
            .get(&follow_id.get())
            .map(|row| state.follow(follow_id.get(), row))
            .transpose()
    }

    async fn create_follow(
        &self,
        owner: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<Follow> {
        let mut state = self.state.lock().await;
        state.user(owner)?;
        state.user(followed)?;
        if state.is_following(owner, followed) {
            return Err(DbError::Conflict);
        }

        let id = next_id(&mut state.last_ids.follow);
        let row = FollowRow {
            user_id: owner,
            followed_user_id: followed,
            created_at: OffsetDateTime::now_utc(),
        };

        let follow = state.follow(id, &row)?;
        state.follows.insert(id, row);
        Ok(follow)
    }

    async fn delete_follow(&self, follow_id: Id<FollowMarker>) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.follows.remove(&follow_id.get()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::MemoryStore,
        store::{DbError, Store},
    };
    use postboard_common::{
        model::{
            Id,
            auth::PasswordDigest,
            post::{NewPost, PostChanges, PostTitle},
            user::{Password, User, UserHandle},
        },
        query::{
            Pagination, PostFilter, PostOrderField, ProfileFilter, ProfileOrderField, SortOrder,
        },
    };
    use std::num::NonZeroU32;

    fn pagination() -> Pagination {
        Pagination::first(NonZeroU32::new(10).unwrap())
    }

    async fn user(store: &MemoryStore, handle: &str) -> User {
        let digest = PasswordDigest::hash(&Password::new("pass".to_owned()).unwrap()).unwrap();
        store
            .create_user(&UserHandle::new(handle.to_owned()).unwrap(), &digest)
            .await
            .unwrap()
    }

    async fn post(store: &MemoryStore, owner: &User, title: &str) -> u64 {
        let new_post = NewPost {
            title: PostTitle::new(title.to_owned()).unwrap(),
            content: String::new(),
        };
        store.create_post(owner.id, &new_post).await.unwrap().id.get()
    }

    #[tokio::test]
    async fn ids_start_at_one() {
        let store = MemoryStore::new();
        let user1 = user(&store, "user1").await;
        let user2 = user(&store, "user2").await;

        assert_eq!(user1.id.get(), 1);
        assert_eq!(post(&store, &user1, "title 1").await, 1);
        assert_eq!(post(&store, &user2, "title 2").await, 2);
    }

    #[tokio::test]
    async fn duplicate_handle_conflicts() {
        let store = MemoryStore::new();
        user(&store, "user").await;

        let digest = PasswordDigest::hash(&Password::new("pass".to_owned()).unwrap()).unwrap();
        let result = store
            .create_user(&UserHandle::new("user".to_owned()).unwrap(), &digest)
            .await;
        assert!(matches!(result, Err(DbError::Conflict)));
    }

    #[tokio::test]
    async fn every_user_gets_a_profile() {
        let store = MemoryStore::new();
        let user1 = user(&store, "user1").await;

        let profile = store.fetch_profile(Id::new(1)).await.unwrap().unwrap();
        assert_eq!(profile.owner, user1);
        assert_eq!(profile.name.get(), "");
        assert_eq!(
            (profile.posts_count, profile.followers_count, profile.following_count),
            (0, 0, 0)
        );
    }

    #[tokio::test]
    async fn profile_counts_follow_the_data() {
        let store = MemoryStore::new();
        let user1 = user(&store, "user1").await;
        let user2 = user(&store, "user2").await;
        let user3 = user(&store, "user3").await;

        post(&store, &user1, "a").await;
        post(&store, &user1, "b").await;
        store.create_follow(user2.id, user1.id).await.unwrap();
        store.create_follow(user3.id, user1.id).await.unwrap();
        let follow = store.create_follow(user1.id, user3.id).await.unwrap();

        let profile1 = store.fetch_profile(Id::new(1)).await.unwrap().unwrap();
        assert_eq!(
            (profile1.posts_count, profile1.followers_count, profile1.following_count),
            (2, 2, 1)
        );

        assert!(store.delete_follow(follow.id).await.unwrap());
        assert!(!store.delete_follow(follow.id).await.unwrap());
        let profile1 = store.fetch_profile(Id::new(1)).await.unwrap().unwrap();
        assert_eq!(profile1.following_count, 0);

        let by_followers = store
            .list_profiles(
                &ProfileFilter::default(),
                SortOrder::parse("-followers_count").unwrap(),
                pagination(),
            )
            .await
            .unwrap();
        assert_eq!(by_followers.count, 3);
        assert_eq!(by_followers.items[0].owner.id, user1.id);
        assert_eq!(
            SortOrder::<ProfileOrderField>::parse("-followers_count")
                .unwrap()
                .field,
            ProfileOrderField::FollowersCount
        );
    }

    #[tokio::test]
    async fn duplicate_follow_conflicts() {
        let store = MemoryStore::new();
        let user1 = user(&store, "user1").await;
        let user2 = user(&store, "user2").await;

        store.create_follow(user1.id, user2.id).await.unwrap();
        assert!(matches!(
            store.create_follow(user1.id, user2.id).await,
            Err(DbError::Conflict)
        ));
        assert!(matches!(
            store.create_follow(user1.id, Id::new(99)).await,
            Err(DbError::MissingReference)
        ));
    }

    #[tokio::test]
    async fn profile_follow_filters() {
        let store = MemoryStore::new();
        let user1 = user(&store, "user1").await;
        let user2 = user(&store, "user2").await;
        let user3 = user(&store, "user3").await;
        store.create_follow(user2.id, user1.id).await.unwrap();
        store.create_follow(user3.id, user1.id).await.unwrap();
        store.create_follow(user1.id, user3.id).await.unwrap();

        let followers_of_user1 = store
            .list_profiles(
                &ProfileFilter {
                    follows: Some(Id::new(1)),
                    followed_by: None,
                },
                SortOrder::default(),
                pagination(),
            )
            .await
            .unwrap();
        let mut handles: Vec<_> = followers_of_user1
            .items
            .iter()
            .map(|profile| profile.owner.handle.get().to_owned())
            .collect();
        handles.sort();
        assert_eq!(handles, ["user2", "user3"]);

        let followed_by_user1 = store
            .list_profiles(
                &ProfileFilter {
                    follows: None,
                    followed_by: Some(Id::new(1)),
                },
                SortOrder::default(),
                pagination(),
            )
            .await
            .unwrap();
        assert_eq!(followed_by_user1.count, 1);
        assert_eq!(followed_by_user1.items[0].owner.id, user3.id);
    }

    #[tokio::test]
    async fn post_filters_and_ordering() {
        let store = MemoryStore::new();
        let user1 = user(&store, "alice").await;
        let user2 = user(&store, "bob").await;
        post(&store, &user1, "Banana bread").await;
        post(&store, &user2, "apple pie").await;
        post(&store, &user2, "cherry").await;
        store.create_follow(user1.id, user2.id).await.unwrap();

        let by_title = store
            .list_posts(
                &PostFilter::default(),
                SortOrder {
                    field: PostOrderField::Title,
                    descending: false,
                },
                pagination(),
            )
            .await
            .unwrap();
        let titles: Vec<_> = by_title.items.iter().map(|p| p.title.get()).collect();
        assert_eq!(titles, ["Banana bread", "apple pie", "cherry"]);

        let newest_first = store
            .list_posts(&PostFilter::default(), SortOrder::default(), pagination())
            .await
            .unwrap();
        let ids: Vec<_> = newest_first.items.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, [3, 2, 1]);

        let search = PostFilter {
            search: Some("BOB".to_owned()),
            ..PostFilter::default()
        };
        let found = store
            .list_posts(&search, SortOrder::default(), pagination())
            .await
            .unwrap();
        assert_eq!(found.count, 2);

        let feed = PostFilter {
            followed_by: Some(Id::new(1)),
            ..PostFilter::default()
        };
        let feed = store
            .list_posts(&feed, SortOrder::default(), pagination())
            .await
            .unwrap();
        assert!(feed.items.iter().all(|p| p.owner.id == user2.id));
        assert_eq!(feed.count, 2);

        let by_profile = PostFilter {
            profile: Some(Id::new(1)),
            ..PostFilter::default()
        };
        let by_profile = store
            .list_posts(&by_profile, SortOrder::default(), pagination())
            .await
            .unwrap();
        assert_eq!(by_profile.count, 1);
        assert_eq!(by_profile.items[0].owner.id, user1.id);
    }

    #[tokio::test]
    async fn pages_are_cut() {
        let store = MemoryStore::new();
        let owner = user(&store, "user").await;
        for i in 0..12 {
            post(&store, &owner, &format!("post {i}")).await;
        }

        let second = Pagination {
            page: NonZeroU32::new(2).unwrap(),
            page_size: NonZeroU32::new(5).unwrap(),
        };
        let listing = store
            .list_posts(&PostFilter::default(), SortOrder::default(), second)
            .await
            .unwrap();
        assert_eq!(listing.count, 12);
        let ids: Vec<_> = listing.items.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, [7, 6, 5, 4, 3]);

        let past_end = Pagination {
            page: NonZeroU32::new(4).unwrap(),
            page_size: NonZeroU32::new(5).unwrap(),
        };
        let listing = store
            .list_posts(&PostFilter::default(), SortOrder::default(), past_end)
            .await
            .unwrap();
        assert_eq!(listing.count, 12);
        assert!(listing.items.is_empty());
    }

    #[tokio::test]
    async fn partial_post_update() {
        let store = MemoryStore::new();
        let owner = user(&store, "user").await;
        let new_post = NewPost {
            title: PostTitle::new("title".to_owned()).unwrap(),
            content: "content".to_owned(),
        };
        let created = store.create_post(owner.id, &new_post).await.unwrap();

        let changes = PostChanges {
            title: Some(PostTitle::new("new title".to_owned()).unwrap()),
            content: None,
        };
        let updated = store
            .update_post(created.id, &changes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title.get(), "new title");
        assert_eq!(updated.content, "content");
        assert!(updated.updated_at >= created.updated_at);

        assert_eq!(
            store.update_post(Id::new(99), &changes).await.unwrap(),
            None
        );
    }
}
