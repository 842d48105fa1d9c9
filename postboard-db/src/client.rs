use crate::{
    record::{
        AuthenticationRecord, CredentialsRecord, FollowRecord, PostRecord, ProfileRecord,
        UserRecord,
    },
    store::{DbError, Result, Store},
};
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
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions, query, query_as, query_scalar};
use tracing::info;

const POST_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.title,
        posts.content,
        posts.created_at,
        posts.updated_at,
        users.user_id,
        users.handle,
        users.created_at AS user_created_at,
        profiles.profile_id
    FROM
        posts.posts
        JOIN users.users ON users.user_id = posts.user_id
        JOIN profiles.profiles ON profiles.user_id = posts.user_id
    ";

const POST_COUNT: &str = "
    SELECT
        COUNT(*)
    FROM
        posts.posts
        JOIN users.users ON users.user_id = posts.user_id
        JOIN profiles.profiles ON profiles.user_id = posts.user_id
    ";

const PROFILE_SELECT: &str = "
    SELECT
        profiles.profile_id,
        profiles.name,
        profiles.content,
        profiles.created_at,
        profiles.updated_at,
        users.user_id,
        users.handle,
        users.created_at AS user_created_at,
        (SELECT COUNT(*) FROM posts.posts
            WHERE posts.user_id = profiles.user_id) AS posts_count,
        (SELECT COUNT(*) FROM follows.follows
            WHERE follows.followed_user_id = profiles.user_id) AS followers_count,
        (SELECT COUNT(*) FROM follows.follows
            WHERE follows.user_id = profiles.user_id) AS following_count
    FROM
        profiles.profiles
        JOIN users.users ON users.user_id = profiles.user_id
    ";

const PROFILE_COUNT: &str = "
    SELECT
        COUNT(*)
    FROM
        profiles.profiles
    ";

const FOLLOW_SELECT: &str = "
    SELECT
        follows.follow_id,
        follows.created_at,
        owners.user_id,
        owners.handle,
        owners.created_at AS user_created_at,
        followed.user_id AS followed_user_id,
        followed.handle AS followed_handle,
        followed.created_at AS followed_created_at
    FROM
        follows.follows
        JOIN users.users AS owners ON owners.user_id = follows.user_id
        JOIN users.users AS followed ON followed.user_id = follows.followed_user_id
    ";

/// PostgreSQL-backed [`Store`].
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database migrations applied");

        Ok(())
    }

    async fn fetch_page<R, T>(
        &self,
        mut page_query: QueryBuilder<'_, Postgres>,
        mut count_query: QueryBuilder<'_, Postgres>,
        pagination: Pagination,
    ) -> Result<Listing<T>>
    where
        R: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
        T: TryFrom<R, Error = postboard_common::model::ModelValidationError>,
    {
        page_query
            .push(" LIMIT ")
            .push_bind(pagination.limit().cast_signed())
            .push(" OFFSET ")
            .push_bind(pagination.offset().cast_signed());

        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let records: Vec<R> = page_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let items = records
            .into_iter()
            .map(T::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Listing {
            count: count.cast_unsigned(),
            items,
        })
    }
}

/// Escapes `LIKE` wildcards and wraps the text for a substring match.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_post_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");
    if let Some(owner) = filter.owner {
        builder
            .push(" AND posts.user_id = ")
            .push_bind(owner.get_signed());
    }
    if let Some(profile) = filter.profile {
        builder
            .push(" AND profiles.profile_id = ")
            .push_bind(profile.get_signed());
    }
    if let Some(follower_profile) = filter.followed_by {
        builder
            .push(
                " AND posts.user_id IN (
                    SELECT follows.followed_user_id
                    FROM follows.follows
                    JOIN profiles.profiles AS follower ON follower.user_id = follows.user_id
                    WHERE follower.profile_id = ",
            )
            .push_bind(follower_profile.get_signed())
            .push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        builder
            .push(" AND (posts.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR users.handle ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_profile_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProfileFilter) {
    builder.push(" WHERE TRUE");
    if let Some(followed_profile) = filter.follows {
        builder
            .push(
                " AND profiles.user_id IN (
                    SELECT follows.user_id
                    FROM follows.follows
                    JOIN profiles.profiles AS target ON target.user_id = follows.followed_user_id
                    WHERE target.profile_id = ",
            )
            .push_bind(followed_profile.get_signed())
            .push(")");
    }
    if let Some(follower_profile) = filter.followed_by {
        builder
            .push(
                " AND profiles.user_id IN (
                    SELECT follows.followed_user_id
                    FROM follows.follows
                    JOIN profiles.profiles AS source ON source.user_id = follows.user_id
                    WHERE source.profile_id = ",
            )
            .push_bind(follower_profile.get_signed())
            .push(")");
    }
}

fn push_order<F>(
    builder: &mut QueryBuilder<'_, Postgres>,
    order: SortOrder<F>,
    column: fn(F) -> &'static str,
    tie_breaker: &str,
) {
    builder
        .push(" ORDER BY ")
        .push(column(order.field))
        .push(if order.descending { " DESC" } else { " ASC" })
        .push(", ")
        .push(tie_breaker)
        .push(" DESC");
}

fn post_column(field: PostOrderField) -> &'static str {
    match field {
        PostOrderField::CreatedAt => "posts.created_at",
        PostOrderField::UpdatedAt => "posts.updated_at",
        // Byte order, the same as `MemoryStore`, whatever the database locale.
        PostOrderField::Title => "posts.title COLLATE \"C\"",
    }
}

fn profile_column(field: ProfileOrderField) -> &'static str {
    match field {
        ProfileOrderField::CreatedAt => "profiles.created_at",
        ProfileOrderField::PostsCount => "posts_count",
        ProfileOrderField::FollowersCount => "followers_count",
        ProfileOrderField::FollowingCount => "following_count",
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(
        &self,
        handle: &UserHandle,
        password_hash: &PasswordDigest,
    ) -> Result<User> {
        let mut transaction = self.pool.begin().await?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (handle, password_hash)
            VALUES ($1, $2)
            RETURNING user_id, handle, created_at
            ",
        )
        .bind(handle.get())
        .bind(password_hash.get())
        .fetch_one(&mut *transaction)
        .await?;

        query("INSERT INTO profiles.profiles (user_id) VALUES ($1)")
            .bind(record.user_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(User::try_from(record)?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.created_at
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.get_signed())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(&self, handle: &UserHandle) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.created_at,
                users.password_hash
            FROM
                users.users
            WHERE
                users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.get_signed())
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_id,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM users.authentications WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: SortOrder<PostOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Post>> {
        let mut page_query = QueryBuilder::new(POST_SELECT);
        push_post_filter(&mut page_query, filter);
        push_order(&mut page_query, order, post_column, "posts.post_id");

        let mut count_query = QueryBuilder::new(POST_COUNT);
        push_post_filter(&mut count_query, filter);

        self.fetch_page::<PostRecord, Post>(page_query, count_query, pagination)
            .await
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut builder = QueryBuilder::new(POST_SELECT);
        builder
            .push(" WHERE posts.post_id = ")
            .push_bind(post_id.get_signed());

        let record: Option<PostRecord> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, owner: Id<UserMarker>, post: &NewPost) -> Result<Post> {
        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts.posts (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING post_id
            ",
        )
        .bind(owner.get_signed())
        .bind(post.title.get())
        .bind(&post.content)
        .fetch_one(&self.pool)
        .await?;

        self.fetch_post(Id::from_signed(post_id)?)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let updated: Option<i64> = query_scalar(
            "
            UPDATE posts.posts
            SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                updated_at = now()
            WHERE post_id = $1
            RETURNING post_id
            ",
        )
        .bind(post_id.get_signed())
        .bind(changes.title.as_ref().map(PostTitle::get))
        .bind(changes.content.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(_) => self.fetch_post(post_id).await,
            None => Ok(None),
        }
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        order: SortOrder<ProfileOrderField>,
        pagination: Pagination,
    ) -> Result<Listing<Profile>> {
        let mut page_query = QueryBuilder::new(PROFILE_SELECT);
        push_profile_filter(&mut page_query, filter);
        push_order(&mut page_query, order, profile_column, "profiles.profile_id");

        let mut count_query = QueryBuilder::new(PROFILE_COUNT);
        push_profile_filter(&mut count_query, filter);

        self.fetch_page::<ProfileRecord, Profile>(page_query, count_query, pagination)
            .await
    }

    async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>> {
        let mut builder = QueryBuilder::new(PROFILE_SELECT);
        builder
            .push(" WHERE profiles.profile_id = ")
            .push_bind(profile_id.get_signed());

        let record: Option<ProfileRecord> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        let profile = record.map(Profile::try_from).transpose()?;
        Ok(profile)
    }

    async fn update_profile(
        &self,
        profile_id: Id<ProfileMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>> {
        let updated: Option<i64> = query_scalar(
            "
            UPDATE profiles.profiles
            SET
                name = COALESCE($2, name),
                content = COALESCE($3, content),
                updated_at = now()
            WHERE profile_id = $1
            RETURNING profile_id
            ",
        )
        .bind(profile_id.get_signed())
        .bind(changes.name.as_ref().map(ProfileName::get))
        .bind(changes.content.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(_) => self.fetch_profile(profile_id).await,
            None => Ok(None),
        }
    }

    async fn list_follows(&self, pagination: Pagination) -> Result<Listing<Follow>> {
        let mut page_query = QueryBuilder::new(FOLLOW_SELECT);
        page_query.push(" ORDER BY follows.created_at DESC, follows.follow_id DESC");

        let count_query = QueryBuilder::new("SELECT COUNT(*) FROM follows.follows");

        self.fetch_page::<FollowRecord, Follow>(page_query, count_query, pagination)
            .await
    }

    async fn fetch_follow(&self, follow_id: Id<FollowMarker>) -> Result<Option<Follow>> {
        let mut builder = QueryBuilder::new(FOLLOW_SELECT);
        builder
            .push(" WHERE follows.follow_id = ")
            .push_bind(follow_id.get_signed());

        let record: Option<FollowRecord> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        let follow = record.map(Follow::try_from).transpose()?;
        Ok(follow)
    }

    async fn create_follow(
        &self,
        owner: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<Follow> {
        let follow_id: i64 = query_scalar(
            "
            INSERT INTO follows.follows (user_id, followed_user_id)
            VALUES ($1, $2)
            RETURNING follow_id
            ",
        )
        .bind(owner.get_signed())
        .bind(followed.get_signed())
        .fetch_one(&self.pool)
        .await?;

        self.fetch_follow(Id::from_signed(follow_id)?)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    async fn delete_follow(&self, follow_id: Id<FollowMarker>) -> Result<bool> {
        let result = query("DELETE FROM follows.follows WHERE follow_id = $1")
            .bind(follow_id.get_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
