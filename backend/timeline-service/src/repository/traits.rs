use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::models::{FeedEntry, FeedItemView, Post, User};

/// Follow-edge storage: directed (follower -> followee) pairs, unique per
/// pair.
#[async_trait::async_trait]
pub trait FollowStore: Send + Sync {
    /// Create a follow edge. Returns false if the edge already existed
    /// (insert is conflict-skipping, so concurrent duplicates are safe).
    async fn create(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;

    /// Delete a follow edge. Returns false if it did not exist.
    async fn delete(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;

    async fn exists(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;

    /// Reverse lookup: everyone following `followee_id`.
    async fn followers_of(&self, followee_id: Uuid) -> Result<Vec<Uuid>>;

    /// Forward lookup: everyone `follower_id` follows.
    async fn followees_of(&self, follower_id: Uuid) -> Result<Vec<Uuid>>;

    async fn count_followees(&self, follower_id: Uuid) -> Result<u64>;
}

/// Post storage. Posts are never hard-deleted; `set_active(false)` is the
/// removal path.
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: &Post) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Post>>;

    /// Active posts by one author, for backfill on follow.
    async fn active_by_author(&self, author_id: Uuid) -> Result<Vec<Post>>;

    /// Active posts by any of the given authors, for the pull-model join.
    async fn active_by_authors(&self, author_ids: &[Uuid]) -> Result<Vec<Post>>;

    /// Flip the active flag. Returns false if the post does not exist.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool>;
}

/// Per-user materialized timeline storage.
#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    /// Bulk insert, skipping entries whose (owner, post) pair already
    /// exists; returns the number of rows actually inserted. Redelivered
    /// fan-out events therefore insert zero new rows. Atomicity across
    /// the batch is the implementation's concern: the Postgres store
    /// commits all-or-nothing per statement, the in-memory store inserts
    /// entry by entry.
    async fn append(&self, entries: &[FeedEntry]) -> Result<usize>;

    /// One timeline page joined with post content, ordered by
    /// `created_at` descending then entry id descending. `page` is
    /// 0-based. Entries whose post row has been purged are omitted
    /// (inner-join semantics).
    async fn page_with_posts(
        &self,
        owner_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<FeedItemView>>;

    /// Remove all of `owner_id`'s entries authored by `author_id` (the
    /// unfollow cleanup). Returns rows removed.
    async fn delete_by_owner_and_author(&self, owner_id: Uuid, author_id: Uuid) -> Result<u64>;

    /// Remove every entry referencing a deleted post. Returns rows removed.
    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64>;

    async fn count_by_owner(&self, owner_id: Uuid) -> Result<u64>;
}

/// Activity-recency storage backing the active-user filter.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<User>>;

    /// Upsert the user's last-activity timestamp.
    async fn record_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Of the given ids, the subset with activity strictly after `cutoff`.
    /// Users with no record are not in the result.
    async fn active_among(
        &self,
        ids: &[Uuid],
        cutoff: DateTime<Utc>,
    ) -> Result<HashSet<Uuid>>;
}
