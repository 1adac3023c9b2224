//! PostgreSQL store (source of truth for the running service).
//!
//! Schema lives in `migrations/`. The `feed_entries` unique index on
//! (owner_id, post_id) plus `ON CONFLICT DO NOTHING` makes bulk appends
//! safe under at-least-once event redelivery.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{FeedEntry, FeedItemView, Post, User};
use crate::repository::traits::{FeedStore, FollowStore, PostStore, UserStore};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("PostgreSQL health check failed")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl FollowStore for PostgresStore {
    async fn create(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            RETURNING follower_id
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create follow")?;

        Ok(inserted.is_some())
    }

    async fn delete(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let affected = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete follow")?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn exists(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check follow existence")?;
        Ok(row.0)
    }

    async fn followers_of(&self, followee_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT follower_id FROM follows WHERE followee_id = $1")
                .bind(followee_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list followers")?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn followees_of(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT followee_id FROM follows WHERE follower_id = $1")
                .bind(follower_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list followees")?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn count_followees(&self, follower_id: Uuid) -> Result<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
                .bind(follower_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count followees")?;
        Ok(row.0 as u64)
    }
}

#[async_trait::async_trait]
impl PostStore for PostgresStore {
    async fn insert(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, content, created_at, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.is_active)
        .execute(&self.pool)
        .await
        .context("Failed to insert post")?;

        debug!("Inserted post {} by author {}", post.id, post.author_id);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>(
            "SELECT id, author_id, content, created_at, is_active FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load post")
    }

    async fn active_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, created_at, is_active
            FROM posts
            WHERE author_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load author's active posts")
    }

    async fn active_by_authors(&self, author_ids: &[Uuid]) -> Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, created_at, is_active
            FROM posts
            WHERE author_id = ANY($1) AND is_active = TRUE
            "#,
        )
        .bind(author_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load active posts for authors")
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let affected = sqlx::query("UPDATE posts SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .context("Failed to update post active flag")?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait::async_trait]
impl FeedStore for PostgresStore {
    async fn append(&self, entries: &[FeedEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::new(
            "INSERT INTO feed_entries (id, owner_id, post_id, author_id, created_at, is_read) ",
        );
        builder.push_values(entries, |mut row, entry| {
            row.push_bind(entry.id)
                .push_bind(entry.owner_id)
                .push_bind(entry.post_id)
                .push_bind(entry.author_id)
                .push_bind(entry.created_at)
                .push_bind(entry.is_read);
        });
        builder.push(" ON CONFLICT (owner_id, post_id) DO NOTHING");

        let inserted = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to append feed entries")?
            .rows_affected() as usize;

        debug!(
            "Appended {} of {} feed entries (rest were already delivered)",
            inserted,
            entries.len()
        );
        Ok(inserted)
    }

    async fn page_with_posts(
        &self,
        owner_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<FeedItemView>> {
        sqlx::query_as::<_, FeedItemView>(
            r#"
            SELECT f.post_id, f.author_id, p.content, f.created_at, f.is_read
            FROM feed_entries f
            JOIN posts p ON p.id = f.post_id
            WHERE f.owner_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(size as i64)
        .bind(page as i64 * size as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load feed page")
    }

    async fn delete_by_owner_and_author(&self, owner_id: Uuid, author_id: Uuid) -> Result<u64> {
        let affected =
            sqlx::query("DELETE FROM feed_entries WHERE owner_id = $1 AND author_id = $2")
                .bind(owner_id)
                .bind(author_id)
                .execute(&self.pool)
                .await
                .context("Failed to delete feed entries for owner/author")?
                .rows_affected();

        debug!(
            "Removed {} feed entries of owner {} authored by {}",
            affected, owner_id, author_id
        );
        Ok(affected)
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64> {
        let affected = sqlx::query("DELETE FROM feed_entries WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete feed entries for post")?
            .rows_affected();
        Ok(affected)
    }

    async fn count_by_owner(&self, owner_id: Uuid) -> Result<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_entries WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count feed entries")?;
        Ok(row.0 as u64)
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, last_active_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load user")
    }

    async fn record_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, last_active_at)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET last_active_at = EXCLUDED.last_active_at
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to record user activity")?;
        Ok(())
    }

    async fn active_among(
        &self,
        ids: &[Uuid],
        cutoff: DateTime<Utc>,
    ) -> Result<HashSet<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users WHERE id = ANY($1) AND last_active_at > $2",
        )
        .bind(ids)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("Failed to filter active users")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
