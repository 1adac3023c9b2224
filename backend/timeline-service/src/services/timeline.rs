//! Core write/read path: posts, follows, and the cached push timeline.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::TimelineCache;
use crate::domain::events::{FeedEvent, PostCreatedEvent, UserFollowedEvent};
use crate::domain::models::{FeedPage, Post, MAX_CONTENT_CHARS};
use crate::error::AppError;
use crate::repository::traits::{FeedStore, FollowStore, PostStore, UserStore};
use crate::workers::EventBus;

pub struct TimelineService {
    posts: Arc<dyn PostStore>,
    follows: Arc<dyn FollowStore>,
    feeds: Arc<dyn FeedStore>,
    users: Arc<dyn UserStore>,
    cache: Arc<TimelineCache>,
    bus: EventBus,
}

impl TimelineService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        follows: Arc<dyn FollowStore>,
        feeds: Arc<dyn FeedStore>,
        users: Arc<dyn UserStore>,
        cache: Arc<TimelineCache>,
        bus: EventBus,
    ) -> Self {
        Self {
            posts,
            follows,
            feeds,
            users,
            cache,
            bus,
        }
    }

    /// Persist a post, invalidate caches, and queue the fan-out. The post
    /// is durable once this returns; followers' timelines converge
    /// asynchronously.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        content: &str,
    ) -> Result<Post, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Post content cannot be empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::Validation(format!(
                "Post content cannot exceed {} characters",
                MAX_CONTENT_CHARS
            )));
        }

        let post = Post::new(author_id, content.to_string());
        self.posts.insert(&post).await?;
        info!("User {} created post {}", author_id, post.id);

        self.cache.evict_post(post.id);
        self.cache.evict_all_pages();

        if let Err(err) = self
            .bus
            .publish(FeedEvent::PostCreated(PostCreatedEvent::from(&post)))
            .await
        {
            // The post is already durable; readers fall back to the pull
            // path until the next successful fan-out.
            warn!("Fan-out enqueue failed for post {}: {:#}", post.id, err);
        }

        Ok(post)
    }

    /// Read-through lookup of a single active post.
    pub async fn get_post(&self, post_id: Uuid) -> Result<Post, AppError> {
        if let Some(post) = self.cache.get_post(post_id) {
            debug!("Post {} served from cache", post_id);
            return Ok((*post).clone());
        }

        let post = self
            .posts
            .find(post_id)
            .await?
            .filter(|post| post.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        self.cache.put_post(post.clone());
        Ok(post)
    }

    /// Soft-delete a post and purge its timeline deliveries.
    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), AppError> {
        if !self.posts.set_active(post_id, false).await? {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }
        let purged = self.feeds.delete_by_post(post_id).await?;
        info!("Post {} deleted, {} timeline rows purged", post_id, purged);

        self.cache.evict_post(post_id);
        self.cache.evict_all_pages();
        Ok(())
    }

    /// One page of a user's materialized timeline, newest first.
    pub async fn get_user_feed(
        &self,
        user_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<FeedPage, AppError> {
        if size == 0 {
            return Err(AppError::Validation("Page size must be positive".into()));
        }

        if let Some(cached) = self.cache.get_page(user_id, page, size) {
            debug!("Feed page {}/{} for {} served from cache", page, size, user_id);
            return Ok((*cached).clone());
        }

        let items = self.feeds.page_with_posts(user_id, page, size).await?;
        let total_count = self.feeds.count_by_owner(user_id).await?;
        let has_more = (page as u64 + 1) * (size as u64) < total_count;

        let result = FeedPage {
            items,
            page,
            size,
            total_count,
            has_more,
        };
        self.cache.put_page(user_id, page, size, result.clone());
        Ok(result)
    }

    /// Create a follow edge and queue the history backfill.
    pub async fn follow_user(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<(), AppError> {
        if follower_id == followee_id {
            return Err(AppError::Validation("Users cannot follow themselves".into()));
        }
        if !self.follows.create(follower_id, followee_id).await? {
            return Err(AppError::Validation("Already following this user".into()));
        }
        info!("User {} followed {}", follower_id, followee_id);

        self.cache.evict_all_pages();

        let event = FeedEvent::UserFollowed(UserFollowedEvent {
            follower_id,
            followee_id,
            followed_at: Utc::now(),
        });
        if let Err(err) = self.bus.publish(event).await {
            warn!(
                "Backfill enqueue failed for {} -> {}: {:#}",
                follower_id, followee_id, err
            );
        }
        Ok(())
    }

    /// Remove a follow edge and retract the followee's posts from the
    /// follower's timeline synchronously.
    pub async fn unfollow_user(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<(), AppError> {
        if follower_id == followee_id {
            return Err(AppError::Validation(
                "Users cannot unfollow themselves".into(),
            ));
        }
        if !self.follows.delete(follower_id, followee_id).await? {
            return Err(AppError::Validation("Not following this user".into()));
        }

        let removed = self
            .feeds
            .delete_by_owner_and_author(follower_id, followee_id)
            .await?;
        info!(
            "User {} unfollowed {}, {} timeline rows removed",
            follower_id, followee_id, removed
        );

        self.cache.evict_all_pages();
        Ok(())
    }

    /// Touch a user's last-activity timestamp, creating the record if it
    /// does not exist.
    pub async fn record_activity(&self, user_id: Uuid) -> Result<(), AppError> {
        self.users.record_activity(user_id, Utc::now()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;
    use crate::workers;

    fn service(store: Arc<MemoryStore>) -> (TimelineService, tokio::sync::mpsc::Receiver<FeedEvent>) {
        let (bus, rx) = workers::channel(64);
        let cache = Arc::new(TimelineCache::new(128, 128));
        let service = TimelineService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            cache,
            bus,
        );
        (service, rx)
    }

    #[tokio::test]
    async fn test_create_post_rejects_blank_content() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let err = service.create_post(Uuid::new_v4(), "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_post_rejects_oversized_content() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let long = "x".repeat(MAX_CONTENT_CHARS + 1);
        let err = service.create_post(Uuid::new_v4(), &long).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_post_trims_and_publishes_event() {
        let (service, mut rx) = service(Arc::new(MemoryStore::new()));
        let author = Uuid::new_v4();
        let post = service.create_post(author, "  hello  ").await.unwrap();
        assert_eq!(post.content, "hello");
        assert_eq!(post.author_id, author);

        match rx.recv().await {
            Some(FeedEvent::PostCreated(event)) => {
                assert_eq!(event.post_id, post.id);
                assert_eq!(event.author_id, author);
            }
            other => panic!("expected post-created event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_post_misses_inactive() {
        let store = Arc::new(MemoryStore::new());
        let (service, _rx) = service(store.clone());
        let post = service.create_post(Uuid::new_v4(), "soon gone").await.unwrap();

        service.delete_post(post.id).await.unwrap();
        let err = service.get_post(post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_post_twice_is_not_found() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let post = service.create_post(Uuid::new_v4(), "x").await.unwrap();
        service.delete_post(post.id).await.unwrap();
        let err = service.delete_post(post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_self_rejected_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let (service, mut rx) = service(store.clone());
        let user = Uuid::new_v4();
        let err = service.follow_user(user, user).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(!store.exists(user, user).await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_follow_rejected() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        service.follow_user(a, b).await.unwrap();
        let err = service.follow_user(a, b).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unfollow_without_edge_rejected() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let err = service
            .unfollow_user(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_feed_rejects_zero_size() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let err = service.get_user_feed(Uuid::new_v4(), 0, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_feed_page() {
        let (service, _rx) = service(Arc::new(MemoryStore::new()));
        let page = service.get_user_feed(Uuid::new_v4(), 0, 20).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
        assert!(!page.has_more);
    }
}
