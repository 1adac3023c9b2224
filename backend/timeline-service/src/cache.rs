//! Process-wide timeline cache.
//!
//! Two namespaces in front of the stores:
//! - feed pages, keyed `feed:{owner}:{page}:{size}` -> one `FeedPage`
//!   snapshot;
//! - posts, keyed `post:{post_id}` -> one `Post`.
//!
//! Invalidation is coarse by design: every mutation on the synchronous
//! request path (post create/delete, follow, unfollow) clears the whole
//! feed-page namespace immediately. The asynchronous fan-out finishes at
//! an unknown time, so a precise per-user eviction issued at request time
//! could run before fan-out lands and leave a stale page behind that
//! nothing would ever evict. Per-key eviction exists for callers that can
//! reason about it; the mutation sites don't try.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{FeedPage, Post};
use namespace_cache::{CacheStats, NamespaceCache};

/// Cache key for one timeline page.
pub fn feed_page_key(owner_id: Uuid, page: u32, size: u32) -> String {
    format!("feed:{}:{}:{}", owner_id, page, size)
}

/// Cache key for one post.
pub fn post_key(post_id: Uuid) -> String {
    format!("post:{}", post_id)
}

/// Combined counters for both namespaces.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineCacheStats {
    pub feed_pages: CacheStats,
    pub posts: CacheStats,
}

pub struct TimelineCache {
    pages: NamespaceCache<FeedPage>,
    posts: NamespaceCache<Post>,
}

impl TimelineCache {
    pub fn new(feed_page_capacity: usize, post_capacity: usize) -> Self {
        Self {
            pages: NamespaceCache::with_name("feed-pages", feed_page_capacity),
            posts: NamespaceCache::with_name("posts", post_capacity),
        }
    }

    pub fn get_page(&self, owner_id: Uuid, page: u32, size: u32) -> Option<Arc<FeedPage>> {
        self.pages.get(&feed_page_key(owner_id, page, size))
    }

    pub fn put_page(&self, owner_id: Uuid, page: u32, size: u32, value: FeedPage) {
        self.pages.insert(feed_page_key(owner_id, page, size), value);
    }

    /// Exact-key eviction; supported but not the mutation-site policy.
    pub fn evict_page(&self, owner_id: Uuid, page: u32, size: u32) -> bool {
        self.pages.invalidate(&feed_page_key(owner_id, page, size))
    }

    /// Drop every cached page for every user. Idempotent and commutative,
    /// so concurrent mutation sites may call it in any order.
    pub fn evict_all_pages(&self) {
        self.pages.clear();
    }

    pub fn get_post(&self, post_id: Uuid) -> Option<Arc<Post>> {
        self.posts.get(&post_key(post_id))
    }

    pub fn put_post(&self, post: Post) {
        self.posts.insert(post_key(post.id), post);
    }

    pub fn evict_post(&self, post_id: Uuid) -> bool {
        self.posts.invalidate(&post_key(post_id))
    }

    pub fn stats(&self) -> TimelineCacheStats {
        TimelineCacheStats {
            feed_pages: self.pages.stats(),
            posts: self.posts.stats(),
        }
    }
}
