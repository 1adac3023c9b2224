use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Maximum post content length in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

/// A post. Immutable once created except for `is_active` (soft delete).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Post {
    pub fn new(author_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            content,
            created_at: Utc::now(),
            is_active: true,
        }
    }
}

/// Directed follow edge, unique per (follower, followee).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Denormalized per-reader timeline row: "this post appears in this
/// user's timeline". `created_at` is copied from the post so a slow
/// fan-out worker still sorts correctly once the row lands. One row per
/// (owner, post).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl FeedEntry {
    /// Build the entry delivered to `owner_id` for a post.
    pub fn deliver(
        owner_id: Uuid,
        post_id: Uuid,
        author_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            post_id,
            author_id,
            created_at,
            is_read: false,
        }
    }
}

/// A user as far as fan-out cares: identity plus last-activity timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub last_active_at: DateTime<Utc>,
}

/// FeedEntry joined with its post's content, the shape readers see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedItemView {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// One page of a timeline, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItemView>,
    pub page: u32,
    pub size: u32,
    pub total_count: u64,
    pub has_more: bool,
}

/// Timeline order: `created_at` descending, ties broken by id descending.
/// Deterministic so that repeated paginated reads over a static entry set
/// never duplicate or skip rows.
pub fn timeline_order(
    a: (DateTime<Utc>, Uuid),
    b: (DateTime<Utc>, Uuid),
) -> Ordering {
    b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_post_is_active() {
        let post = Post::new(Uuid::new_v4(), "hello".to_string());
        assert!(post.is_active);
    }

    #[test]
    fn test_delivered_entry_is_unread_and_keeps_post_timestamp() {
        let ts = Utc::now() - Duration::hours(3);
        let entry = FeedEntry::deliver(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), ts);
        assert!(!entry.is_read);
        assert_eq!(entry.created_at, ts);
    }

    #[test]
    fn test_timeline_order_newest_first() {
        let now = Utc::now();
        let older = (now - Duration::minutes(5), Uuid::new_v4());
        let newer = (now, Uuid::new_v4());
        assert_eq!(timeline_order(newer, older), Ordering::Less);
        assert_eq!(timeline_order(older, newer), Ordering::Greater);
    }

    #[test]
    fn test_timeline_order_breaks_ties_by_id_descending() {
        let now = Utc::now();
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        assert_eq!(timeline_order((now, high), (now, low)), Ordering::Less);
        assert_eq!(timeline_order((now, low), (now, high)), Ordering::Greater);
    }

    #[test]
    fn test_feed_item_view_camel_case() {
        let view = FeedItemView {
            post_id: Uuid::nil(),
            author_id: Uuid::nil(),
            content: "hi".to_string(),
            created_at: Utc::now(),
            is_read: false,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"postId\""));
        assert!(json.contains("\"isRead\""));
    }
}
