//! Events consumed by the fan-out dispatcher.
//!
//! The write path publishes these onto the in-process bounded queue after
//! its own store write commits; delivery is at-least-once from the
//! dispatcher's point of view, so handlers must tolerate redelivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::Post;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCreatedEvent {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Post> for PostCreatedEvent {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id,
            author_id: post.author_id,
            content: post.content.clone(),
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFollowedEvent {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedEvent {
    PostCreated(PostCreatedEvent),
    UserFollowed(UserFollowedEvent),
}

impl FeedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::PostCreated(_) => "post-created",
            FeedEvent::UserFollowed(_) => "user-followed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_post_copies_fields() {
        let post = Post::new(Uuid::new_v4(), "hello".to_string());
        let event = PostCreatedEvent::from(&post);
        assert_eq!(event.post_id, post.id);
        assert_eq!(event.author_id, post.author_id);
        assert_eq!(event.created_at, post.created_at);
    }

    #[test]
    fn test_event_round_trips_through_json() {
        let event = FeedEvent::UserFollowed(UserFollowedEvent {
            follower_id: Uuid::new_v4(),
            followee_id: Uuid::new_v4(),
            followed_at: Utc::now(),
        });
        let json = serde_json::to_string(&event).unwrap();
        let parsed: FeedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind(), "user-followed");
    }
}
