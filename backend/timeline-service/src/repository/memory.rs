//! In-memory store implementing all four store traits over one shared
//! state. Backs the hermetic test suites; the binary wires the Postgres
//! store instead.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::{timeline_order, FeedEntry, FeedItemView, FollowEdge, Post, User};
use crate::repository::traits::{FeedStore, FollowStore, PostStore, UserStore};

#[derive(Default)]
struct State {
    posts: HashMap<Uuid, Post>,
    follows: HashMap<(Uuid, Uuid), FollowEdge>,
    entries: Vec<FeedEntry>,
    // Uniqueness on (owner, post): the idempotency guard for redelivery.
    delivered: HashSet<(Uuid, Uuid)>,
    users: HashMap<Uuid, User>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl FollowStore for MemoryStore {
    async fn create(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.follows.contains_key(&(follower_id, followee_id)) {
            return Ok(false);
        }
        state.follows.insert(
            (follower_id, followee_id),
            FollowEdge {
                follower_id,
                followee_id,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.follows.remove(&(follower_id, followee_id)).is_some())
    }

    async fn exists(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.follows.contains_key(&(follower_id, followee_id)))
    }

    async fn followers_of(&self, followee_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .keys()
            .filter(|(_, followee)| *followee == followee_id)
            .map(|(follower, _)| *follower)
            .collect())
    }

    async fn followees_of(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .keys()
            .filter(|(follower, _)| *follower == follower_id)
            .map(|(_, followee)| *followee)
            .collect())
    }

    async fn count_followees(&self, follower_id: Uuid) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .keys()
            .filter(|(follower, _)| *follower == follower_id)
            .count() as u64)
    }
}

#[async_trait::async_trait]
impl PostStore for MemoryStore {
    async fn insert(&self, post: &Post) -> Result<()> {
        let mut state = self.state.write().await;
        state.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.posts.get(&id).cloned())
    }

    async fn active_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .values()
            .filter(|p| p.author_id == author_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn active_by_authors(&self, author_ids: &[Uuid]) -> Result<Vec<Post>> {
        let authors: HashSet<Uuid> = author_ids.iter().copied().collect();
        let state = self.state.read().await;
        Ok(state
            .posts
            .values()
            .filter(|p| authors.contains(&p.author_id) && p.is_active)
            .cloned()
            .collect())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.posts.get_mut(&id) {
            Some(post) => {
                post.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl FeedStore for MemoryStore {
    async fn append(&self, entries: &[FeedEntry]) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for entry in entries {
            if state.delivered.insert((entry.owner_id, entry.post_id)) {
                state.entries.push(entry.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn page_with_posts(
        &self,
        owner_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<FeedItemView>> {
        let state = self.state.read().await;
        let mut owned: Vec<&FeedEntry> = state
            .entries
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| timeline_order((a.created_at, a.id), (b.created_at, b.id)));

        let offset = page as usize * size as usize;
        Ok(owned
            .into_iter()
            .skip(offset)
            .take(size as usize)
            .filter_map(|entry| {
                state.posts.get(&entry.post_id).map(|post| FeedItemView {
                    post_id: entry.post_id,
                    author_id: entry.author_id,
                    content: post.content.clone(),
                    created_at: entry.created_at,
                    is_read: entry.is_read,
                })
            })
            .collect())
    }

    async fn delete_by_owner_and_author(&self, owner_id: Uuid, author_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        let removed_posts: Vec<Uuid> = state
            .entries
            .iter()
            .filter(|e| e.owner_id == owner_id && e.author_id == author_id)
            .map(|e| e.post_id)
            .collect();
        state
            .entries
            .retain(|e| !(e.owner_id == owner_id && e.author_id == author_id));
        for post_id in removed_posts {
            state.delivered.remove(&(owner_id, post_id));
        }
        Ok((before - state.entries.len()) as u64)
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        let owners: Vec<Uuid> = state
            .entries
            .iter()
            .filter(|e| e.post_id == post_id)
            .map(|e| e.owner_id)
            .collect();
        state.entries.retain(|e| e.post_id != post_id);
        for owner_id in owners {
            state.delivered.remove(&(owner_id, post_id));
        }
        Ok((before - state.entries.len()) as u64)
    }

    async fn count_by_owner(&self, owner_id: Uuid) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.entries.iter().filter(|e| e.owner_id == owner_id).count() as u64)
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn record_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .users
            .insert(id, User { id, last_active_at: at });
        Ok(())
    }

    async fn active_among(
        &self,
        ids: &[Uuid],
        cutoff: DateTime<Utc>,
    ) -> Result<HashSet<Uuid>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter(|id| {
                state
                    .users
                    .get(id)
                    .map(|u| u.last_active_at > cutoff)
                    .unwrap_or(false)
            })
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_follow_create_is_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(FollowStore::create(&store, a, b).await.unwrap());
        assert!(!FollowStore::create(&store, a, b).await.unwrap());
        assert!(store.exists(a, b).await.unwrap());
        assert!(!store.exists(b, a).await.unwrap());
    }

    #[tokio::test]
    async fn test_append_skips_duplicate_owner_post_pairs() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let post = Uuid::new_v4();
        let author = Uuid::new_v4();

        let first = FeedEntry::deliver(owner, post, author, Utc::now());
        let redelivered = FeedEntry::deliver(owner, post, author, Utc::now());

        assert_eq!(store.append(&[first]).await.unwrap(), 1);
        assert_eq!(store.append(&[redelivered]).await.unwrap(), 0);
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_page_orders_newest_first_with_post_content() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let author = Uuid::new_v4();
        let now = Utc::now();

        for i in 0..3 {
            let mut post = Post::new(author, format!("post {}", i));
            post.created_at = now - Duration::minutes(i);
            PostStore::insert(&store, &post).await.unwrap();
            store
                .append(&[FeedEntry::deliver(owner, post.id, author, post.created_at)])
                .await
                .unwrap();
        }

        let page = store.page_with_posts(owner, 0, 10).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].content, "post 0");
        assert_eq!(page[2].content, "post 2");
        assert!(page[0].created_at > page[1].created_at);
    }

    #[tokio::test]
    async fn test_delete_by_owner_and_author_leaves_other_authors() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        store
            .append(&[
                FeedEntry::deliver(owner, Uuid::new_v4(), a, now),
                FeedEntry::deliver(owner, Uuid::new_v4(), a, now),
                FeedEntry::deliver(owner, Uuid::new_v4(), b, now),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_owner_and_author(owner, a).await.unwrap(), 2);
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_owner_and_author_allows_redelivery() {
        // Removing entries must also release the (owner, post) pairs so a
        // refollow's backfill can insert them again.
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let author = Uuid::new_v4();
        let post = Uuid::new_v4();
        let now = Utc::now();

        store
            .append(&[FeedEntry::deliver(owner, post, author, now)])
            .await
            .unwrap();
        store.delete_by_owner_and_author(owner, author).await.unwrap();

        assert_eq!(
            store
                .append(&[FeedEntry::deliver(owner, post, author, now)])
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_active_among_excludes_unknown_and_stale_users() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let fresh = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let unknown = Uuid::new_v4();

        store.record_activity(fresh, now).await.unwrap();
        store
            .record_activity(stale, now - Duration::days(30))
            .await
            .unwrap();

        let active = store
            .active_among(&[fresh, stale, unknown], now - Duration::days(10))
            .await
            .unwrap();
        assert!(active.contains(&fresh));
        assert!(!active.contains(&stale));
        assert!(!active.contains(&unknown));
    }
}
