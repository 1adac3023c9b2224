//! Fan-out dispatcher and worker pool.
//!
//! The write path publishes `FeedEvent`s onto a bounded in-process queue
//! and returns; a fixed pool of workers drains the queue and performs the
//! bulk timeline writes. Each event is handled by exactly one worker;
//! distinct events interleave freely across workers. The dispatcher never
//! retries: the queue is an at-least-once substrate, and the feed store's
//! (owner, post) uniqueness makes redelivery harmless.
//!
//! Worker failures are logged and swallowed: the triggering request has
//! already returned, so there is no caller to surface them to.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::events::{FeedEvent, PostCreatedEvent, UserFollowedEvent};
use crate::domain::models::FeedEntry;
use crate::repository::traits::{FeedStore, FollowStore, PostStore};
use crate::services::activity::ActiveUserFilter;

/// Sender half of the fan-out queue, held by the write path.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<FeedEvent>,
}

impl EventBus {
    /// Publish an event for asynchronous fan-out. Suspends briefly when
    /// the queue is full (backpressure); errors only if the worker pool
    /// is gone.
    pub async fn publish(&self, event: FeedEvent) -> Result<()> {
        let kind = event.kind();
        self.tx
            .send(event)
            .await
            .with_context(|| format!("fan-out queue closed, {} event dropped", kind))
    }
}

/// Build the bounded queue connecting the write path to the worker pool.
pub fn channel(capacity: usize) -> (EventBus, mpsc::Receiver<FeedEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventBus { tx }, rx)
}

/// The fan-out engine: consumes post-created and user-followed events and
/// materializes followers' timelines in bulk.
pub struct FanoutDispatcher {
    follows: Arc<dyn FollowStore>,
    posts: Arc<dyn PostStore>,
    feeds: Arc<dyn FeedStore>,
    filter: ActiveUserFilter,
}

impl FanoutDispatcher {
    pub fn new(
        follows: Arc<dyn FollowStore>,
        posts: Arc<dyn PostStore>,
        feeds: Arc<dyn FeedStore>,
        filter: ActiveUserFilter,
    ) -> Self {
        Self {
            follows,
            posts,
            feeds,
            filter,
        }
    }

    pub async fn dispatch(&self, event: FeedEvent) -> Result<()> {
        match event {
            FeedEvent::PostCreated(event) => self.on_post_created(&event).await,
            FeedEvent::UserFollowed(event) => self.on_user_followed(&event).await,
        }
    }

    /// Deliver a freshly persisted post to its author's followers.
    pub async fn on_post_created(&self, event: &PostCreatedEvent) -> Result<()> {
        let followers = self.follows.followers_of(event.author_id).await?;
        if followers.is_empty() {
            debug!("No followers to notify for post {}", event.post_id);
            return Ok(());
        }

        let total = followers.len();
        let recipients = self.filter.retain_active(followers, Utc::now()).await?;
        if recipients.is_empty() {
            info!(
                "Post {} fan-out skipped: none of {} followers are active",
                event.post_id, total
            );
            return Ok(());
        }

        let entries: Vec<FeedEntry> = recipients
            .iter()
            .map(|follower| {
                FeedEntry::deliver(*follower, event.post_id, event.author_id, event.created_at)
            })
            .collect();

        let inserted = self.feeds.append(&entries).await?;
        info!(
            "Fan-out for post {}: {} of {} followers materialized ({} new rows)",
            event.post_id,
            recipients.len(),
            total,
            inserted
        );
        Ok(())
    }

    /// Backfill a new follower's timeline with the followee's history.
    pub async fn on_user_followed(&self, event: &UserFollowedEvent) -> Result<()> {
        if !self
            .filter
            .is_user_active(event.follower_id, Utc::now())
            .await?
        {
            info!(
                "Backfill skipped: follower {} has no recent activity",
                event.follower_id
            );
            return Ok(());
        }

        let posts = self.posts.active_by_author(event.followee_id).await?;
        if posts.is_empty() {
            debug!("No posts to backfill from {}", event.followee_id);
            return Ok(());
        }

        let entries: Vec<FeedEntry> = posts
            .iter()
            .map(|post| {
                FeedEntry::deliver(event.follower_id, post.id, post.author_id, post.created_at)
            })
            .collect();

        let inserted = self.feeds.append(&entries).await?;
        info!(
            "Backfill for follower {}: {} posts from {} ({} new rows)",
            event.follower_id,
            entries.len(),
            event.followee_id,
            inserted
        );
        Ok(())
    }
}

/// Bounded pool of fan-out workers draining one shared receiver.
pub struct FanoutPool {
    handles: Vec<JoinHandle<()>>,
}

impl FanoutPool {
    pub fn start(
        workers: usize,
        rx: mpsc::Receiver<FeedEvent>,
        dispatcher: Arc<FanoutDispatcher>,
    ) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    info!("Fan-out worker {} started", worker);
                    loop {
                        // Hold the lock only for the recv itself so other
                        // workers can pick up the next event concurrently.
                        let event = { rx.lock().await.recv().await };
                        match event {
                            Some(event) => {
                                let kind = event.kind();
                                if let Err(err) = dispatcher.dispatch(event).await {
                                    warn!(
                                        "Fan-out worker {} failed on {} event: {:#}",
                                        worker, kind, err
                                    );
                                }
                            }
                            None => break,
                        }
                    }
                    info!("Fan-out worker {} stopped", worker);
                })
            })
            .collect();
        Self { handles }
    }

    /// Wait for all workers to drain and exit. Returns once every sender
    /// has been dropped and the queue is empty.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
