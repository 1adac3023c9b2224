//! Shared harness: a fully wired service over the in-memory store, with a
//! real worker pool draining the fan-out queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use timeline_service::cache::TimelineCache;
use timeline_service::repository::memory::MemoryStore;
use timeline_service::services::{ActiveUserFilter, PullTimelineService, TimelineService};
use timeline_service::workers::{channel, FanoutDispatcher, FanoutPool};

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<TimelineCache>,
    pub timeline: TimelineService,
    pub pull: PullTimelineService,
    pub dispatcher: Arc<FanoutDispatcher>,
    _pool: FanoutPool,
}

impl TestApp {
    /// Wire the full stack. `active_window_days` of `None` disables the
    /// active-user filter (fan out to every follower).
    pub fn spawn(active_window_days: Option<i64>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(TimelineCache::new(1024, 1024));
        let (bus, rx) = channel(256);

        let filter = match active_window_days {
            Some(days) => ActiveUserFilter::new(store.clone(), days, true),
            None => ActiveUserFilter::disabled(store.clone()),
        };
        let dispatcher = Arc::new(FanoutDispatcher::new(
            store.clone(),
            store.clone(),
            store.clone(),
            filter,
        ));
        let pool = FanoutPool::start(2, rx, dispatcher.clone());

        let timeline = TimelineService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            cache.clone(),
            bus,
        );
        let pull = PullTimelineService::new(store.clone(), store.clone());

        Self {
            store,
            cache,
            timeline,
            pull,
            dispatcher,
            _pool: pool,
        }
    }
}

/// Poll `check` until it returns true or five seconds pass. Panics with
/// `what` on timeout. Keeps convergence tests free of fixed sleeps.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
