//! Active-user policy for fan-out narrowing.
//!
//! Classifying a user as active is a pure function of (user, now, window).
//! The filter only reduces write amplification; skipping an inactive
//! follower never breaks eventual convergence, it just means that
//! follower's timeline stays empty for this author until the next post.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::User;
use crate::repository::traits::UserStore;

/// Whether `user` was active strictly within `window` of `now`.
pub fn is_active(user: &User, now: DateTime<Utc>, window: Duration) -> bool {
    user.last_active_at > now - window
}

/// Policy layer narrowing fan-out targets to recently-active users.
#[derive(Clone)]
pub struct ActiveUserFilter {
    users: Arc<dyn UserStore>,
    window: Duration,
    enabled: bool,
}

impl ActiveUserFilter {
    pub fn new(users: Arc<dyn UserStore>, window_days: i64, enabled: bool) -> Self {
        Self {
            users,
            window: Duration::days(window_days),
            enabled,
        }
    }

    /// A filter that keeps every candidate (fan-out to all followers).
    pub fn disabled(users: Arc<dyn UserStore>) -> Self {
        Self::new(users, 0, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Narrow a candidate set to its active members; identity when the
    /// policy is disabled. Preserves input order.
    pub async fn retain_active(&self, ids: Vec<Uuid>, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        if !self.enabled {
            return Ok(ids);
        }
        let active = self.users.active_among(&ids, now - self.window).await?;
        Ok(ids.into_iter().filter(|id| active.contains(id)).collect())
    }

    /// Single-user check used to skip backfill entirely. Users with no
    /// activity record count as inactive.
    pub async fn is_user_active(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        if !self.enabled {
            return Ok(true);
        }
        let active = self.users.active_among(&[id], now - self.window).await?;
        Ok(active.contains(&id))
    }
}
