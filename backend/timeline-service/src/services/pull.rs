//! Pull-model timeline: assemble a page at read time instead of
//! materializing per-reader rows at write time.
//!
//! Kept alongside the push path for two reasons: it is the correctness
//! oracle for fan-out (both paths must converge on the same page for a
//! static data set), and it is the better trade for users who follow only
//! a handful of accounts. `estimate_complexity` quantifies that trade per
//! user.

use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{timeline_order, FeedItemView, FeedPage};
use crate::error::AppError;
use crate::repository::traits::{FollowStore, PostStore};

/// Average posts per followed account assumed by the cost estimate.
pub const AVG_POSTS_PER_FOLLOWEE: u64 = 50;

/// Below this following count the pull model stays cheap.
const PULL_ACCEPTABLE_BELOW: u64 = 50;
/// Below this count push is advisable; at or above it, strongly so.
const PUSH_RECOMMENDED_BELOW: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanoutRecommendation {
    PullAcceptable,
    PushRecommended,
    PushStronglyRecommended,
}

impl FanoutRecommendation {
    pub fn from_following_count(count: u64) -> Self {
        if count < PULL_ACCEPTABLE_BELOW {
            Self::PullAcceptable
        } else if count < PUSH_RECOMMENDED_BELOW {
            Self::PushRecommended
        } else {
            Self::PushStronglyRecommended
        }
    }
}

impl fmt::Display for FanoutRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PullAcceptable => "pull model acceptable at this scale",
            Self::PushRecommended => "push model recommended",
            Self::PushStronglyRecommended => "push model strongly recommended",
        };
        f.write_str(text)
    }
}

/// Per-user read-cost profile of the pull model.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityStats {
    pub user_id: Uuid,
    pub following_count: u64,
    pub estimated_posts_scanned: u64,
    pub time_complexity: String,
    pub recommendation: FanoutRecommendation,
}

pub struct PullTimelineService {
    follows: Arc<dyn FollowStore>,
    posts: Arc<dyn PostStore>,
}

impl PullTimelineService {
    pub fn new(follows: Arc<dyn FollowStore>, posts: Arc<dyn PostStore>) -> Self {
        Self { follows, posts }
    }

    /// Assemble one timeline page by scanning every followee's active
    /// posts. Same order as the push path: `created_at` descending, ties
    /// by post id descending.
    ///
    /// `total_count` is an approximation: the scan is bounded per
    /// request, so the reported total is `max(scanned, offset + returned)`
    /// rather than a full count. It never undercounts what has been
    /// paged through.
    pub async fn get_user_feed(
        &self,
        user_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<FeedPage, AppError> {
        if size == 0 {
            return Err(AppError::Validation("Page size must be positive".into()));
        }

        let followees = self.follows.followees_of(user_id).await?;
        let mut posts = self.posts.active_by_authors(&followees).await?;
        posts.sort_by(|a, b| timeline_order((a.created_at, a.id), (b.created_at, b.id)));

        let scanned = posts.len() as u64;
        let offset = page as u64 * size as u64;
        let items: Vec<FeedItemView> = posts
            .into_iter()
            .skip(offset as usize)
            .take(size as usize)
            .map(|post| FeedItemView {
                post_id: post.id,
                author_id: post.author_id,
                content: post.content,
                created_at: post.created_at,
                is_read: false,
            })
            .collect();

        let returned = items.len() as u64;
        let total_count = scanned.max(offset + returned);
        let has_more = offset + returned < total_count;

        Ok(FeedPage {
            items,
            page,
            size,
            total_count,
            has_more,
        })
    }

    /// Estimate what this user's reads cost under the pull model.
    pub async fn estimate_complexity(&self, user_id: Uuid) -> Result<ComplexityStats> {
        let following_count = self.follows.count_followees(user_id).await?;
        Ok(ComplexityStats {
            user_id,
            following_count,
            estimated_posts_scanned: following_count * AVG_POSTS_PER_FOLLOWEE,
            time_complexity: format!(
                "O(n * m): n = {} followees, m ~ {} posts each",
                following_count, AVG_POSTS_PER_FOLLOWEE
            ),
            recommendation: FanoutRecommendation::from_following_count(following_count),
        })
    }
}
