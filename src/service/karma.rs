//! Karma service
//!
//! Aggregates weighted like counts received by a user and ranks the
//! leaderboard. Karma counts likes *received* on a user's posts and
//! comments, never likes the user created.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::data::{Database, LeaderboardRow};
use crate::error::AppError;

/// Karma earned per like received on a post
pub const POST_LIKE_WEIGHT: i64 = 5;
/// Karma earned per like received on a comment
pub const COMMENT_LIKE_WEIGHT: i64 = 1;
/// Rolling window for "recent" karma, in hours
pub const RECENT_WINDOW_HOURS: i64 = 24;
/// Maximum number of leaderboard entries returned
pub const LEADERBOARD_LIMIT: usize = 5;

/// Weighted karma for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KarmaSummary {
    pub recent_karma: i64,
    pub total_karma: i64,
}

/// Cutoff timestamp for the recent-karma window
pub fn recent_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::hours(RECENT_WINDOW_HOURS)
}

/// Karma service
pub struct KarmaService {
    db: Arc<Database>,
}

impl KarmaService {
    /// Create new karma service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Weighted likes received by `user_id`, optionally since a cutoff.
    ///
    /// Computed with counting queries; like rows are never loaded into
    /// memory.
    async fn weighted_karma(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, AppError> {
        let post_likes = self.db.count_post_likes_received(user_id, since).await?;
        let comment_likes = self
            .db
            .count_comment_likes_received(user_id, since)
            .await?;

        Ok(post_likes * POST_LIKE_WEIGHT + comment_likes * COMMENT_LIKE_WEIGHT)
    }

    /// Compute karma for a user.
    ///
    /// `cutoff` bounds the recent window; with no cutoff, recent karma
    /// equals total karma. Always `recent_karma <= total_karma`.
    pub async fn karma(
        &self,
        user_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<KarmaSummary, AppError> {
        let total_karma = self.weighted_karma(user_id, None).await?;
        let recent_karma = match cutoff {
            Some(cutoff) => self.weighted_karma(user_id, Some(cutoff)).await?,
            None => total_karma,
        };

        Ok(KarmaSummary {
            recent_karma,
            total_karma,
        })
    }

    /// Karma with the standard 24-hour recent window
    pub async fn summary(&self, user_id: &str) -> Result<KarmaSummary, AppError> {
        self.karma(user_id, Some(recent_cutoff())).await
    }

    /// Top users by recent karma.
    ///
    /// Fixed 24-hour window. Users with zero recent karma are excluded;
    /// ties break by ascending user id (ULIDs, so effectively signup
    /// order). At most [`LEADERBOARD_LIMIT`] entries. One aggregate query
    /// instead of a per-user scan, with identical output.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardRow>, AppError> {
        self.db
            .get_leaderboard_rows(
                recent_cutoff(),
                POST_LIKE_WEIGHT,
                COMMENT_LIKE_WEIGHT,
                LEADERBOARD_LIMIT,
            )
            .await
    }
}
