//! API response DTOs
//!
//! Response shapes follow the original web client's contract: feed and
//! leaderboard payloads use snake_case, while the session user payload
//! (login / me) uses camelCase karma fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{LeaderboardRow, PostWithCounts};
use crate::service::KarmaSummary;

/// Minimal user reference embedded in feed responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

/// A post with derived counts for the viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub author: UserResponse,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
    pub user_has_liked: bool,
}

impl PostResponse {
    pub fn from_row(row: PostWithCounts, user_has_liked: bool) -> Self {
        Self {
            id: row.id,
            author: UserResponse {
                id: row.author_id,
                username: row.author_username,
            },
            content: row.content,
            created_at: row.created_at,
            like_count: row.like_count,
            comment_count: row.comment_count,
            user_has_liked,
        }
    }
}

/// Result of a like toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeToggleResponse {
    pub status: String,
}

/// One leaderboard entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub username: String,
    pub recent_karma: i64,
    pub total_karma: i64,
}

impl From<LeaderboardRow> for LeaderboardEntry {
    fn from(row: LeaderboardRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            recent_karma: row.recent_karma,
            total_karma: row.total_karma,
        }
    }
}

/// Session user payload returned by login and `me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUserResponse {
    /// None for anonymous viewers
    pub id: Option<String>,
    pub username: String,
    pub avatar: String,
    #[serde(rename = "recentKarma")]
    pub recent_karma: i64,
    #[serde(rename = "totalKarma")]
    pub total_karma: i64,
}

impl SessionUserResponse {
    pub fn for_user(id: String, username: &str, karma: KarmaSummary) -> Self {
        Self {
            id: Some(id),
            avatar: avatar_url(username),
            username: username.to_string(),
            recent_karma: karma.recent_karma,
            total_karma: karma.total_karma,
        }
    }

    /// Placeholder payload for unauthenticated viewers
    pub fn anonymous(guest_username: &str) -> Self {
        Self {
            id: None,
            avatar: avatar_url(guest_username),
            username: guest_username.to_string(),
            recent_karma: 0,
            total_karma: 0,
        }
    }
}

/// Derived avatar URL; avatars are never stored
pub fn avatar_url(username: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={username}")
}
