//! Data models
//!
//! Rust structs representing database entities and annotated read rows.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
///
/// ULIDs sort lexicographically in creation order, which makes ascending-id
/// tiebreaks deterministic wherever timestamps collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered account (or the shared guest account)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Salted HMAC-SHA256 hash; None for accounts that cannot log in
    /// (the guest account has no password)
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Post
// =============================================================================

/// A top-level feed post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    /// Immutable, set at creation
    pub created_at: DateTime<Utc>,
}

/// A post row annotated with derived counts for feed reads.
///
/// `like_count` and `comment_count` are computed by the query,
/// never stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostWithCounts {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
}

// =============================================================================
// Comment
// =============================================================================

/// A comment on a post
///
/// `parent_id` is None for a root comment. Replies always carry the
/// `post_id` of the post they ultimately belong to.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A comment row annotated with its derived like count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithCount {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
}

// =============================================================================
// Like
// =============================================================================

/// A like on a post or a comment
///
/// Exactly one of `post_id`/`comment_id` is set (checked by the schema).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Target of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget<'a> {
    Post(&'a str),
    Comment(&'a str),
}

impl LikeTarget<'_> {
    /// Column in the likes table that holds this target's id
    pub fn column(&self) -> &'static str {
        match self {
            Self::Post(_) => "post_id",
            Self::Comment(_) => "comment_id",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Post(id) | Self::Comment(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::Comment(_) => "comment",
        }
    }
}

/// Outcome of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    Unliked,
}

impl LikeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Unliked => "unliked",
        }
    }
}

// =============================================================================
// Leaderboard
// =============================================================================

/// One aggregated leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub id: String,
    pub username: String,
    pub recent_karma: i64,
    pub total_karma: i64,
}
