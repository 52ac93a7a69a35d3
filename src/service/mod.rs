//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database operations.

mod comment;
mod karma;
mod post;

pub use comment::{CommentAuthor, CommentNode, CommentService};
pub use karma::{
    COMMENT_LIKE_WEIGHT, KarmaService, KarmaSummary, LEADERBOARD_LIMIT, POST_LIKE_WEIGHT,
    RECENT_WINDOW_HOURS, recent_cutoff,
};
pub use post::PostService;
