//! Comment service
//!
//! Handles comment creation, deletion, like toggling and the
//! reconstruction of the per-post comment tree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::{
    Comment, CommentWithCount, Database, EntityId, LikeOutcome, LikeTarget, User,
};
use crate::error::AppError;
use crate::metrics::{COMMENTS_CREATED_TOTAL, LIKE_TOGGLES_TOTAL};

const MAX_COMMENT_CHARS: usize = 2000;

/// One node of the reconstructed comment tree
///
/// `like_count` is derived at read time and `user_has_liked` reflects the
/// requesting principal; `replies` preserves timestamp order.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author: CommentAuthor,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub user_has_liked: bool,
    pub replies: Vec<CommentNode>,
}

/// Author reference embedded in a comment node
#[derive(Debug, Clone, Serialize)]
pub struct CommentAuthor {
    pub id: String,
    pub username: String,
}

/// Comment service
pub struct CommentService {
    db: Arc<Database>,
}

impl CommentService {
    /// Create new comment service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new comment
    ///
    /// The parent, if given, must exist and belong to the same post.
    /// Since a parent must already be persisted, cycles cannot be
    /// constructed through this path.
    pub async fn create(
        &self,
        author: &User,
        post_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<Comment, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "comment content is required".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::Validation(format!(
                "comment content must be at most {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        self.db
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .db
                .get_comment(parent_id)
                .await?
                .ok_or(AppError::NotFound)?;
            if parent.post_id != post_id {
                return Err(AppError::Validation(
                    "parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let comment = Comment {
            id: EntityId::new().0,
            post_id: post_id.to_string(),
            parent_id: parent_id.map(ToOwned::to_owned),
            author_id: author.id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.db.insert_comment(&comment).await?;
        COMMENTS_CREATED_TOTAL.inc();

        tracing::debug!(
            comment_id = %comment.id,
            post_id = %post_id,
            author = %author.username,
            "Comment created"
        );

        Ok(comment)
    }

    /// Delete a comment
    ///
    /// Only the author may delete; cascades to replies and likes.
    pub async fn delete(&self, actor: &User, id: &str) -> Result<(), AppError> {
        let comment = self.db.get_comment(id).await?.ok_or(AppError::NotFound)?;
        if comment.author_id != actor.id {
            return Err(AppError::Forbidden);
        }

        self.db.delete_comment(id).await?;
        tracing::debug!(comment_id = %id, "Comment deleted");

        Ok(())
    }

    /// Toggle a like on a comment for the acting user
    pub async fn toggle_like(&self, user: &User, id: &str) -> Result<LikeOutcome, AppError> {
        self.db.get_comment(id).await?.ok_or(AppError::NotFound)?;

        let target = LikeTarget::Comment(id);
        let outcome = self.db.toggle_like(&user.id, target).await?;
        LIKE_TOGGLES_TOTAL
            .with_label_values(&[target.kind(), outcome.as_str()])
            .inc();

        Ok(outcome)
    }

    /// Reconstruct the comment tree for one post.
    ///
    /// Fetches every comment for the post in one query (timestamp order,
    /// like counts included) plus one batched lookup of the viewer's
    /// likes, then assembles the forest in memory. Pure read; no side
    /// effects.
    pub async fn comment_tree(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<CommentNode>, AppError> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let rows = self.db.get_comments_for_post(post_id).await?;
        let liked = match viewer_id {
            Some(user_id) => self.db.get_liked_comment_ids(user_id, post_id).await?,
            None => HashSet::new(),
        };

        Ok(build_comment_tree(rows, &liked))
    }
}

/// Assemble the comment forest from a flat, timestamp-ordered row set.
///
/// Single O(n) pass: roots keep input order, children are grouped per
/// parent in input order, then attached recursively. A comment whose
/// parent is not in the input set is dropped entirely, not promoted to
/// root. Consuming each child group exactly once also means a malformed
/// cyclic group simply disappears instead of looping.
fn build_comment_tree(rows: Vec<CommentWithCount>, liked: &HashSet<String>) -> Vec<CommentNode> {
    let known_ids: HashSet<String> = rows.iter().map(|row| row.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<CommentWithCount>> = HashMap::new();

    for row in rows {
        match &row.parent_id {
            None => roots.push(row),
            Some(parent_id) if known_ids.contains(parent_id) => {
                children.entry(parent_id.clone()).or_default().push(row);
            }
            // Orphan: parent missing from the set (other post, or deleted
            // concurrently). Dropped.
            Some(_) => {}
        }
    }

    roots
        .into_iter()
        .map(|row| attach_replies(row, &mut children, liked))
        .collect()
}

fn attach_replies(
    row: CommentWithCount,
    children: &mut HashMap<String, Vec<CommentWithCount>>,
    liked: &HashSet<String>,
) -> CommentNode {
    let replies = children
        .remove(&row.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_replies(child, children, liked))
        .collect();

    CommentNode {
        user_has_liked: liked.contains(&row.id),
        id: row.id,
        post_id: row.post_id,
        parent_id: row.parent_id,
        author: CommentAuthor {
            id: row.author_id,
            username: row.author_username,
        },
        content: row.content,
        created_at: row.created_at,
        like_count: row.like_count,
        replies,
    }
}
