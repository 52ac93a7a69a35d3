//! Post service
//!
//! Handles post operations including create, list, delete and
//! like toggling.

use std::collections::HashSet;
use std::sync::Arc;

use crate::data::{Database, EntityId, LikeOutcome, LikeTarget, Post, PostWithCounts, User};
use crate::error::AppError;
use crate::metrics::{LIKE_TOGGLES_TOTAL, POSTS_CREATED_TOTAL};

const MAX_POST_CHARS: usize = 5000;

/// Post service
pub struct PostService {
    db: Arc<Database>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new post
    ///
    /// # Arguments
    /// * `author` - Resolved acting principal (may be the guest account)
    /// * `content` - Post body, trimmed; must be non-empty
    pub async fn create(&self, author: &User, content: &str) -> Result<Post, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("post content is required".to_string()));
        }
        if content.chars().count() > MAX_POST_CHARS {
            return Err(AppError::Validation(format!(
                "post content must be at most {} characters",
                MAX_POST_CHARS
            )));
        }

        let post = Post {
            id: EntityId::new().0,
            author_id: author.id.clone(),
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };

        self.db.insert_post(&post).await?;
        POSTS_CREATED_TOTAL.inc();

        tracing::debug!(post_id = %post.id, author = %author.username, "Post created");

        Ok(post)
    }

    /// Get post by ID with derived counts
    pub async fn get_with_counts(&self, id: &str) -> Result<PostWithCounts, AppError> {
        self.db
            .get_post_with_counts(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// List all posts, newest first, with derived counts
    pub async fn list_with_counts(&self) -> Result<Vec<PostWithCounts>, AppError> {
        self.db.get_posts_with_counts().await
    }

    /// Which of `post_ids` the viewer has liked.
    ///
    /// One batched lookup; anonymous viewers have liked nothing.
    pub async fn liked_post_ids(
        &self,
        viewer_id: Option<&str>,
        post_ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        match viewer_id {
            Some(user_id) => self.db.get_liked_post_ids(user_id, post_ids).await,
            None => Ok(HashSet::new()),
        }
    }

    /// Delete a post
    ///
    /// Only the author may delete; cascades to comments and likes.
    pub async fn delete(&self, actor: &User, id: &str) -> Result<(), AppError> {
        let post = self.db.get_post(id).await?.ok_or(AppError::NotFound)?;
        if post.author_id != actor.id {
            return Err(AppError::Forbidden);
        }

        self.db.delete_post(id).await?;
        tracing::debug!(post_id = %id, "Post deleted");

        Ok(())
    }

    /// Toggle a like on a post for the acting user
    pub async fn toggle_like(&self, user: &User, id: &str) -> Result<LikeOutcome, AppError> {
        // Verify the target exists so a vanished post is NotFound, not a
        // foreign key error.
        self.db.get_post(id).await?.ok_or(AppError::NotFound)?;

        let target = LikeTarget::Post(id);
        let outcome = self.db.toggle_like(&user.id, target).await?;
        LIKE_TOGGLES_TOTAL
            .with_label_values(&[target.kind(), outcome.as_str()])
            .inc();

        Ok(outcome)
    }
}
