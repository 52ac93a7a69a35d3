//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with a connection pool; the schema lives in ./migrations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}", path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            // Cascade deletes rely on referential integrity being enforced
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// Returns `Conflict` if the username is already taken.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("username '{}' is already taken", user.username))
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get or create a password-less account by fixed username.
    ///
    /// Used for the shared guest account that anonymous writes are
    /// attributed to. INSERT OR IGNORE plus re-select survives concurrent
    /// first use: the unique index on username makes one insert win and
    /// both callers then read the same row.
    pub async fn get_or_create_user(&self, username: &str) -> Result<User, AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO users (id, username, password_hash, created_at) \
             VALUES (?, ?, NULL, ?)",
        )
        .bind(EntityId::new().0)
        .bind(username)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user '{username}' vanished after get-or-create")))
    }

    /// Get all users ordered by id
    pub async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a new post
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query("INSERT INTO posts (id, author_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&post.id)
            .bind(&post.author_id)
            .bind(&post.content)
            .bind(post.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get post by ID
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, author_id, content, created_at FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Get post by ID with derived like/comment counts
    pub async fn get_post_with_counts(&self, id: &str) -> Result<Option<PostWithCounts>, AppError> {
        let post = sqlx::query_as::<_, PostWithCounts>(
            "SELECT p.id, p.author_id, u.username AS author_username, p.content, p.created_at, \
                    (SELECT COUNT(*) FROM likes WHERE post_id = p.id) AS like_count, \
                    (SELECT COUNT(*) FROM comments WHERE post_id = p.id) AS comment_count \
             FROM posts p JOIN users u ON p.author_id = u.id \
             WHERE p.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Get all posts, newest first, with derived counts
    pub async fn get_posts_with_counts(&self) -> Result<Vec<PostWithCounts>, AppError> {
        let posts = sqlx::query_as::<_, PostWithCounts>(
            "SELECT p.id, p.author_id, u.username AS author_username, p.content, p.created_at, \
                    (SELECT COUNT(*) FROM likes WHERE post_id = p.id) AS like_count, \
                    (SELECT COUNT(*) FROM comments WHERE post_id = p.id) AS comment_count \
             FROM posts p JOIN users u ON p.author_id = u.id \
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Delete a post
    ///
    /// Cascades to its comments and likes via foreign keys.
    pub async fn delete_post(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a new comment
    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, parent_id, author_id, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.parent_id)
        .bind(&comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get comment by ID
    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, parent_id, author_id, content, created_at \
             FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    /// Get all comments for one post in timestamp order with like counts.
    ///
    /// This is the flat input the tree builder reconstructs the forest
    /// from; id breaks timestamp ties so the order is deterministic.
    pub async fn get_comments_for_post(
        &self,
        post_id: &str,
    ) -> Result<Vec<CommentWithCount>, AppError> {
        let comments = sqlx::query_as::<_, CommentWithCount>(
            "SELECT c.id, c.post_id, c.parent_id, c.author_id, \
                    u.username AS author_username, c.content, c.created_at, \
                    (SELECT COUNT(*) FROM likes WHERE comment_id = c.id) AS like_count \
             FROM comments c JOIN users u ON c.author_id = u.id \
             WHERE c.post_id = ? \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    /// Delete a comment
    ///
    /// Cascades to its replies and likes via foreign keys.
    pub async fn delete_comment(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Toggle a like for (user, target).
    ///
    /// Runs as read-then-act inside one transaction: delete if a row
    /// exists, insert otherwise. The partial unique index on
    /// (user, target) is the authority for races: a losing concurrent
    /// insert hits the constraint and is resolved locally by falling back
    /// to delete, never surfaced as an error.
    pub async fn toggle_like(
        &self,
        user_id: &str,
        target: LikeTarget<'_>,
    ) -> Result<LikeOutcome, AppError> {
        let column = target.column();

        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(&format!(
            "SELECT id FROM likes WHERE user_id = ? AND {column} = ?"
        ))
        .bind(user_id)
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(like_id) = existing {
            sqlx::query("DELETE FROM likes WHERE id = ?")
                .bind(&like_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(LikeOutcome::Unliked);
        }

        let insert = sqlx::query(&format!(
            "INSERT INTO likes (id, user_id, {column}, created_at) VALUES (?, ?, ?, ?)"
        ))
        .bind(EntityId::new().0)
        .bind(user_id)
        .bind(target.id())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {
                tx.commit().await?;
                Ok(LikeOutcome::Liked)
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost the create race: the row already exists, so this
                // toggle resolves to unlike.
                tx.rollback().await?;
                sqlx::query(&format!(
                    "DELETE FROM likes WHERE user_id = ? AND {column} = ?"
                ))
                .bind(user_id)
                .bind(target.id())
                .execute(&self.pool)
                .await?;
                Ok(LikeOutcome::Unliked)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a user has liked a target
    pub async fn has_liked(&self, user_id: &str, target: LikeTarget<'_>) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM likes WHERE user_id = ? AND {} = ?",
            target.column()
        ))
        .bind(user_id)
        .bind(target.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Get the subset of `post_ids` that `user_id` has liked
    pub async fn get_liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query_builder =
            QueryBuilder::<Sqlite>::new("SELECT post_id FROM likes WHERE user_id = ");
        query_builder.push_bind(user_id);
        query_builder.push(" AND post_id IN (");
        let mut separated = query_builder.separated(", ");
        for post_id in post_ids {
            separated.push_bind(post_id);
        }
        separated.push_unseparated(")");

        let ids = query_builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().collect())
    }

    /// Get ids of comments on `post_id` that `user_id` has liked
    pub async fn get_liked_comment_ids(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<HashSet<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT comment_id FROM likes \
             WHERE user_id = ? \
               AND comment_id IN (SELECT id FROM comments WHERE post_id = ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    #[cfg(test)]
    pub async fn set_like_created_at_for_test(
        &self,
        user_id: &str,
        target: LikeTarget<'_>,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(&format!(
            "UPDATE likes SET created_at = ? WHERE user_id = ? AND {} = ?",
            target.column()
        ))
        .bind(created_at)
        .bind(user_id)
        .bind(target.id())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Karma
    // =========================================================================

    /// Count likes received on posts authored by `author_id`.
    ///
    /// `since` filters by like creation timestamp; None counts all-time.
    /// Likes the author created themselves are never included, only
    /// likes on targets they authored.
    pub async fn count_post_likes_received(
        &self,
        author_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, AppError> {
        let count = match since {
            Some(cutoff) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM likes l \
                     JOIN posts p ON l.post_id = p.id \
                     WHERE p.author_id = ? AND l.created_at >= ?",
                )
                .bind(author_id)
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM likes l \
                     JOIN posts p ON l.post_id = p.id \
                     WHERE p.author_id = ?",
                )
                .bind(author_id)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(count)
    }

    /// Count likes received on comments authored by `author_id`.
    pub async fn count_comment_likes_received(
        &self,
        author_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, AppError> {
        let count = match since {
            Some(cutoff) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM likes l \
                     JOIN comments c ON l.comment_id = c.id \
                     WHERE c.author_id = ? AND l.created_at >= ?",
                )
                .bind(author_id)
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM likes l \
                     JOIN comments c ON l.comment_id = c.id \
                     WHERE c.author_id = ?",
                )
                .bind(author_id)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(count)
    }

    /// Aggregate leaderboard query.
    ///
    /// One grouped pass over all likes joined to their target's author,
    /// weighted per target kind. Users with zero recent karma are
    /// excluded; ordering is recent karma descending with ascending user
    /// id as the tiebreak. Must produce the same output as computing
    /// karma per user and sorting in memory.
    pub async fn get_leaderboard_rows(
        &self,
        cutoff: DateTime<Utc>,
        post_weight: i64,
        comment_weight: i64,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT u.id, u.username, \
                    COALESCE(SUM(CASE WHEN k.created_at >= ? THEN k.weight ELSE 0 END), 0) AS recent_karma, \
                    COALESCE(SUM(k.weight), 0) AS total_karma \
             FROM users u \
             JOIN (SELECT p.author_id AS author_id, l.created_at AS created_at, ? AS weight \
                   FROM likes l JOIN posts p ON l.post_id = p.id \
                   UNION ALL \
                   SELECT c.author_id, l.created_at, ? \
                   FROM likes l JOIN comments c ON l.comment_id = c.id) k \
               ON k.author_id = u.id \
             GROUP BY u.id, u.username \
             HAVING recent_karma > 0 \
             ORDER BY recent_karma DESC, u.id ASC \
             LIMIT ?",
        )
        .bind(cutoff)
        .bind(post_weight)
        .bind(comment_weight)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
