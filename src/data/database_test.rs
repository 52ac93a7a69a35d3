//! Database tests

use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn create_user(db: &Database, username: &str) -> User {
    let user = User {
        id: EntityId::new().0,
        username: username.to_string(),
        password_hash: Some("salt$tag".to_string()),
        created_at: Utc::now(),
    };
    db.insert_user(&user).await.unwrap();
    user
}

async fn create_post(db: &Database, author: &User, content: &str) -> Post {
    let post = Post {
        id: EntityId::new().0,
        author_id: author.id.clone(),
        content: content.to_string(),
        created_at: Utc::now(),
    };
    db.insert_post(&post).await.unwrap();
    post
}

async fn create_comment(
    db: &Database,
    author: &User,
    post: &Post,
    parent_id: Option<&str>,
) -> Comment {
    let comment = Comment {
        id: EntityId::new().0,
        post_id: post.id.clone(),
        parent_id: parent_id.map(ToOwned::to_owned),
        author_id: author.id.clone(),
        content: "a comment".to_string(),
        created_at: Utc::now(),
    };
    db.insert_comment(&comment).await.unwrap();
    comment
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_user_insert_and_get() {
    let (db, _temp_dir) = create_test_db().await;

    let user = create_user(&db, "alice").await;

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");

    let by_name = db.get_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, user.id);

    assert!(db.get_user("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let (db, _temp_dir) = create_test_db().await;

    create_user(&db, "alice").await;

    let duplicate = User {
        id: EntityId::new().0,
        username: "alice".to_string(),
        password_hash: None,
        created_at: Utc::now(),
    };
    let result = db.insert_user(&duplicate).await;
    assert!(matches!(result, Err(crate::error::AppError::Conflict(_))));
}

#[tokio::test]
async fn test_get_or_create_user_is_stable() {
    let (db, _temp_dir) = create_test_db().await;

    let first = db.get_or_create_user("guest").await.unwrap();
    let second = db.get_or_create_user("guest").await.unwrap();

    // Same row both times; no duplicate guest accounts
    assert_eq!(first.id, second.id);
    assert!(first.password_hash.is_none());
}

#[tokio::test]
async fn test_post_crud_with_counts() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello world").await;

    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    create_comment(&db, &bob, &post, None).await;

    let row = db.get_post_with_counts(&post.id).await.unwrap().unwrap();
    assert_eq!(row.author_username, "alice");
    assert_eq!(row.like_count, 1);
    assert_eq!(row.comment_count, 1);

    let all = db.get_posts_with_counts().await.unwrap();
    assert_eq!(all.len(), 1);

    db.delete_post(&post.id).await.unwrap();
    assert!(db.get_post(&post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_posts_listed_newest_first() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let first = create_post(&db, &alice, "first").await;
    let second = create_post(&db, &alice, "second").await;

    let all = db.get_posts_with_counts().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, second.id);
    assert_eq!(all[1].id, first.id);
}

#[tokio::test]
async fn test_delete_post_cascades_to_comments_and_likes() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;
    let comment = create_comment(&db, &bob, &post, None).await;
    db.toggle_like(&alice.id, LikeTarget::Comment(&comment.id))
        .await
        .unwrap();
    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();

    db.delete_post(&post.id).await.unwrap();

    assert!(db.get_comment(&comment.id).await.unwrap().is_none());
    assert!(
        !db.has_liked(&alice.id, LikeTarget::Comment(&comment.id))
            .await
            .unwrap()
    );
    assert!(
        !db.has_liked(&bob.id, LikeTarget::Post(&post.id))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_delete_parent_comment_cascades_to_replies() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let post = create_post(&db, &alice, "hello").await;
    let parent = create_comment(&db, &alice, &post, None).await;
    let reply = create_comment(&db, &alice, &post, Some(&parent.id)).await;

    db.delete_comment(&parent.id).await.unwrap();

    assert!(db.get_comment(&reply.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_comments_for_post_in_timestamp_order() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let post = create_post(&db, &alice, "hello").await;
    let root1 = create_comment(&db, &alice, &post, None).await;
    let root2 = create_comment(&db, &alice, &post, None).await;
    let reply = create_comment(&db, &alice, &post, Some(&root1.id)).await;

    let rows = db.get_comments_for_post(&post.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].id, root1.id);
    assert_eq!(rows[1].id, root2.id);
    assert_eq!(rows[2].id, reply.id);
    assert_eq!(rows[2].parent_id.as_deref(), Some(root1.id.as_str()));
}

#[tokio::test]
async fn test_like_toggle_pair_restores_original_state() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;

    let outcome = db
        .toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    assert_eq!(outcome, LikeOutcome::Liked);
    assert!(
        db.has_liked(&bob.id, LikeTarget::Post(&post.id))
            .await
            .unwrap()
    );

    let outcome = db
        .toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    assert_eq!(outcome, LikeOutcome::Unliked);
    assert!(
        !db.has_liked(&bob.id, LikeTarget::Post(&post.id))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_likes_are_independent_across_targets() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;
    let comment = create_comment(&db, &alice, &post, None).await;

    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    db.toggle_like(&bob.id, LikeTarget::Comment(&comment.id))
        .await
        .unwrap();

    // Unliking the post leaves the comment like untouched
    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    assert!(
        db.has_liked(&bob.id, LikeTarget::Comment(&comment.id))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_batched_liked_id_lookups() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let liked_post = create_post(&db, &alice, "one").await;
    let other_post = create_post(&db, &alice, "two").await;
    let comment = create_comment(&db, &alice, &liked_post, None).await;

    db.toggle_like(&bob.id, LikeTarget::Post(&liked_post.id))
        .await
        .unwrap();
    db.toggle_like(&bob.id, LikeTarget::Comment(&comment.id))
        .await
        .unwrap();

    let post_ids = vec![liked_post.id.clone(), other_post.id.clone()];
    let liked = db.get_liked_post_ids(&bob.id, &post_ids).await.unwrap();
    assert!(liked.contains(&liked_post.id));
    assert!(!liked.contains(&other_post.id));

    let liked_comments = db
        .get_liked_comment_ids(&bob.id, &liked_post.id)
        .await
        .unwrap();
    assert!(liked_comments.contains(&comment.id));

    // Anonymous-style empty input short-circuits
    assert!(db.get_liked_post_ids(&bob.id, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_karma_counts_likes_received_not_created() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;
    let comment = create_comment(&db, &alice, &post, None).await;

    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    db.toggle_like(&bob.id, LikeTarget::Comment(&comment.id))
        .await
        .unwrap();

    // Alice received the likes
    assert_eq!(db.count_post_likes_received(&alice.id, None).await.unwrap(), 1);
    assert_eq!(
        db.count_comment_likes_received(&alice.id, None)
            .await
            .unwrap(),
        1
    );

    // Bob created them; he received nothing
    assert_eq!(db.count_post_likes_received(&bob.id, None).await.unwrap(), 0);
    assert_eq!(
        db.count_comment_likes_received(&bob.id, None).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_karma_cutoff_excludes_old_likes() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;

    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    db.set_like_created_at_for_test(
        &bob.id,
        LikeTarget::Post(&post.id),
        Utc::now() - Duration::hours(48),
    )
    .await
    .unwrap();

    let cutoff = Utc::now() - Duration::hours(24);
    assert_eq!(
        db.count_post_likes_received(&alice.id, Some(cutoff))
            .await
            .unwrap(),
        0
    );
    assert_eq!(db.count_post_likes_received(&alice.id, None).await.unwrap(), 1);
}

/// Naive per-user leaderboard used as the oracle for the aggregate query.
async fn naive_leaderboard(
    db: &Database,
    cutoff: chrono::DateTime<Utc>,
    limit: usize,
) -> Vec<LeaderboardRow> {
    let mut rows = Vec::new();
    for user in db.get_all_users().await.unwrap() {
        let recent_karma = db
            .count_post_likes_received(&user.id, Some(cutoff))
            .await
            .unwrap()
            * 5
            + db.count_comment_likes_received(&user.id, Some(cutoff))
                .await
                .unwrap();
        let total_karma = db.count_post_likes_received(&user.id, None).await.unwrap() * 5
            + db.count_comment_likes_received(&user.id, None).await.unwrap();
        if recent_karma > 0 {
            rows.push(LeaderboardRow {
                id: user.id,
                username: user.username,
                recent_karma,
                total_karma,
            });
        }
    }
    rows.sort_by(|a, b| {
        b.recent_karma
            .cmp(&a.recent_karma)
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.truncate(limit);
    rows
}

#[tokio::test]
async fn test_leaderboard_aggregate_matches_naive_scan() {
    let (db, _temp_dir) = create_test_db().await;

    // Seven authors so the limit clips; one fan per author's content
    let fan = create_user(&db, "fan").await;
    let mut authors = Vec::new();
    for i in 0..7 {
        let author = create_user(&db, &format!("author{i}")).await;
        let post = create_post(&db, &author, "content").await;
        db.toggle_like(&fan.id, LikeTarget::Post(&post.id))
            .await
            .unwrap();
        // Give later authors extra comment karma for distinct scores
        for _ in 0..i {
            let comment = create_comment(&db, &author, &post, None).await;
            let liker = create_user(&db, &format!("liker{}", EntityId::new().0)).await;
            db.toggle_like(&liker.id, LikeTarget::Comment(&comment.id))
                .await
                .unwrap();
        }
        authors.push(author);
    }

    // One author's post like is stale and drops out of the window
    let stale_post = create_post(&db, &authors[0], "stale").await;
    let stale_fan = create_user(&db, "stale_fan").await;
    db.toggle_like(&stale_fan.id, LikeTarget::Post(&stale_post.id))
        .await
        .unwrap();
    db.set_like_created_at_for_test(
        &stale_fan.id,
        LikeTarget::Post(&stale_post.id),
        Utc::now() - Duration::hours(48),
    )
    .await
    .unwrap();

    let cutoff = Utc::now() - Duration::hours(24);
    let aggregate = db.get_leaderboard_rows(cutoff, 5, 1, 5).await.unwrap();
    let naive = naive_leaderboard(&db, cutoff, 5).await;

    assert_eq!(aggregate, naive);
    assert_eq!(aggregate.len(), 5);
    for pair in aggregate.windows(2) {
        assert!(pair[0].recent_karma >= pair[1].recent_karma);
    }
    for row in &aggregate {
        assert!(row.recent_karma <= row.total_karma);
        assert!(row.recent_karma > 0);
    }
}

#[tokio::test]
async fn test_leaderboard_excludes_zero_recent_karma() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, &alice, "hello").await;

    // Alice's only like is stale; bob has none at all
    db.toggle_like(&bob.id, LikeTarget::Post(&post.id))
        .await
        .unwrap();
    db.set_like_created_at_for_test(
        &bob.id,
        LikeTarget::Post(&post.id),
        Utc::now() - Duration::hours(48),
    )
    .await
    .unwrap();

    let cutoff = Utc::now() - Duration::hours(24);
    let rows = db.get_leaderboard_rows(cutoff, 5, 1, 5).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_leaderboard_ties_break_by_ascending_id() {
    let (db, _temp_dir) = create_test_db().await;

    let fan = create_user(&db, "fan").await;
    let first = create_user(&db, "first").await;
    let second = create_user(&db, "second").await;

    // ULIDs are monotonic enough across sequential creation for a
    // deterministic expectation
    assert!(first.id < second.id);

    for author in [&second, &first] {
        let post = create_post(&db, author, "content").await;
        db.toggle_like(&fan.id, LikeTarget::Post(&post.id))
            .await
            .unwrap();
    }

    let cutoff = Utc::now() - Duration::hours(24);
    let rows = db.get_leaderboard_rows(cutoff, 5, 1, 5).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, first.id);
    assert_eq!(rows[1].id, second.id);
}
