// src/bookmarks.rs
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::PollError;
use crate::models::{PollId, PollSummary, UserId};
use crate::poll;

/// Bookmarking twice is not an error.
pub async fn add(conn: &mut SqliteConnection, user_id: UserId, poll_id: PollId) -> Result<(), PollError> {
    if !poll::poll_exists(&mut *conn, poll_id).await? {
        return Err(PollError::NotFound);
    }

    sqlx::query("INSERT OR IGNORE INTO bookmarks (user_id, poll_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(poll_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns whether a bookmark was removed.
pub async fn remove(conn: &mut SqliteConnection, user_id: UserId, poll_id: PollId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND poll_id = ?")
        .bind(user_id)
        .bind(poll_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_bookmarked(conn: &mut SqliteConnection, user_id: UserId, poll_id: PollId) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM bookmarks WHERE user_id = ? AND poll_id = ?")
        .bind(user_id)
        .bind(poll_id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Bookmarked polls, most recently bookmarked first.
pub async fn list(conn: &mut SqliteConnection, user_id: UserId) -> Result<Vec<PollSummary>, sqlx::Error> {
    sqlx::query_as::<_, PollSummary>(
        r#"
        SELECT p.id, p.title, p.category, p.is_active,
            (SELECT COUNT(*) FROM poll_options o WHERE o.poll_id = p.id) AS option_count,
            (SELECT COUNT(*) FROM votes v WHERE v.poll_id = p.id) AS total_votes,
            p.created_at
        FROM bookmarks b
        JOIN polls p ON p.id = b.poll_id
        WHERE b.user_id = ?
        ORDER BY b.created_at DESC, b.rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}
