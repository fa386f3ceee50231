// src/ledger.rs
//! Append-only vote records.
//!
//! Logged-in voters are held to one vote per poll by the `votes_user_poll`
//! unique index; the insert is the authoritative check and a violation comes
//! back as [`PollError::AlreadyVoted`]. Guests share `user_id = 0` and are
//! only deduplicated by IP address, which is best-effort.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::PollError;
use crate::models::{Identity, PollId, Vote, VoteId, ANONYMOUS_USER};

const VOTE_COLUMNS: &str = "id, user_id, poll_id, option_id, ip_address, created_at";

/// Records a vote. Run it inside a write transaction together with the
/// poll checks that precede it.
pub async fn record_vote(
    conn: &mut SqliteConnection,
    identity: &Identity,
    poll_id: PollId,
    option_id: &str,
) -> Result<VoteId, PollError> {
    let option: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM poll_options WHERE poll_id = ? AND option_id = ?")
            .bind(poll_id)
            .bind(option_id)
            .fetch_optional(&mut *conn)
            .await?;
    if option.is_none() {
        return Err(PollError::InvalidOption);
    }

    if identity.is_anonymous() && has_voted(&mut *conn, identity, poll_id).await? {
        return Err(PollError::AlreadyVoted);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO votes (user_id, poll_id, option_id, ip_address, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(identity.user_id())
    .bind(poll_id)
    .bind(option_id)
    .bind(identity.ip().map(|ip| ip.to_string()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => PollError::AlreadyVoted,
        other => PollError::Storage(other),
    })?;

    Ok(result.last_insert_rowid())
}

/// Guests without a known IP address are never reported as having voted.
pub async fn has_voted(
    conn: &mut SqliteConnection,
    identity: &Identity,
    poll_id: PollId,
) -> Result<bool, sqlx::Error> {
    Ok(vote_of(conn, identity, poll_id).await?.is_some())
}

/// The vote `identity` cast in the poll, if any.
pub async fn vote_of(
    conn: &mut SqliteConnection,
    identity: &Identity,
    poll_id: PollId,
) -> Result<Option<Vote>, sqlx::Error> {
    match identity {
        Identity::User { id, .. } => {
            sqlx::query_as::<_, Vote>(&format!(
                "SELECT {VOTE_COLUMNS} FROM votes WHERE user_id = ? AND poll_id = ?"
            ))
            .bind(*id)
            .bind(poll_id)
            .fetch_optional(conn)
            .await
        }
        Identity::Anonymous { ip: Some(ip) } => {
            sqlx::query_as::<_, Vote>(&format!(
                "SELECT {VOTE_COLUMNS} FROM votes
                 WHERE user_id = ? AND poll_id = ? AND ip_address = ?
                 ORDER BY id LIMIT 1"
            ))
            .bind(ANONYMOUS_USER)
            .bind(poll_id)
            .bind(ip.to_string())
            .fetch_optional(conn)
            .await
        }
        Identity::Anonymous { ip: None } => Ok(None),
    }
}

/// Full ledger scan for a poll, oldest first.
pub async fn votes_for_poll(conn: &mut SqliteConnection, poll_id: PollId) -> Result<Vec<Vote>, sqlx::Error> {
    sqlx::query_as::<_, Vote>(&format!(
        "SELECT {VOTE_COLUMNS} FROM votes WHERE poll_id = ? ORDER BY id"
    ))
    .bind(poll_id)
    .fetch_all(conn)
    .await
}
