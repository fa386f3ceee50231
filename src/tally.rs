// src/tally.rs
use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::PollError;
use crate::models::{PollId, PollOption};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionTally {
    pub option_id: String,
    pub text: String,
    pub votes: i64,
    /// Share of all votes, rounded to one decimal place.
    pub percentage: f64,
}

/// Snapshot of a poll's results, in option order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tally {
    pub poll_id: PollId,
    pub total_votes: i64,
    pub options: Vec<OptionTally>,
}

impl Tally {
    pub fn from_options(poll_id: PollId, options: &[PollOption]) -> Self {
        let total_votes: i64 = options.iter().map(|o| o.vote_count).sum();
        let options = options
            .iter()
            .map(|o| OptionTally {
                option_id: o.id.clone(),
                text: o.text.clone(),
                votes: o.vote_count,
                percentage: percentage(o.vote_count, total_votes),
            })
            .collect();

        Self {
            poll_id,
            total_votes,
            options,
        }
    }

    /// Option id to vote count.
    pub fn counts(&self) -> BTreeMap<String, i64> {
        self.options
            .iter()
            .map(|o| (o.option_id.clone(), o.votes))
            .collect()
    }

    pub fn votes_for(&self, option_id: &str) -> Option<i64> {
        self.options
            .iter()
            .find(|o| o.option_id == option_id)
            .map(|o| o.votes)
    }
}

fn percentage(votes: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}

/// Options of a poll with their counts aggregated from the vote ledger.
pub async fn option_counts(
    conn: &mut SqliteConnection,
    poll_id: PollId,
) -> Result<Vec<PollOption>, sqlx::Error> {
    sqlx::query_as::<_, PollOption>(
        r#"
        SELECT o.option_id AS id, o.text AS text, COUNT(v.id) AS vote_count
        FROM poll_options o
        LEFT JOIN votes v ON v.poll_id = o.poll_id AND v.option_id = o.option_id
        WHERE o.poll_id = ?
        GROUP BY o.poll_id, o.option_id
        ORDER BY o.position
        "#,
    )
    .bind(poll_id)
    .fetch_all(conn)
    .await
}

pub async fn tally(conn: &mut SqliteConnection, poll_id: PollId) -> Result<Tally, PollError> {
    let options = option_counts(conn, poll_id).await?;
    // Every stored poll has at least two options.
    if options.is_empty() {
        return Err(PollError::NotFound);
    }
    Ok(Tally::from_options(poll_id, &options))
}
