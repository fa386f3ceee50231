// services.rs
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::bookmarks;
use crate::config::Policy;
use crate::db::WriteTx;
use crate::error::PollError;
use crate::ledger;
use crate::models::{Identity, NewPoll, Page, Poll, PollEdit, PollFilter, PollId, PollSummary, UserId, Vote, VoteId};
use crate::poll;
use crate::tally::{self, Tally};

/// Outcome of a successful vote: the ledger row and the results it produced.
#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    pub vote_id: VoteId,
    pub tally: Tally,
}

/// Results as seen by one caller.
#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub tally: Tally,
    pub has_voted: bool,
    pub your_choice: Option<String>,
}

/// Entry point for the HTTP layer and the moderation surface.
#[derive(Clone)]
pub struct VotingService {
    pool: SqlitePool,
    policy: Policy,
}

impl VotingService {
    pub fn new(pool: SqlitePool, policy: Policy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub async fn create_poll(&self, new: NewPoll, creator: &Identity) -> Result<PollId, PollError> {
        if creator.is_anonymous() && self.policy.require_login_to_create {
            return Err(PollError::LoginRequired);
        }

        let valid = poll::validate(&new, &self.policy)?;
        let is_active = new.requested_active && self.policy.auto_approve_polls;

        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = poll::insert_poll(tx.conn(), &valid, is_active, creator).await;
        tx.finish(outcome).await
    }

    pub async fn get_poll(&self, id: PollId) -> Result<Poll, PollError> {
        let mut conn = self.pool.acquire().await?;
        poll::get_poll(&mut conn, id).await
    }

    pub async fn list_polls(&self, filter: &PollFilter) -> Result<Page<PollSummary>, PollError> {
        let mut conn = self.pool.acquire().await?;
        poll::list_polls(&mut conn, filter).await
    }

    pub async fn update_poll(&self, id: PollId, edit: &PollEdit) -> Result<Poll, PollError> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = async {
            poll::update_poll(tx.conn(), id, edit).await?;
            poll::get_poll(tx.conn(), id).await
        }
        .await;
        tx.finish(outcome).await
    }

    pub async fn activate_poll(&self, id: PollId) -> Result<(), PollError> {
        self.set_active(id, true).await
    }

    pub async fn deactivate_poll(&self, id: PollId) -> Result<(), PollError> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: PollId, active: bool) -> Result<(), PollError> {
        let mut conn = self.pool.acquire().await?;
        poll::set_active(&mut conn, id, active).await
    }

    pub async fn delete_poll(&self, id: PollId) -> Result<(), PollError> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = poll::delete_poll(tx.conn(), id).await;
        tx.finish(outcome).await
    }

    /// Casts a vote and returns the tally that includes it.
    ///
    /// All checks and the insert share one immediate transaction. A duplicate
    /// that slips past the read check is still rejected by the ledger's
    /// unique index and reported as `AlreadyVoted`.
    pub async fn cast_vote(
        &self,
        poll_id: PollId,
        option_id: &str,
        identity: &Identity,
    ) -> Result<VoteReceipt, PollError> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = self.cast_vote_in(tx.conn(), poll_id, option_id, identity).await;
        tx.finish(outcome).await
    }

    async fn cast_vote_in(
        &self,
        conn: &mut SqliteConnection,
        poll_id: PollId,
        option_id: &str,
        identity: &Identity,
    ) -> Result<VoteReceipt, PollError> {
        let poll = poll::get_poll(&mut *conn, poll_id).await?;
        if !poll.is_active {
            return Err(PollError::PollInactive);
        }
        if poll.option(option_id).is_none() {
            return Err(PollError::InvalidOption);
        }

        match identity {
            Identity::User { .. } => {
                if ledger::has_voted(&mut *conn, identity, poll_id).await? {
                    return Err(PollError::AlreadyVoted);
                }
            }
            Identity::Anonymous { .. } => {
                if !self.policy.guest_voting_enabled {
                    return Err(PollError::LoginRequired);
                }
            }
        }

        let vote_id = ledger::record_vote(&mut *conn, identity, poll_id, option_id).await?;
        let tally = tally::tally(conn, poll_id).await?;

        Ok(VoteReceipt { vote_id, tally })
    }

    pub async fn tally(&self, poll_id: PollId) -> Result<Tally, PollError> {
        let mut conn = self.pool.acquire().await?;
        tally::tally(&mut conn, poll_id).await
    }

    pub async fn has_voted(&self, identity: &Identity, poll_id: PollId) -> Result<bool, PollError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::has_voted(&mut conn, identity, poll_id).await?)
    }

    pub async fn results_for(&self, poll_id: PollId, identity: &Identity) -> Result<PollResults, PollError> {
        let mut conn = self.pool.acquire().await?;
        let tally = tally::tally(&mut conn, poll_id).await?;
        let vote = ledger::vote_of(&mut conn, identity, poll_id).await?;

        Ok(PollResults {
            tally,
            has_voted: vote.is_some(),
            your_choice: vote.map(|v| v.option_id),
        })
    }

    /// Every ledger row of the poll, oldest first.
    pub async fn votes(&self, poll_id: PollId) -> Result<Vec<Vote>, PollError> {
        let mut conn = self.pool.acquire().await?;
        if !poll::poll_exists(&mut conn, poll_id).await? {
            return Err(PollError::NotFound);
        }
        Ok(ledger::votes_for_poll(&mut conn, poll_id).await?)
    }

    pub async fn bookmark(&self, identity: &Identity, poll_id: PollId) -> Result<(), PollError> {
        let user_id = logged_in(identity)?;
        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = bookmarks::add(tx.conn(), user_id, poll_id).await;
        tx.finish(outcome).await
    }

    pub async fn unbookmark(&self, identity: &Identity, poll_id: PollId) -> Result<bool, PollError> {
        let user_id = logged_in(identity)?;
        let mut conn = self.pool.acquire().await?;
        Ok(bookmarks::remove(&mut conn, user_id, poll_id).await?)
    }

    pub async fn is_bookmarked(&self, identity: &Identity, poll_id: PollId) -> Result<bool, PollError> {
        let user_id = logged_in(identity)?;
        let mut conn = self.pool.acquire().await?;
        Ok(bookmarks::is_bookmarked(&mut conn, user_id, poll_id).await?)
    }

    pub async fn bookmarks(&self, identity: &Identity) -> Result<Vec<PollSummary>, PollError> {
        let user_id = logged_in(identity)?;
        let mut conn = self.pool.acquire().await?;
        Ok(bookmarks::list(&mut conn, user_id).await?)
    }
}

fn logged_in(identity: &Identity) -> Result<UserId, PollError> {
    match identity {
        Identity::User { id, .. } => Ok(*id),
        Identity::Anonymous { .. } => Err(PollError::LoginRequired),
    }
}
