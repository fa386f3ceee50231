//! Poll store, vote ledger and tallies behind a small async API.
//!
//! [`services::VotingService`] is the entry point; [`routes::create_routes`]
//! wraps it in an axum router for deployments that want the bundled HTTP layer.

pub mod bookmarks;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod poll;
pub mod routes;
pub mod services;
pub mod tally;

pub use config::{Config, Policy};
pub use error::PollError;
pub use models::{Identity, NewPoll, Poll, PollFilter, PollId};
pub use services::{VoteReceipt, VotingService};
pub use tally::Tally;
