// models.rs
use std::{collections::BTreeSet, fmt, net::IpAddr, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i64;
pub type VoteId = i64;

/// Stored `user_id` of votes cast without a login.
pub const ANONYMOUS_USER: UserId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PollId(Uuid);

impl PollId {
    pub fn new() -> Self {
        PollId(Uuid::new_v4())
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PollId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PollId)
    }
}

/// A caller as resolved by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    User { id: UserId, ip: Option<IpAddr> },
    Anonymous { ip: Option<IpAddr> },
}

impl Identity {
    /// Maps the provider's raw user id onto an identity; absent or 0 means anonymous.
    pub fn resolve(user_id: Option<UserId>, ip: Option<IpAddr>) -> Self {
        match user_id {
            Some(id) if id > ANONYMOUS_USER => Identity::User { id, ip },
            _ => Identity::Anonymous { ip },
        }
    }

    pub fn user(id: UserId) -> Self {
        Self::resolve(Some(id), None)
    }

    pub fn anonymous(ip: IpAddr) -> Self {
        Identity::Anonymous { ip: Some(ip) }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Identity::User { id, .. } => *id,
            Identity::Anonymous { .. } => ANONYMOUS_USER,
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Identity::User { ip, .. } | Identity::Anonymous { ip } => *ip,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    /// Derived from the ledger whenever the poll is read.
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub options: Vec<PollOption>,
    pub tags: BTreeSet<String>,
    pub is_active: bool,
    /// `None` when the poll was created anonymously.
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn total_votes(&self) -> i64 {
        self.options.iter().map(|o| o.vote_count).sum()
    }
}

/// List view of a poll, without its options.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollSummary {
    pub id: PollId,
    pub title: String,
    pub category: Option<String>,
    pub is_active: bool,
    pub option_count: i64,
    pub total_votes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPoll {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub options: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Only honoured when the policy auto-approves polls.
    #[serde(default)]
    pub requested_active: bool,
}

/// Changes to the descriptive fields of a poll; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    /// An empty string clears the category.
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PollFilter {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            tag: None,
            active_only: false,
            created_by: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: VoteId,
    pub user_id: UserId,
    pub poll_id: PollId,
    pub option_id: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bookmark {
    pub user_id: UserId,
    pub poll_id: PollId,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub option_id: String,
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn zero_user_id_resolves_to_anonymous() {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(Identity::resolve(Some(0), Some(ip)).is_anonymous());
        assert!(Identity::resolve(None, None).is_anonymous());
        assert_eq!(Identity::resolve(Some(7), Some(ip)).user_id(), 7);
        assert_eq!(Identity::anonymous(ip).user_id(), ANONYMOUS_USER);
        assert_eq!(Identity::anonymous(ip).ip(), Some(ip));
    }

    #[test]
    fn poll_ids_round_trip_through_strings() {
        let id = PollId::new();
        assert_eq!(id.to_string().parse::<PollId>().unwrap(), id);
        assert!("not-a-uuid".parse::<PollId>().is_err());
    }
}
