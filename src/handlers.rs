// handlers.rs
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, State};
use axum::Json;
use http::request::Parts;
use http::StatusCode;
use serde_json::{json, Value};

use crate::error::PollError;
use crate::models::{Identity, NewPoll, Page, Poll, PollEdit, PollFilter, PollId, PollSummary, UserId, VoteRequest};
use crate::services::{PollResults, VoteReceipt, VotingService};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity resolved by the upstream session layer.
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = match parts.headers.get(USER_ID_HEADER) {
            None => None,
            Some(value) => Some(
                value
                    .to_str()
                    .ok()
                    .and_then(|v| v.trim().parse::<UserId>().ok())
                    .ok_or_else(|| PollError::validation("malformed x-user-id header"))?,
            ),
        };

        Ok(Caller(Identity::resolve(user_id, client_ip(parts))))
    }
}

/// First hop of `x-forwarded-for`, then `x-real-ip`, then the peer address.
fn client_ip(parts: &Parts) -> Option<IpAddr> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
}

/// Create a poll; it starts pending unless the policy auto-approves it
pub async fn create_poll(
    State(service): State<VotingService>,
    Caller(identity): Caller,
    Json(new): Json<NewPoll>,
) -> Result<(StatusCode, Json<Value>), PollError> {
    let id = service.create_poll(new, &identity).await?;
    tracing::info!(poll_id = %id, created_by = identity.user_id(), "poll created");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn list_polls(
    State(service): State<VotingService>,
    Query(filter): Query<PollFilter>,
) -> Result<Json<Page<PollSummary>>, PollError> {
    Ok(Json(service.list_polls(&filter).await?))
}

pub async fn get_poll(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
) -> Result<Json<Poll>, PollError> {
    Ok(Json(service.get_poll(id).await?))
}

pub async fn update_poll(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
    Json(edit): Json<PollEdit>,
) -> Result<Json<Poll>, PollError> {
    Ok(Json(service.update_poll(id, &edit).await?))
}

pub async fn delete_poll(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
) -> Result<StatusCode, PollError> {
    service.delete_poll(id).await?;
    tracing::info!(poll_id = %id, "poll deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Moderation: approve a pending poll
pub async fn activate_poll(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
) -> Result<StatusCode, PollError> {
    service.activate_poll(id).await?;
    tracing::info!(poll_id = %id, "poll activated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deactivate_poll(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
) -> Result<StatusCode, PollError> {
    service.deactivate_poll(id).await?;
    tracing::info!(poll_id = %id, "poll deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Vote for an option
pub async fn vote(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
    Caller(identity): Caller,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteReceipt>, PollError> {
    match service.cast_vote(id, &request.option_id, &identity).await {
        Ok(receipt) => {
            tracing::info!(poll_id = %id, option_id = %request.option_id, "vote recorded");
            Ok(Json(receipt))
        }
        Err(err) => {
            tracing::debug!(poll_id = %id, user_id = identity.user_id(), error = %err, "vote rejected");
            Err(err)
        }
    }
}

pub async fn results(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
    Caller(identity): Caller,
) -> Result<Json<PollResults>, PollError> {
    Ok(Json(service.results_for(id, &identity).await?))
}

pub async fn add_bookmark(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
    Caller(identity): Caller,
) -> Result<StatusCode, PollError> {
    service.bookmark(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_bookmark(
    State(service): State<VotingService>,
    Path(id): Path<PollId>,
    Caller(identity): Caller,
) -> Result<StatusCode, PollError> {
    if service.unbookmark(&identity, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(PollError::NotFound)
    }
}

pub async fn list_bookmarks(
    State(service): State<VotingService>,
    Caller(identity): Caller,
) -> Result<Json<Vec<PollSummary>>, PollError> {
    Ok(Json(service.bookmarks(&identity).await?))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use http::Request;

    use super::*;

    async fn caller_from(request: Request<()>) -> Result<Identity, PollError> {
        let (mut parts, _) = request.into_parts();
        Caller::from_request_parts(&mut parts, &()).await.map(|c| c.0)
    }

    #[tokio::test]
    async fn resolves_logged_in_user_and_forwarded_ip() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "42")
            .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
            .body(())
            .unwrap();
        let identity = caller_from(request).await.unwrap();
        assert_eq!(identity.user_id(), 42);
        assert_eq!(identity.ip(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))));
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let request = Request::builder()
            .header("x-real-ip", "192.168.1.5")
            .body(())
            .unwrap();
        let identity = caller_from(request).await.unwrap();
        assert!(identity.is_anonymous());
        assert_eq!(identity.ip(), Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5))));
    }

    #[tokio::test]
    async fn malformed_user_header_is_rejected() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "alice")
            .body(())
            .unwrap();
        assert!(matches!(caller_from(request).await, Err(PollError::Validation(_))));
    }
}
