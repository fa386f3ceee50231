// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure the core can report to its callers.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("poll not found")]
    NotFound,

    #[error("option does not belong to this poll")]
    InvalidOption,

    #[error("already voted in this poll")]
    AlreadyVoted,

    #[error("login required")]
    LoginRequired,

    #[error("poll is pending moderation")]
    PollInactive,

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PollError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PollError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Validation(_) => StatusCode::BAD_REQUEST,
            PollError::NotFound | PollError::InvalidOption => StatusCode::NOT_FOUND,
            PollError::AlreadyVoted => StatusCode::CONFLICT,
            PollError::LoginRequired => StatusCode::UNAUTHORIZED,
            PollError::PollInactive => StatusCode::FORBIDDEN,
            PollError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for PollError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PollError::Storage(sqlx::Error::Migrate(Box::new(err)))
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the logs.
        let message = match &self {
            PollError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        assert_eq!(PollError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(PollError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(PollError::InvalidOption.status(), StatusCode::NOT_FOUND);
        assert_eq!(PollError::AlreadyVoted.status(), StatusCode::CONFLICT);
        assert_eq!(PollError::LoginRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PollError::PollInactive.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            PollError::Storage(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_errors_are_opaque_in_responses() {
        let response = PollError::Storage(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
