use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Failures reported by the backing store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("item not found in storage")]
    NotFound,

    #[error("item with the same key already exists")]
    KeyConflict,

    #[error("code already used")]
    AlreadyUsed,

    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("corrupt row in storage: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(StoreError),
}

impl VoteError {
    pub fn status(&self) -> StatusCode {
        match self {
            VoteError::NotFound(_) => StatusCode::NOT_FOUND,
            VoteError::Conflict(_) => StatusCode::CONFLICT,
            VoteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VoteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Generic mapping for call sites that have no more specific message to give.
impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => VoteError::NotFound(err.to_string()),
            StoreError::KeyConflict | StoreError::AlreadyUsed => VoteError::Conflict(err.to_string()),
            StoreError::Unavailable(_) | StoreError::Corrupt(_) => VoteError::Internal(err),
        }
    }
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
