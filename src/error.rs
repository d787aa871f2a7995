use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::store::StoreError;
use crate::types::{CaptionId, GamePhase};

/// Errors of the game round controller
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No meme, or too few captions to make a round
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// No valid login session
    #[error("not authenticated")]
    Unauthorized,

    /// A store read or write failed; round state is left as it was
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("cannot {operation} while {phase:?}")]
    InvalidTransition {
        operation: &'static str,
        phase: GamePhase,
    },

    #[error("caption {0} is not part of this round")]
    UnknownCaption(CaptionId),
}

/// Errors returned by HTTP handlers, rendered as `{"error": message}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::ContentUnavailable(msg) => Self::Internal(msg),
            GameError::Unauthorized => Self::Unauthorized("Not authenticated".to_string()),
            GameError::PersistenceFailure(e) => Self::from(e),
            e @ GameError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            e @ GameError::UnknownCaption(_) => Self::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
