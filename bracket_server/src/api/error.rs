//! Mapping of engine errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bracket_engine::BracketError;
use serde::{Deserialize, Serialize};

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    /// Engine failure
    Bracket(BracketError),
    /// Resource absent without an engine error, e.g. an optional read
    NotFound(String),
}

impl From<BracketError> for ApiError {
    fn from(err: BracketError) -> Self {
        ApiError::Bracket(err)
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &BracketError) -> StatusCode {
    use BracketError::*;

    match err {
        TournamentNotFound(_) | MatchNotFound(_) | StatisticNotFound(_) => StatusCode::NOT_FOUND,

        InvalidBracketSize { .. }
        | InvalidScore
        | DrawNotAllowed
        | InvalidWinner { .. }
        | PlayerNotInMatch { .. }
        | InvalidStatistic
        | StatisticMismatch { .. }
        | InvalidMatch(_) => StatusCode::BAD_REQUEST,

        BracketAlreadyGenerated(_)
        | InvalidTournamentState { .. }
        | TournamentClosed(_)
        | MatchAlreadyFinalized(_)
        | MatchNotReady(_)
        | MatchNotStarted { .. }
        | DuplicateMatch(_)
        | MatchDeletionForbidden(_) => StatusCode::CONFLICT,

        PropagationFailed { .. } | Store(_) if err.is_retryable() => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PropagationFailed { .. } | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Bracket(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (status, err.client_message())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;
