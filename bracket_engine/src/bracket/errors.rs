//! Bracket error types.

use thiserror::Error;

use super::models::{MatchId, MatchKey, MatchStatus, PlayerId, TeamId, TournamentId, TournamentStatus};
use crate::stats::models::StatisticId;
use crate::store::StoreError;

/// Bracket engine errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Tournament unknown to the roster provider
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    /// Match not found
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Statistics row not found
    #[error("Statistic not found: {0}")]
    StatisticNotFound(StatisticId),

    /// Accepted team count is not a power of two >= 2
    #[error("Invalid bracket size: {teams} teams (need a power of two, at least 2)")]
    InvalidBracketSize { teams: usize },

    /// First round already exists for the tournament
    #[error("Bracket already generated for tournament {0}")]
    BracketAlreadyGenerated(TournamentId),

    /// Tournament is not in the status the operation requires
    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidTournamentState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    /// Tournament is completed or cancelled
    #[error("Tournament is closed ({0})")]
    TournamentClosed(TournamentStatus),

    /// Match is already completed or cancelled
    #[error("Match {0} is already finalized")]
    MatchAlreadyFinalized(MatchId),

    /// Negative score
    #[error("Invalid score: scores must be non-negative")]
    InvalidScore,

    /// Equal scores in single elimination
    #[error("Draws are not allowed in single elimination")]
    DrawNotAllowed,

    /// Named winner is not one of the match's teams
    #[error("Team {team_id} is not playing in match {match_id}")]
    InvalidWinner { match_id: MatchId, team_id: TeamId },

    /// One or both team slots are still empty
    #[error("Match {0} is waiting for its teams")]
    MatchNotReady(MatchId),

    /// Statistics submitted for a match that has not started
    #[error("Match {match_id} has not started (status {status})")]
    MatchNotStarted {
        match_id: MatchId,
        status: MatchStatus,
    },

    /// Player is not on the roster of either team
    #[error("Player {player_id} did not play in match {match_id}")]
    PlayerNotInMatch {
        match_id: MatchId,
        player_id: PlayerId,
    },

    /// Negative kills, deaths or assists
    #[error("Invalid statistic: values must be non-negative")]
    InvalidStatistic,

    /// Statistics row belongs to another match
    #[error("Statistic {statistic_id} does not belong to match {match_id}")]
    StatisticMismatch {
        statistic_id: StatisticId,
        match_id: MatchId,
    },

    /// Manually created match is malformed
    #[error("Invalid match: {0}")]
    InvalidMatch(String),

    /// Manually created match collides with an existing one
    #[error("Match already exists at {0}")]
    DuplicateMatch(MatchKey),

    /// Matches of running or finished tournaments cannot be deleted
    #[error("Cannot delete a match of a tournament that is {0}")]
    MatchDeletionForbidden(TournamentStatus),

    /// Result stored but the next round could not be updated
    #[error("Propagation from match {match_id} failed: {source}")]
    PropagationFailed {
        match_id: MatchId,
        #[source]
        source: StoreError,
    },

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl BracketError {
    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Store(_) => "Internal server error".to_string(),
            BracketError::PropagationFailed { match_id, .. } => format!(
                "Result of match {match_id} was recorded but the bracket could not be updated; retry propagation"
            ),
            _ => self.to_string(),
        }
    }

    /// Whether the caller can retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            BracketError::PropagationFailed { .. } => true,
            BracketError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;
