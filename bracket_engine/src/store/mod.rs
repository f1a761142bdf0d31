//! Storage trait definitions for the bracket engine.
//!
//! The engine only talks to storage through these traits, so the same
//! propagation and statistics logic runs against PostgreSQL in production and
//! against the in-memory arena in tests.
//!
//! Every method that the concurrency model depends on is a single atomic
//! operation in each implementation:
//! - [`MatchStore::finalize_match`] only succeeds for a match that is not final yet
//! - [`MatchStore::upsert_slots`] inserts the match if absent, else merges the given slots
//!   and clears a result whose winner it displaced
//! - [`StatisticsStore::register_participant`] counts a (match, player) pair at most once

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::bracket::models::{
    GameId, Match, MatchId, MatchKey, MatchResult, NewMatch, PlayerId, Team, TeamId, Tournament,
    TournamentId, TournamentStatus,
};
use crate::stats::models::{MatchStatistics, PlayerStatistics, StatLine, StatisticId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgBracketStore;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique natural key already taken
    #[error("Match already exists at {0}")]
    DuplicateKey(MatchKey),

    /// Stored value could not be mapped back to a model
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Backend temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Failures worth retrying from stored state
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// How one team slot is treated by [`MatchStore::upsert_slots`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    /// Leave the stored value untouched (unset on insert)
    Keep,
    /// Overwrite with the given value, clearing it on `None`
    Set(Option<TeamId>),
}

impl SlotWrite {
    fn apply(self, current: Option<TeamId>) -> Option<TeamId> {
        match self {
            SlotWrite::Keep => current,
            SlotWrite::Set(team) => team,
        }
    }

    fn is_set(self) -> bool {
        matches!(self, SlotWrite::Set(_))
    }
}

/// Outcome of an atomic slot upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUpsert {
    /// Match as stored after the write
    pub record: Match,
    /// True when the write created the match
    pub created: bool,
    /// Teams that were removed from a slot by this write
    pub displaced: Vec<TeamId>,
    /// True when the stored winner was displaced and the result cleared
    pub reset: bool,
}

/// Match storage keyed by id and by natural key
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert one match; fails with `DuplicateKey` when the natural key is taken
    async fn insert_match(&self, new_match: NewMatch) -> StoreResult<Match>;

    /// Insert a whole round atomically
    async fn insert_round(&self, matches: Vec<NewMatch>) -> StoreResult<Vec<Match>>;

    /// Find a match by id
    async fn find_match(&self, match_id: MatchId) -> StoreResult<Option<Match>>;

    /// Find a match by natural key
    async fn find_by_key(&self, key: MatchKey) -> StoreResult<Option<Match>>;

    /// All matches of a tournament ordered by level, then match number
    async fn list_matches(&self, tournament_id: TournamentId) -> StoreResult<Vec<Match>>;

    /// Record a result unless the match is already completed or cancelled.
    /// Returns `None` when the match was final (or missing).
    async fn finalize_match(
        &self,
        match_id: MatchId,
        result: MatchResult,
    ) -> StoreResult<Option<Match>>;

    /// Overwrite the mutable fields of a match (times, scores, status, winner)
    async fn update_match(&self, updated: &Match) -> StoreResult<Match>;

    /// Insert the match at `key` if absent, else merge the given slots.
    ///
    /// When the merge displaces the stored winner, the same write clears the
    /// winner, both scores and the end time and puts the match back to
    /// `SCHEDULED`. Otherwise scores and status are left untouched.
    async fn upsert_slots(
        &self,
        key: MatchKey,
        first: SlotWrite,
        second: SlotWrite,
        default_start: DateTime<Utc>,
    ) -> StoreResult<SlotUpsert>;

    /// Delete a match; returns false when it did not exist
    async fn delete_match(&self, match_id: MatchId) -> StoreResult<bool>;
}

/// Per-match rows and per-player aggregates
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Ensure a zero row for (match, player) exists. When the row is created,
    /// the player's `matches_played` for `game_id` is incremented by one.
    /// Returns true when the row was created.
    async fn register_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool>;

    /// Remove the (match, player) row, taking its values and the played match
    /// back out of the aggregate. Returns false when no row existed.
    async fn release_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool>;

    /// Set the (match, player) row to `line` and fold the delta into the aggregate
    async fn record_line(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
        line: StatLine,
    ) -> StoreResult<MatchStatistics>;

    /// All rows of a match
    async fn match_statistics(&self, match_id: MatchId) -> StoreResult<Vec<MatchStatistics>>;

    /// One row by id
    async fn find_statistic(
        &self,
        statistic_id: StatisticId,
    ) -> StoreResult<Option<MatchStatistics>>;

    /// One row by (match, player)
    async fn find_match_player(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> StoreResult<Option<MatchStatistics>>;

    /// Aggregate for (player, game)
    async fn player_statistics(
        &self,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<Option<PlayerStatistics>>;

    /// All aggregates of a game
    async fn game_statistics(&self, game_id: GameId) -> StoreResult<Vec<PlayerStatistics>>;
}

/// Read-only view of the tournament and roster collaborators
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Tournament facts, `None` when unknown
    async fn tournament(&self, tournament_id: TournamentId) -> StoreResult<Option<Tournament>>;

    /// Accepted teams with rosters, ordered by team id
    async fn accepted_teams(&self, tournament_id: TournamentId) -> StoreResult<Vec<Team>>;

    /// Current tournament status
    async fn tournament_status(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<TournamentStatus>> {
        Ok(self.tournament(tournament_id).await?.map(|t| t.status))
    }
}
