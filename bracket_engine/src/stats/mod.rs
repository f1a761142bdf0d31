//! Player statistics: per-match rows, per-game aggregates and the
//! synchronizer that keeps them consistent with the bracket.

pub mod models;
pub mod synchronizer;

pub use models::{
    MatchStatistics, PlayerStatSubmission, PlayerStatistics, StatLine, StatisticId,
};
pub use synchronizer::{Rosters, StatisticsSynchronizer, index_rosters, match_players};
