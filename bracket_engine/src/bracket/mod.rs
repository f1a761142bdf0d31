//! Single-elimination bracket: models, shape arithmetic, first-round
//! generation, result recording and winner propagation.
//!
//! ## Example
//!
//! ```no_run
//! use bracket_engine::bracket::BracketManager;
//! use bracket_engine::config::EngineConfig;
//! use bracket_engine::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let manager = BracketManager::from_store(store, EngineConfig::default());
//!
//!     let round = manager.generate_first_round(1).await?;
//!     manager.record_result(round[0].id, Some(16), Some(9)).await?;
//!
//!     let bracket = manager.get_bracket(1).await?;
//!     println!("{} matches so far", bracket.match_count());
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod generator;
pub mod manager;
pub mod models;
pub mod propagation;
pub mod shape;

pub use errors::{BracketError, BracketResult};
pub use manager::BracketManager;
pub use models::{
    Bracket, BracketRound, GameId, Match, MatchCorrection, MatchDetails, MatchId, MatchKey,
    MatchResult, MatchStatus, NewMatch, PlayerId, Slot, Team, TeamId, Tournament, TournamentId,
    TournamentStatus,
};
