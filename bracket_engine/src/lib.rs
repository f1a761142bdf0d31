//! # Bracket Engine
//!
//! Single-elimination tournament brackets: first-round generation from the
//! accepted roster, result recording, winner propagation into the next round
//! and player statistics that follow the bracket.
//!
//! ## Architecture
//!
//! The bracket is an arena of [`Match`] records keyed by
//! `(tournament, bracket_level, match_number)`. There are no pointers between
//! matches; the next match of level L match n is always level L+1 match
//! ceil(n/2), and propagation is a pure plan applied as one atomic upsert.
//!
//! ## Core Modules
//!
//! - [`bracket`]: models, shape arithmetic, generator, propagation and the
//!   [`BracketManager`] facade
//! - [`stats`]: per-match rows, per-game aggregates and their synchronizer
//! - [`store`]: storage traits with in-memory and PostgreSQL implementations
//! - [`db`]: connection pooling and migrations
//! - [`config`]: engine tunables

pub mod bracket;
pub mod config;
pub mod db;
pub mod stats;
pub mod store;

pub use bracket::{
    Bracket, BracketError, BracketManager, BracketResult, Match, MatchKey, MatchStatus, Team,
    Tournament, TournamentStatus,
};
pub use config::EngineConfig;
pub use store::{InMemoryStore, PgBracketStore, StoreError};
