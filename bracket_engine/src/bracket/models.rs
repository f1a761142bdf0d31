//! Bracket data models: tournaments, teams and matches.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::stats::models::MatchStatistics;

/// Tournament ID type
pub type TournamentId = i64;

/// Team ID type
pub type TeamId = i64;

/// Player ID type
pub type PlayerId = i64;

/// Game ID type
pub type GameId = i64;

/// Match ID type
pub type MatchId = i64;

/// Tournament lifecycle status, owned by the tournament-status collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    /// Accepting applications
    Pending,
    /// Bracket is being played
    Active,
    /// Final has been decided
    Completed,
    /// Called off by the organizer
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Pending => "PENDING",
            TournamentStatus::Active => "ACTIVE",
            TournamentStatus::Completed => "COMPLETED",
            TournamentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether result and propagation writes are still accepted.
    pub fn is_closed(&self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Cancelled)
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TournamentStatus::Pending),
            "ACTIVE" => Ok(TournamentStatus::Active),
            "COMPLETED" => Ok(TournamentStatus::Completed),
            "CANCELLED" => Ok(TournamentStatus::Cancelled),
            other => Err(format!("unknown tournament status '{other}'")),
        }
    }
}

/// Match lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::InProgress => "IN_PROGRESS",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }

    /// Completed and cancelled matches no longer accept a regular result.
    pub fn is_final(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// Statistics can only be submitted once a match has started.
    pub fn accepts_statistics(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::InProgress)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "IN_PROGRESS" => Ok(MatchStatus::InProgress),
            "COMPLETED" => Ok(MatchStatus::Completed),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status '{other}'")),
        }
    }
}

/// Tournament facts the engine consumes from the roster provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    /// Game whose player statistics this tournament feeds
    pub game_id: GameId,
    pub status: TournamentStatus,
    /// Declared start date; round 1 starts at midnight UTC
    pub start_date: NaiveDate,
    pub max_teams: Option<u32>,
}

impl Tournament {
    /// Start time assigned to every first-round match
    pub fn first_round_start(&self) -> DateTime<Utc> {
        self.start_date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Accepted team with its player roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub roster: Vec<PlayerId>,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, roster: Vec<PlayerId>) -> Self {
        Self {
            id,
            name: name.into(),
            roster,
        }
    }
}

/// Natural key of a match inside its tournament's bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey {
    pub tournament_id: TournamentId,
    /// 1 = first round, increasing toward the final
    pub bracket_level: u32,
    /// 1-indexed position within the level
    pub match_number: u32,
}

impl MatchKey {
    pub fn new(tournament_id: TournamentId, bracket_level: u32, match_number: u32) -> Self {
        Self {
            tournament_id,
            bracket_level,
            match_number,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tournament {} level {} match {}",
            self.tournament_id, self.bracket_level, self.match_number
        )
    }
}

/// Which side of a match a team occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    First,
    Second,
}

/// A stored match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub bracket_level: u32,
    pub match_number: u32,
    pub first_team: Option<TeamId>,
    pub second_team: Option<TeamId>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub first_team_score: Option<i32>,
    pub second_team_score: Option<i32>,
    pub winning_team: Option<TeamId>,
    pub status: MatchStatus,
}

impl Match {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.tournament_id, self.bracket_level, self.match_number)
    }

    pub fn team(&self, slot: Slot) -> Option<TeamId> {
        match slot {
            Slot::First => self.first_team,
            Slot::Second => self.second_team,
        }
    }

    /// Teams currently placed, first slot first
    pub fn teams(&self) -> Vec<TeamId> {
        self.first_team.into_iter().chain(self.second_team).collect()
    }

    pub fn has_team(&self, team_id: TeamId) -> bool {
        self.first_team == Some(team_id) || self.second_team == Some(team_id)
    }

    /// Both slots are populated
    pub fn is_ready(&self) -> bool {
        self.first_team.is_some() && self.second_team.is_some()
    }
}

/// A match about to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub key: MatchKey,
    pub first_team: Option<TeamId>,
    pub second_team: Option<TeamId>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub status: MatchStatus,
}

impl NewMatch {
    /// A scheduled match with both teams known
    pub fn scheduled(
        key: MatchKey,
        first_team: TeamId,
        second_team: TeamId,
        start_datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            first_team: Some(first_team),
            second_team: Some(second_team),
            start_datetime,
            end_datetime: None,
            status: MatchStatus::Scheduled,
        }
    }
}

/// Outcome written by the result recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub first_team_score: i32,
    pub second_team_score: i32,
    pub winning_team: TeamId,
    pub end_datetime: DateTime<Utc>,
}

/// Organizer override applied by the correction path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCorrection {
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub first_team_score: Option<i32>,
    pub second_team_score: Option<i32>,
    pub status: MatchStatus,
    /// Explicit winner; when absent the winner is derived from the scores of a completed match
    pub winning_team: Option<TeamId>,
}

/// One round of the bracket read model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketRound {
    pub bracket_level: u32,
    pub matches: Vec<Match>,
}

/// Bracket read model for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub tournament_id: TournamentId,
    pub total_rounds: u32,
    pub rounds: Vec<BracketRound>,
    /// Winner of the final once it has been recorded
    pub champion: Option<TeamId>,
}

impl Bracket {
    /// Group a flat match list by level; `matches` must be sorted by key.
    pub fn from_matches(tournament_id: TournamentId, total_rounds: u32, matches: Vec<Match>) -> Self {
        let champion = matches
            .iter()
            .find(|m| m.bracket_level == total_rounds && m.match_number == 1)
            .and_then(|m| m.winning_team);

        let mut rounds: Vec<BracketRound> = Vec::new();
        for m in matches {
            match rounds.last_mut() {
                Some(round) if round.bracket_level == m.bracket_level => round.matches.push(m),
                _ => rounds.push(BracketRound {
                    bracket_level: m.bracket_level,
                    matches: vec![m],
                }),
            }
        }

        Self {
            tournament_id,
            total_rounds,
            rounds,
            champion,
        }
    }

    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|r| r.matches.len()).sum()
    }
}

/// A match with the statistics rows of each side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
    #[serde(flatten)]
    pub record: Match,
    pub first_team_statistics: Vec<MatchStatistics>,
    pub second_team_statistics: Vec<MatchStatistics>,
}
