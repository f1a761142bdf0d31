//! Statistics data models.

use crate::bracket::models::{GameId, MatchId, PlayerId};
use serde::{Deserialize, Serialize};

/// Statistics row ID type
pub type StatisticId = i64;

/// Kills/deaths/assists triple for one player in one match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLine {
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
}

impl StatLine {
    pub fn new(kills: i32, deaths: i32, assists: i32) -> Self {
        Self {
            kills,
            deaths,
            assists,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kills >= 0 && self.deaths >= 0 && self.assists >= 0
    }
}

/// Per-(match, player) statistics row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub id: StatisticId,
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
}

impl MatchStatistics {
    pub fn line(&self) -> StatLine {
        StatLine::new(self.kills, self.deaths, self.assists)
    }
}

/// Statistics submitted for one player of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatSubmission {
    pub player_id: PlayerId,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
}

impl PlayerStatSubmission {
    pub fn line(&self) -> StatLine {
        StatLine::new(self.kills, self.deaths, self.assists)
    }
}

/// Running per-(player, game) aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub player_id: PlayerId,
    pub game_id: GameId,
    pub total_kills: i64,
    pub total_deaths: i64,
    pub total_assists: i64,
    pub matches_played: i32,
    pub average_kills: f64,
    pub average_deaths: f64,
    pub average_assists: f64,
}

impl PlayerStatistics {
    /// Zero aggregate for a player who has not played the game yet
    pub fn empty(player_id: PlayerId, game_id: GameId) -> Self {
        Self {
            player_id,
            game_id,
            total_kills: 0,
            total_deaths: 0,
            total_assists: 0,
            matches_played: 0,
            average_kills: 0.0,
            average_deaths: 0.0,
            average_assists: 0.0,
        }
    }

    /// Replace `old` with `new` in the totals and refresh the averages
    pub fn fold_delta(&mut self, old: StatLine, new: StatLine) {
        self.total_kills += i64::from(new.kills) - i64::from(old.kills);
        self.total_deaths += i64::from(new.deaths) - i64::from(old.deaths);
        self.total_assists += i64::from(new.assists) - i64::from(old.assists);
        self.recompute_averages();
    }

    /// Must run after every write; averages are 0 while no match was played
    pub fn recompute_averages(&mut self) {
        if self.matches_played <= 0 {
            self.average_kills = 0.0;
            self.average_deaths = 0.0;
            self.average_assists = 0.0;
        } else {
            let played = f64::from(self.matches_played);
            self.average_kills = self.total_kills as f64 / played;
            self.average_deaths = self.total_deaths as f64 / played;
            self.average_assists = self.total_assists as f64 / played;
        }
    }
}
