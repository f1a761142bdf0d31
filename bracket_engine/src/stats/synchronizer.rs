//! Keeps per-match rows and per-player aggregates in step with the bracket.

use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::bracket::errors::{BracketError, BracketResult};
use crate::bracket::models::{GameId, Match, MatchId, PlayerId, Team, TeamId};
use crate::stats::models::{MatchStatistics, PlayerStatSubmission};
use crate::store::{StatisticsStore, StoreResult};

/// Accepted teams of a tournament indexed by id
pub type Rosters = HashMap<TeamId, Team>;

/// Index a team list by id
pub fn index_rosters(teams: Vec<Team>) -> Rosters {
    teams.into_iter().map(|team| (team.id, team)).collect()
}

/// Statistics synchronizer
#[derive(Clone)]
pub struct StatisticsSynchronizer {
    store: Arc<dyn StatisticsStore>,
}

impl StatisticsSynchronizer {
    pub fn new(store: Arc<dyn StatisticsStore>) -> Self {
        Self { store }
    }

    /// Ensure a zero row for every rostered player of the match's teams.
    ///
    /// Idempotent per (match, player): `matches_played` only moves for rows
    /// created by this call. Returns the number of rows created.
    pub async fn ensure_stats_for(
        &self,
        m: &Match,
        rosters: &Rosters,
        game_id: GameId,
    ) -> StoreResult<usize> {
        let mut created = 0;
        for team_id in m.teams() {
            let Some(team) = rosters.get(&team_id) else {
                continue;
            };
            for &player_id in &team.roster {
                if self
                    .store
                    .register_participant(m.id, player_id, game_id)
                    .await?
                {
                    created += 1;
                }
            }
        }

        if created > 0 {
            debug!("Initialized {created} statistics rows for match {}", m.id);
        }
        Ok(created)
    }

    /// Remove a team's rows from a match it no longer plays in
    pub async fn release_team(
        &self,
        match_id: MatchId,
        team: &Team,
        game_id: GameId,
    ) -> StoreResult<usize> {
        let mut released = 0;
        for &player_id in &team.roster {
            if self
                .store
                .release_participant(match_id, player_id, game_id)
                .await?
            {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Remove every row of a match, reversing its aggregate contribution
    pub async fn release_match(&self, match_id: MatchId, game_id: GameId) -> StoreResult<usize> {
        let rows = self.store.match_statistics(match_id).await?;
        let mut released = 0;
        for row in rows {
            if self
                .store
                .release_participant(match_id, row.player_id, game_id)
                .await?
            {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Validate and apply a statistics submission for one match.
    ///
    /// The whole submission is validated before anything is written.
    pub async fn apply_match_statistics(
        &self,
        m: &Match,
        rosters: &Rosters,
        game_id: GameId,
        submissions: &[PlayerStatSubmission],
    ) -> BracketResult<Vec<MatchStatistics>> {
        if !m.status.accepts_statistics() {
            return Err(BracketError::MatchNotStarted {
                match_id: m.id,
                status: m.status,
            });
        }

        let players = match_players(m, rosters);
        for submission in submissions {
            if !players.contains(&submission.player_id) {
                return Err(BracketError::PlayerNotInMatch {
                    match_id: m.id,
                    player_id: submission.player_id,
                });
            }
            if !submission.line().is_valid() {
                return Err(BracketError::InvalidStatistic);
            }
        }

        let mut rows = Vec::with_capacity(submissions.len());
        for submission in submissions {
            rows.push(
                self.store
                    .record_line(m.id, submission.player_id, game_id, submission.line())
                    .await?,
            );
        }
        Ok(rows)
    }
}

/// Players on the rosters of both teams of `m`
pub fn match_players(m: &Match, rosters: &Rosters) -> HashSet<PlayerId> {
    m.teams()
        .iter()
        .filter_map(|id| rosters.get(id))
        .flat_map(|team| team.roster.iter().copied())
        .collect()
}
