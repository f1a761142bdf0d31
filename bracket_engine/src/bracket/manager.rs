//! Bracket manager: the engine's public operations.
//!
//! Writes that touch the bracket (generation, results, corrections,
//! propagation) are serialized per tournament behind an async mutex. The
//! stores' atomic conditional writes remain the baseline guarantee; the lock
//! keeps the read-plan-write sequence of propagation free of interleavings
//! inside one process.

use chrono::Utc;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};
use tokio::sync::Mutex;

use super::errors::{BracketError, BracketResult};
use super::generator::pair_teams;
use super::models::{
    Bracket, GameId, Match, MatchCorrection, MatchDetails, MatchId, MatchResult, MatchStatus,
    NewMatch, PlayerId, Slot, TeamId, Tournament, TournamentId, TournamentStatus,
};
use super::propagation::{Propagation, propagate_with_retry};
use super::shape::total_rounds;
use crate::config::EngineConfig;
use crate::stats::models::{
    MatchStatistics, PlayerStatSubmission, PlayerStatistics, StatLine, StatisticId,
};
use crate::stats::synchronizer::{Rosters, StatisticsSynchronizer, index_rosters};
use crate::store::{MatchStore, RosterProvider, StatisticsStore, StoreError};

/// Tournament facts loaded once per operation
struct TournamentContext {
    tournament: Tournament,
    rosters: Rosters,
    /// `None` when the accepted team count cannot form a bracket
    rounds: Option<u32>,
}

impl TournamentContext {
    fn game_id(&self) -> GameId {
        self.tournament.game_id
    }

    fn ensure_open(&self) -> BracketResult<()> {
        if self.tournament.status.is_closed() {
            return Err(BracketError::TournamentClosed(self.tournament.status));
        }
        Ok(())
    }
}

/// Single-elimination bracket manager
pub struct BracketManager {
    matches: Arc<dyn MatchStore>,
    statistics: Arc<dyn StatisticsStore>,
    roster: Arc<dyn RosterProvider>,
    synchronizer: StatisticsSynchronizer,
    config: EngineConfig,
    /// Live per-tournament locks; entries die with their last holder
    locks: Mutex<HashMap<TournamentId, Weak<Mutex<()>>>>,
    rng: std::sync::Mutex<StdRng>,
}

impl BracketManager {
    /// Create a manager over separate stores
    pub fn new(
        matches: Arc<dyn MatchStore>,
        statistics: Arc<dyn StatisticsStore>,
        roster: Arc<dyn RosterProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            matches,
            synchronizer: StatisticsSynchronizer::new(statistics.clone()),
            statistics,
            roster,
            config,
            locks: Mutex::new(HashMap::new()),
            rng: std::sync::Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a manager over one store implementing every trait
    pub fn from_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: MatchStore + StatisticsStore + RosterProvider + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    /// Use a seeded RNG so first-round pairings are reproducible
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: std::sync::Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    async fn tournament_lock(&self, tournament_id: TournamentId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(&tournament_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(tournament_id, Arc::downgrade(&lock));
        lock
    }

    async fn context(&self, tournament_id: TournamentId) -> BracketResult<TournamentContext> {
        let tournament = self
            .roster
            .tournament(tournament_id)
            .await?
            .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        let teams = self.roster.accepted_teams(tournament_id).await?;
        let rounds = total_rounds(teams.len());

        Ok(TournamentContext {
            tournament,
            rosters: index_rosters(teams),
            rounds,
        })
    }

    async fn load_match(&self, match_id: MatchId) -> BracketResult<Match> {
        self.matches
            .find_match(match_id)
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))
    }

    /// Generate and store the first round of an active tournament
    pub async fn generate_first_round(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Vec<Match>> {
        let lock = self.tournament_lock(tournament_id).await;
        let _guard = lock.lock().await;

        let ctx = self.context(tournament_id).await?;
        if ctx.tournament.status != TournamentStatus::Active {
            return Err(BracketError::InvalidTournamentState {
                expected: TournamentStatus::Active,
                actual: ctx.tournament.status,
            });
        }
        if !self.matches.list_matches(tournament_id).await?.is_empty() {
            return Err(BracketError::BracketAlreadyGenerated(tournament_id));
        }

        let mut teams: Vec<_> = ctx.rosters.values().cloned().collect();
        teams.sort_by_key(|team| team.id);
        let planned = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pair_teams(&ctx.tournament, &teams, &mut *rng)?
        };

        let records = self
            .matches
            .insert_round(planned)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateKey(_) => BracketError::BracketAlreadyGenerated(tournament_id),
                other => BracketError::Store(other),
            })?;

        for record in &records {
            self.synchronizer
                .ensure_stats_for(record, &ctx.rosters, ctx.game_id())
                .await?;
        }

        info!(
            "Generated first round of tournament {tournament_id}: {} teams, {} matches",
            teams.len(),
            records.len()
        );
        Ok(records)
    }

    /// Record the result of a match and advance its winner.
    ///
    /// Returns the finalized match. When the result is stored but propagation
    /// fails, the error is `PropagationFailed` and the result stays recorded.
    pub async fn record_result(
        &self,
        match_id: MatchId,
        first_team_score: Option<i32>,
        second_team_score: Option<i32>,
    ) -> BracketResult<Match> {
        let current = self.load_match(match_id).await?;
        let lock = self.tournament_lock(current.tournament_id).await;
        let _guard = lock.lock().await;
        let current = self.load_match(match_id).await?;

        if current.status.is_final() {
            return Err(BracketError::MatchAlreadyFinalized(match_id));
        }
        let (first_score, second_score) = match (first_team_score, second_team_score) {
            (Some(a), Some(b)) if a >= 0 && b >= 0 => (a, b),
            _ => return Err(BracketError::InvalidScore),
        };
        if first_score == second_score {
            return Err(BracketError::DrawNotAllowed);
        }
        let (Some(first_team), Some(second_team)) = (current.first_team, current.second_team)
        else {
            return Err(BracketError::MatchNotReady(match_id));
        };

        let ctx = self.context(current.tournament_id).await?;
        ctx.ensure_open()?;

        let winning_team = if first_score > second_score {
            first_team
        } else {
            second_team
        };
        let result = MatchResult {
            first_team_score: first_score,
            second_team_score: second_score,
            winning_team,
            end_datetime: Utc::now(),
        };

        let recorded = self
            .matches
            .finalize_match(match_id, result)
            .await?
            .ok_or(BracketError::MatchAlreadyFinalized(match_id))?;

        info!(
            "Match {match_id} ({}) won by team {winning_team} {first_score}-{second_score}",
            recorded.key()
        );

        self.advance(&ctx, &recorded).await?;
        Ok(recorded)
    }

    /// Organizer override of a match's times, scores, status and winner.
    ///
    /// Propagates whenever the stored winner changes.
    pub async fn correct_result(
        &self,
        match_id: MatchId,
        correction: MatchCorrection,
    ) -> BracketResult<Match> {
        let current = self.load_match(match_id).await?;
        let lock = self.tournament_lock(current.tournament_id).await;
        let _guard = lock.lock().await;
        let current = self.load_match(match_id).await?;

        let ctx = self.context(current.tournament_id).await?;
        ctx.ensure_open()?;

        let negative = |score: Option<i32>| score.is_some_and(|s| s < 0);
        if negative(correction.first_team_score) || negative(correction.second_team_score) {
            return Err(BracketError::InvalidScore);
        }

        let winning_team = match correction.winning_team {
            Some(team_id) if current.has_team(team_id) => Some(team_id),
            Some(team_id) => return Err(BracketError::InvalidWinner { match_id, team_id }),
            None => derive_winner(&current, &correction),
        };

        let updated = Match {
            start_datetime: correction.start_datetime,
            end_datetime: correction.end_datetime,
            first_team_score: correction.first_team_score,
            second_team_score: correction.second_team_score,
            winning_team,
            status: correction.status,
            ..current.clone()
        };
        let stored = self.matches.update_match(&updated).await?;

        if stored.winning_team != current.winning_team {
            info!(
                "Match {match_id} winner corrected from {:?} to {:?}",
                current.winning_team, stored.winning_team
            );
            self.advance(&ctx, &stored).await?;
        }
        Ok(stored)
    }

    /// Re-run propagation for one match from stored state
    pub async fn propagate(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        let current = self.load_match(match_id).await?;
        let lock = self.tournament_lock(current.tournament_id).await;
        let _guard = lock.lock().await;
        let current = self.load_match(match_id).await?;

        let ctx = self.context(current.tournament_id).await?;
        ctx.ensure_open()?;
        self.advance(&ctx, &current).await
    }

    /// Re-propagate every decided match level by level and re-run statistics
    /// initialization, repairing a bracket left behind by failed propagation
    pub async fn resync_bracket(&self, tournament_id: TournamentId) -> BracketResult<Bracket> {
        let lock = self.tournament_lock(tournament_id).await;
        let _guard = lock.lock().await;

        let ctx = self.context(tournament_id).await?;
        ctx.ensure_open()?;

        let rounds = ctx.rounds.unwrap_or(0);
        for level in 1..=rounds {
            let matches = self.matches.list_matches(tournament_id).await?;
            for m in matches.iter().filter(|m| m.bracket_level == level) {
                self.synchronizer
                    .ensure_stats_for(m, &ctx.rosters, ctx.game_id())
                    .await?;
                if m.winning_team.is_some() {
                    self.advance(&ctx, m).await?;
                }
            }
        }

        info!("Resynchronized bracket of tournament {tournament_id}");
        self.get_bracket(tournament_id).await
    }

    /// Propagate `processed` and keep statistics rows of the touched match in step.
    ///
    /// A next-round match whose winner was displaced loses its result, and the
    /// cleared match is propagated in turn so later rounds drop that team too.
    /// Returns the first next-round match written.
    async fn advance(
        &self,
        ctx: &TournamentContext,
        processed: &Match,
    ) -> BracketResult<Option<Match>> {
        let Some(rounds) = ctx.rounds else {
            warn!(
                "Tournament {} has {} accepted teams; not propagating match {}",
                ctx.tournament.id,
                ctx.rosters.len(),
                processed.id
            );
            return Ok(None);
        };

        let mut source = processed.clone();
        let mut next = None;
        loop {
            let upsert =
                match propagate_with_retry(self.matches.as_ref(), &source, rounds, &self.config)
                    .await?
                {
                    Propagation::Final => {
                        if let Some(champion) = source.winning_team {
                            info!(
                                "Team {champion} won the final of tournament {}",
                                ctx.tournament.id
                            );
                        }
                        break;
                    }
                    Propagation::Skipped => break,
                    Propagation::Applied(upsert) => upsert,
                };

            let source_id = source.id;
            let failed = |err: StoreError| BracketError::PropagationFailed {
                match_id: source_id,
                source: err,
            };

            let target = upsert.record;
            for team_id in &upsert.displaced {
                if let Some(team) = ctx.rosters.get(team_id) {
                    self.synchronizer
                        .release_team(target.id, team, ctx.game_id())
                        .await
                        .map_err(failed)?;
                }
            }
            self.synchronizer
                .ensure_stats_for(&target, &ctx.rosters, ctx.game_id())
                .await
                .map_err(failed)?;

            if next.is_none() {
                next = Some(target.clone());
            }
            if !upsert.reset {
                break;
            }
            warn!(
                "Cleared result of match {} ({}) after its winner left; teams {:?} displaced",
                target.id,
                target.key(),
                upsert.displaced
            );
            source = target;
        }

        Ok(next)
    }

    /// Bracket grouped by level with its champion
    pub async fn get_bracket(&self, tournament_id: TournamentId) -> BracketResult<Bracket> {
        let ctx = self.context(tournament_id).await?;
        let matches = self.matches.list_matches(tournament_id).await?;
        let deepest = matches.iter().map(|m| m.bracket_level).max().unwrap_or(0);
        let rounds = ctx.rounds.unwrap_or(deepest);

        Ok(Bracket::from_matches(tournament_id, rounds, matches))
    }

    /// All matches of a tournament ordered by level and number
    pub async fn list_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        if self.roster.tournament(tournament_id).await?.is_none() {
            return Err(BracketError::TournamentNotFound(tournament_id));
        }
        Ok(self.matches.list_matches(tournament_id).await?)
    }

    pub async fn get_match(&self, match_id: MatchId) -> BracketResult<Match> {
        self.load_match(match_id).await
    }

    /// Match with its statistics rows split by team
    pub async fn get_match_details(&self, match_id: MatchId) -> BracketResult<MatchDetails> {
        let record = self.load_match(match_id).await?;
        let ctx = self.context(record.tournament_id).await?;
        let rows = self.statistics.match_statistics(match_id).await?;

        let roster_of = |team: Option<TeamId>| -> Vec<PlayerId> {
            team.and_then(|id| ctx.rosters.get(&id))
                .map(|t| t.roster.clone())
                .unwrap_or_default()
        };
        let first_roster = roster_of(record.team(Slot::First));
        let second_roster = roster_of(record.team(Slot::Second));

        let (mut first_team_statistics, mut second_team_statistics) = (Vec::new(), Vec::new());
        for row in rows {
            if first_roster.contains(&row.player_id) {
                first_team_statistics.push(row);
            } else if second_roster.contains(&row.player_id) {
                second_team_statistics.push(row);
            }
        }

        Ok(MatchDetails {
            record,
            first_team_statistics,
            second_team_statistics,
        })
    }

    /// Organizer-created match
    pub async fn create_match(&self, new_match: NewMatch) -> BracketResult<Match> {
        let tournament_id = new_match.key.tournament_id;
        let lock = self.tournament_lock(tournament_id).await;
        let _guard = lock.lock().await;

        let ctx = self.context(tournament_id).await?;
        ctx.ensure_open()?;

        if new_match.key.bracket_level == 0 || new_match.key.match_number == 0 {
            return Err(BracketError::InvalidMatch(
                "bracket level and match number start at 1".to_string(),
            ));
        }
        let (Some(first), Some(second)) = (new_match.first_team, new_match.second_team) else {
            return Err(BracketError::InvalidMatch(
                "both teams are required".to_string(),
            ));
        };
        if first == second {
            return Err(BracketError::InvalidMatch(
                "a team cannot play against itself".to_string(),
            ));
        }
        for team_id in [first, second] {
            if !ctx.rosters.contains_key(&team_id) {
                return Err(BracketError::InvalidMatch(format!(
                    "team {team_id} is not an accepted participant"
                )));
            }
        }
        if new_match
            .end_datetime
            .is_some_and(|end| end < new_match.start_datetime)
        {
            return Err(BracketError::InvalidMatch(
                "end time precedes start time".to_string(),
            ));
        }

        let key = new_match.key;
        let record = self
            .matches
            .insert_match(new_match)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateKey(_) => BracketError::DuplicateMatch(key),
                other => BracketError::Store(other),
            })?;

        self.synchronizer
            .ensure_stats_for(&record, &ctx.rosters, ctx.game_id())
            .await?;

        info!("Created match {} at {key}", record.id);
        Ok(record)
    }

    /// Delete a match of a tournament that is not running or finished
    pub async fn delete_match(&self, match_id: MatchId) -> BracketResult<()> {
        let record = self.load_match(match_id).await?;
        let lock = self.tournament_lock(record.tournament_id).await;
        let _guard = lock.lock().await;

        let ctx = self.context(record.tournament_id).await?;
        if matches!(
            ctx.tournament.status,
            TournamentStatus::Active | TournamentStatus::Completed
        ) {
            return Err(BracketError::MatchDeletionForbidden(ctx.tournament.status));
        }

        self.synchronizer
            .release_match(match_id, ctx.game_id())
            .await?;
        if !self.matches.delete_match(match_id).await? {
            return Err(BracketError::MatchNotFound(match_id));
        }

        info!("Deleted match {match_id} ({})", record.key());
        Ok(())
    }

    /// Submit per-player statistics for a started match
    pub async fn submit_match_statistics(
        &self,
        match_id: MatchId,
        submissions: &[PlayerStatSubmission],
    ) -> BracketResult<Vec<MatchStatistics>> {
        let record = self.load_match(match_id).await?;
        let ctx = self.context(record.tournament_id).await?;
        self.synchronizer
            .apply_match_statistics(&record, &ctx.rosters, ctx.game_id(), submissions)
            .await
    }

    /// Correct one statistics row of a match
    pub async fn update_match_statistic(
        &self,
        match_id: MatchId,
        statistic_id: StatisticId,
        line: StatLine,
    ) -> BracketResult<MatchStatistics> {
        let record = self.load_match(match_id).await?;
        let row = self
            .statistics
            .find_statistic(statistic_id)
            .await?
            .ok_or(BracketError::StatisticNotFound(statistic_id))?;
        if row.match_id != match_id {
            return Err(BracketError::StatisticMismatch {
                statistic_id,
                match_id,
            });
        }
        if !record.status.accepts_statistics() {
            return Err(BracketError::MatchNotStarted {
                match_id,
                status: record.status,
            });
        }
        if !line.is_valid() {
            return Err(BracketError::InvalidStatistic);
        }

        let ctx = self.context(record.tournament_id).await?;
        Ok(self
            .statistics
            .record_line(match_id, row.player_id, ctx.game_id(), line)
            .await?)
    }

    /// Aggregate of a player in a game; zeros when the player never played it
    pub async fn get_player_statistics(
        &self,
        player_id: PlayerId,
        game_id: GameId,
    ) -> BracketResult<PlayerStatistics> {
        Ok(self
            .statistics
            .player_statistics(player_id, game_id)
            .await?
            .unwrap_or_else(|| PlayerStatistics::empty(player_id, game_id)))
    }

    /// Players of a game ordered by total kills, best first
    pub async fn ranking_by_kills(&self, game_id: GameId) -> BracketResult<Vec<PlayerStatistics>> {
        let mut ranking = self.statistics.game_statistics(game_id).await?;
        ranking.sort_by(|a, b| {
            b.total_kills
                .cmp(&a.total_kills)
                .then(a.player_id.cmp(&b.player_id))
        });
        Ok(ranking)
    }

    /// One player's row in one match
    pub async fn get_match_player_statistics(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> BracketResult<Option<MatchStatistics>> {
        self.load_match(match_id).await?;
        Ok(self
            .statistics
            .find_match_player(match_id, player_id)
            .await?)
    }
}

/// Winner implied by the scores of a completed correction
fn derive_winner(current: &Match, correction: &MatchCorrection) -> Option<TeamId> {
    if correction.status != MatchStatus::Completed {
        return None;
    }
    match (correction.first_team_score, correction.second_team_score) {
        (Some(a), Some(b)) if a > b => current.first_team,
        (Some(a), Some(b)) if b > a => current.second_team,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::{MatchKey, Team};
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;

    fn setup(team_count: i64) -> (Arc<InMemoryStore>, BracketManager) {
        let store = Arc::new(InMemoryStore::new());
        let teams = (1..=team_count)
            .map(|id| Team::new(id, format!("Team {id}"), vec![id * 10, id * 10 + 1]))
            .collect();
        store.seed_tournament(
            Tournament {
                id: 1,
                name: "Cup".to_string(),
                game_id: 9,
                status: TournamentStatus::Active,
                start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                max_teams: Some(team_count as u32),
            },
            teams,
        );
        let manager =
            BracketManager::from_store(store.clone(), EngineConfig::default()).with_seed(11);
        (store, manager)
    }

    #[tokio::test]
    async fn test_tournament_locks_are_dropped_when_released() {
        let (_store, manager) = setup(4);
        manager.generate_first_round(1).await.unwrap();

        let held = manager.tournament_lock(2).await;
        {
            let locks = manager.locks.lock().await;
            assert_eq!(locks.len(), 1, "released lock of tournament 1 is pruned");
            assert!(locks.contains_key(&2));
        }
        let shared = manager.tournament_lock(2).await;
        assert!(Arc::ptr_eq(&held, &shared));

        drop((held, shared));
        manager.tournament_lock(3).await;
        assert_eq!(manager.locks.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_generation_requires_active_tournament() {
        let (store, manager) = setup(4);
        store.set_tournament_status(1, TournamentStatus::Pending);

        let err = manager.generate_first_round(1).await.unwrap_err();
        assert!(matches!(
            err,
            BracketError::InvalidTournamentState {
                actual: TournamentStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generation_only_once() {
        let (_store, manager) = setup(4);
        manager.generate_first_round(1).await.unwrap();
        let err = manager.generate_first_round(1).await.unwrap_err();
        assert!(matches!(err, BracketError::BracketAlreadyGenerated(1)));
    }

    #[tokio::test]
    async fn test_generation_counts_each_player_once() {
        let (store, manager) = setup(4);
        manager.generate_first_round(1).await.unwrap();

        let stats = store.player_statistics(10, 9).await.unwrap().unwrap();
        assert_eq!(stats.matches_played, 1);
        assert_eq!(stats.total_kills, 0);
    }

    #[tokio::test]
    async fn test_missing_scores_are_invalid() {
        let (_store, manager) = setup(2);
        let round = manager.generate_first_round(1).await.unwrap();

        let err = manager
            .record_result(round[0].id, Some(3), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::InvalidScore));
        let err = manager
            .record_result(round[0].id, Some(-1), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::InvalidScore));
    }

    #[tokio::test]
    async fn test_correction_rejects_foreign_winner() {
        let (_store, manager) = setup(4);
        let round = manager.generate_first_round(1).await.unwrap();
        let m = &round[0];

        let err = manager
            .correct_result(
                m.id,
                MatchCorrection {
                    start_datetime: m.start_datetime,
                    end_datetime: None,
                    first_team_score: Some(1),
                    second_team_score: Some(0),
                    status: MatchStatus::Completed,
                    winning_team: Some(99),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::InvalidWinner { team_id: 99, .. }));
    }

    #[tokio::test]
    async fn test_correction_derives_winner_and_propagates() {
        let (_store, manager) = setup(4);
        let round = manager.generate_first_round(1).await.unwrap();
        let m = &round[0];

        let corrected = manager
            .correct_result(
                m.id,
                MatchCorrection {
                    start_datetime: m.start_datetime,
                    end_datetime: Some(Utc::now()),
                    first_team_score: Some(0),
                    second_team_score: Some(2),
                    status: MatchStatus::Completed,
                    winning_team: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(corrected.winning_team, m.second_team);

        let next = manager
            .get_bracket(1)
            .await
            .unwrap()
            .rounds
            .into_iter()
            .find(|r| r.bracket_level == 2)
            .unwrap();
        assert_eq!(next.matches[0].first_team, m.second_team);
        assert_eq!(next.matches[0].key(), MatchKey::new(1, 2, 1));
    }

    #[tokio::test]
    async fn test_closed_tournament_rejects_results() {
        let (store, manager) = setup(2);
        let round = manager.generate_first_round(1).await.unwrap();
        store.set_tournament_status(1, TournamentStatus::Cancelled);

        let err = manager
            .record_result(round[0].id, Some(2), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BracketError::TournamentClosed(TournamentStatus::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_delete_forbidden_while_active() {
        let (store, manager) = setup(2);
        let round = manager.generate_first_round(1).await.unwrap();

        let err = manager.delete_match(round[0].id).await.unwrap_err();
        assert!(matches!(err, BracketError::MatchDeletionForbidden(_)));

        store.set_tournament_status(1, TournamentStatus::Cancelled);
        manager.delete_match(round[0].id).await.unwrap();
        let stats = store.player_statistics(10, 9).await.unwrap().unwrap();
        assert_eq!(stats.matches_played, 0);
    }

    #[tokio::test]
    async fn test_ranking_orders_by_kills() {
        let (_store, manager) = setup(2);
        let round = manager.generate_first_round(1).await.unwrap();
        let m = &round[0];
        manager
            .correct_result(
                m.id,
                MatchCorrection {
                    start_datetime: m.start_datetime,
                    end_datetime: None,
                    first_team_score: None,
                    second_team_score: None,
                    status: MatchStatus::InProgress,
                    winning_team: None,
                },
            )
            .await
            .unwrap();

        let submissions = [
            PlayerStatSubmission {
                player_id: 10,
                kills: 2,
                deaths: 1,
                assists: 0,
            },
            PlayerStatSubmission {
                player_id: 20,
                kills: 7,
                deaths: 0,
                assists: 1,
            },
        ];
        manager.submit_match_statistics(m.id, &submissions).await.unwrap();

        let ranking = manager.ranking_by_kills(9).await.unwrap();
        assert_eq!(ranking[0].player_id, 20);
        assert_eq!(ranking[1].player_id, 10);
        assert_eq!(ranking.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_player_statistics_are_zero() {
        let (_store, manager) = setup(2);
        let stats = manager.get_player_statistics(404, 9).await.unwrap();
        assert_eq!(stats, PlayerStatistics::empty(404, 9));
    }
}
