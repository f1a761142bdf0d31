//! In-memory bracket store.
//!
//! An arena of match records keyed by id and by natural key, together with
//! statistics rows and the tournament/roster registry. All trait operations
//! take one lock for their whole duration, which gives them the same
//! atomicity as the conditional writes of the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    MatchStore, RosterProvider, SlotUpsert, SlotWrite, StatisticsStore, StoreError, StoreResult,
};
use crate::bracket::models::{
    GameId, Match, MatchId, MatchKey, MatchResult, MatchStatus, NewMatch, PlayerId, Team, TeamId,
    Tournament, TournamentId, TournamentStatus,
};
use crate::stats::models::{MatchStatistics, PlayerStatistics, StatLine, StatisticId};

#[derive(Default)]
struct MemoryState {
    tournaments: HashMap<TournamentId, Tournament>,
    teams: HashMap<TeamId, Team>,
    accepted: HashMap<TournamentId, BTreeSet<TeamId>>,
    matches: HashMap<MatchId, Match>,
    match_keys: HashMap<MatchKey, MatchId>,
    next_match_id: MatchId,
    statistics: HashMap<StatisticId, MatchStatistics>,
    statistic_keys: HashMap<(MatchId, PlayerId), StatisticId>,
    next_statistic_id: StatisticId,
    players: HashMap<(PlayerId, GameId), PlayerStatistics>,
    failing_upserts: usize,
}

impl MemoryState {
    fn insert(&mut self, new_match: NewMatch) -> StoreResult<Match> {
        if self.match_keys.contains_key(&new_match.key) {
            return Err(StoreError::DuplicateKey(new_match.key));
        }

        self.next_match_id += 1;
        let id = self.next_match_id;
        let record = Match {
            id,
            tournament_id: new_match.key.tournament_id,
            bracket_level: new_match.key.bracket_level,
            match_number: new_match.key.match_number,
            first_team: new_match.first_team,
            second_team: new_match.second_team,
            start_datetime: new_match.start_datetime,
            end_datetime: new_match.end_datetime,
            first_team_score: None,
            second_team_score: None,
            winning_team: None,
            status: new_match.status,
        };

        self.match_keys.insert(new_match.key, id);
        self.matches.insert(id, record.clone());
        Ok(record)
    }

    fn aggregate(&mut self, player_id: PlayerId, game_id: GameId) -> &mut PlayerStatistics {
        self.players
            .entry((player_id, game_id))
            .or_insert_with(|| PlayerStatistics::empty(player_id, game_id))
    }
}

/// In-memory implementation of every store trait
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tournament with its accepted teams
    pub fn seed_tournament(&self, tournament: Tournament, teams: Vec<Team>) {
        let mut state = self.state();
        let accepted = state.accepted.entry(tournament.id).or_default();
        for team in &teams {
            accepted.insert(team.id);
        }
        for team in teams {
            state.teams.insert(team.id, team);
        }
        state.tournaments.insert(tournament.id, tournament);
    }

    /// Register or replace a team without accepting it anywhere
    pub fn add_team(&self, team: Team) {
        self.state().teams.insert(team.id, team);
    }

    /// Accept a registered team into a tournament
    pub fn accept_team(&self, tournament_id: TournamentId, team_id: TeamId) {
        self.state()
            .accepted
            .entry(tournament_id)
            .or_default()
            .insert(team_id);
    }

    /// Change a tournament's status, as the tournament-status collaborator does
    pub fn set_tournament_status(&self, tournament_id: TournamentId, status: TournamentStatus) {
        if let Some(tournament) = self.state().tournaments.get_mut(&tournament_id) {
            tournament.status = status;
        }
    }

    /// Make the next `count` slot upserts fail with `StoreError::Unavailable`
    pub fn fail_next_upserts(&self, count: usize) {
        self.state().failing_upserts = count;
    }

    pub fn match_count(&self) -> usize {
        self.state().matches.len()
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn insert_match(&self, new_match: NewMatch) -> StoreResult<Match> {
        self.state().insert(new_match)
    }

    async fn insert_round(&self, matches: Vec<NewMatch>) -> StoreResult<Vec<Match>> {
        let mut state = self.state();

        // Validate the whole round before writing any of it
        let mut seen = BTreeSet::new();
        for new_match in &matches {
            if state.match_keys.contains_key(&new_match.key) || !seen.insert(new_match.key) {
                return Err(StoreError::DuplicateKey(new_match.key));
            }
        }

        matches
            .into_iter()
            .map(|new_match| state.insert(new_match))
            .collect()
    }

    async fn find_match(&self, match_id: MatchId) -> StoreResult<Option<Match>> {
        Ok(self.state().matches.get(&match_id).cloned())
    }

    async fn find_by_key(&self, key: MatchKey) -> StoreResult<Option<Match>> {
        let state = self.state();
        Ok(state
            .match_keys
            .get(&key)
            .and_then(|id| state.matches.get(id))
            .cloned())
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> StoreResult<Vec<Match>> {
        let state = self.state();
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.bracket_level, m.match_number));
        Ok(matches)
    }

    async fn finalize_match(
        &self,
        match_id: MatchId,
        result: MatchResult,
    ) -> StoreResult<Option<Match>> {
        let mut state = self.state();
        let Some(record) = state.matches.get_mut(&match_id) else {
            return Ok(None);
        };
        if record.status.is_final() {
            return Ok(None);
        }

        record.first_team_score = Some(result.first_team_score);
        record.second_team_score = Some(result.second_team_score);
        record.winning_team = Some(result.winning_team);
        record.end_datetime = Some(result.end_datetime);
        record.status = MatchStatus::Completed;
        Ok(Some(record.clone()))
    }

    async fn update_match(&self, updated: &Match) -> StoreResult<Match> {
        let mut state = self.state();
        let record = state.matches.get_mut(&updated.id).ok_or_else(|| {
            StoreError::Corrupt(format!("match {} vanished during update", updated.id))
        })?;

        record.start_datetime = updated.start_datetime;
        record.end_datetime = updated.end_datetime;
        record.first_team_score = updated.first_team_score;
        record.second_team_score = updated.second_team_score;
        record.winning_team = updated.winning_team;
        record.status = updated.status;
        Ok(record.clone())
    }

    async fn upsert_slots(
        &self,
        key: MatchKey,
        first: SlotWrite,
        second: SlotWrite,
        default_start: DateTime<Utc>,
    ) -> StoreResult<SlotUpsert> {
        let mut state = self.state();

        if state.failing_upserts > 0 {
            state.failing_upserts -= 1;
            return Err(StoreError::Unavailable(format!("upsert at {key} rejected")));
        }

        if let Some(id) = state.match_keys.get(&key).copied() {
            let record = state
                .matches
                .get_mut(&id)
                .ok_or_else(|| StoreError::Corrupt(format!("dangling key {key}")))?;

            let mut displaced = Vec::new();
            let new_first = first.apply(record.first_team);
            let new_second = second.apply(record.second_team);
            for (old, new) in [(record.first_team, new_first), (record.second_team, new_second)] {
                match old {
                    Some(old) if new != Some(old) => displaced.push(old),
                    _ => {}
                }
            }
            record.first_team = new_first;
            record.second_team = new_second;

            let reset = record
                .winning_team
                .is_some_and(|winner| displaced.contains(&winner));
            if reset {
                record.winning_team = None;
                record.first_team_score = None;
                record.second_team_score = None;
                record.end_datetime = None;
                record.status = MatchStatus::Scheduled;
            }

            return Ok(SlotUpsert {
                record: record.clone(),
                created: false,
                displaced,
                reset,
            });
        }

        let record = state.insert(NewMatch {
            key,
            first_team: first.apply(None),
            second_team: second.apply(None),
            start_datetime: default_start,
            end_datetime: None,
            status: MatchStatus::Scheduled,
        })?;

        Ok(SlotUpsert {
            record,
            created: true,
            displaced: Vec::new(),
            reset: false,
        })
    }

    async fn delete_match(&self, match_id: MatchId) -> StoreResult<bool> {
        let mut state = self.state();
        match state.matches.remove(&match_id) {
            Some(record) => {
                state.match_keys.remove(&record.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl StatisticsStore for InMemoryStore {
    async fn register_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        if state.statistic_keys.contains_key(&(match_id, player_id)) {
            return Ok(false);
        }

        state.next_statistic_id += 1;
        let id = state.next_statistic_id;
        state.statistics.insert(
            id,
            MatchStatistics {
                id,
                match_id,
                player_id,
                kills: 0,
                deaths: 0,
                assists: 0,
            },
        );
        state.statistic_keys.insert((match_id, player_id), id);

        let aggregate = state.aggregate(player_id, game_id);
        aggregate.matches_played += 1;
        aggregate.recompute_averages();
        Ok(true)
    }

    async fn release_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        let Some(id) = state.statistic_keys.remove(&(match_id, player_id)) else {
            return Ok(false);
        };
        let Some(row) = state.statistics.remove(&id) else {
            return Ok(false);
        };

        let aggregate = state.aggregate(player_id, game_id);
        aggregate.matches_played = (aggregate.matches_played - 1).max(0);
        aggregate.fold_delta(row.line(), StatLine::default());
        Ok(true)
    }

    async fn record_line(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
        line: StatLine,
    ) -> StoreResult<MatchStatistics> {
        let mut state = self.state();

        let (previous, newly_associated) = match state.statistic_keys.get(&(match_id, player_id)) {
            Some(id) => {
                let row = state
                    .statistics
                    .get(id)
                    .ok_or_else(|| StoreError::Corrupt(format!("dangling statistic {id}")))?;
                (row.line(), false)
            }
            None => (StatLine::default(), true),
        };

        let id = match state.statistic_keys.get(&(match_id, player_id)) {
            Some(id) => *id,
            None => {
                state.next_statistic_id += 1;
                let id = state.next_statistic_id;
                state.statistic_keys.insert((match_id, player_id), id);
                id
            }
        };

        let row = MatchStatistics {
            id,
            match_id,
            player_id,
            kills: line.kills,
            deaths: line.deaths,
            assists: line.assists,
        };
        state.statistics.insert(id, row.clone());

        let aggregate = state.aggregate(player_id, game_id);
        if newly_associated {
            aggregate.matches_played += 1;
        }
        aggregate.fold_delta(previous, line);
        Ok(row)
    }

    async fn match_statistics(&self, match_id: MatchId) -> StoreResult<Vec<MatchStatistics>> {
        let state = self.state();
        let mut rows: Vec<MatchStatistics> = state
            .statistics
            .values()
            .filter(|row| row.match_id == match_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    async fn find_statistic(
        &self,
        statistic_id: StatisticId,
    ) -> StoreResult<Option<MatchStatistics>> {
        Ok(self.state().statistics.get(&statistic_id).cloned())
    }

    async fn find_match_player(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> StoreResult<Option<MatchStatistics>> {
        let state = self.state();
        Ok(state
            .statistic_keys
            .get(&(match_id, player_id))
            .and_then(|id| state.statistics.get(id))
            .cloned())
    }

    async fn player_statistics(
        &self,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<Option<PlayerStatistics>> {
        Ok(self.state().players.get(&(player_id, game_id)).cloned())
    }

    async fn game_statistics(&self, game_id: GameId) -> StoreResult<Vec<PlayerStatistics>> {
        let state = self.state();
        let mut rows: Vec<PlayerStatistics> = state
            .players
            .values()
            .filter(|stats| stats.game_id == game_id)
            .cloned()
            .collect();
        rows.sort_by_key(|stats| stats.player_id);
        Ok(rows)
    }
}

#[async_trait]
impl RosterProvider for InMemoryStore {
    async fn tournament(&self, tournament_id: TournamentId) -> StoreResult<Option<Tournament>> {
        Ok(self.state().tournaments.get(&tournament_id).cloned())
    }

    async fn accepted_teams(&self, tournament_id: TournamentId) -> StoreResult<Vec<Team>> {
        let state = self.state();
        let Some(accepted) = state.accepted.get(&tournament_id) else {
            return Ok(Vec::new());
        };
        Ok(accepted
            .iter()
            .filter_map(|id| state.teams.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tournament(id: TournamentId) -> Tournament {
        Tournament {
            id,
            name: format!("Cup {id}"),
            game_id: 1,
            status: TournamentStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            max_teams: None,
        }
    }

    fn new_match(level: u32, number: u32) -> NewMatch {
        NewMatch::scheduled(MatchKey::new(1, level, number), 1, 2, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let store = InMemoryStore::new();
        store.insert_match(new_match(1, 1)).await.unwrap();

        let err = store.insert_match(new_match(1, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_insert_round_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.insert_match(new_match(1, 2)).await.unwrap();

        let result = store
            .insert_round(vec![new_match(1, 1), new_match(1, 2)])
            .await;
        assert!(result.is_err());
        assert_eq!(store.match_count(), 1, "partial round must not be written");
    }

    #[tokio::test]
    async fn test_finalize_only_once() {
        let store = InMemoryStore::new();
        let m = store.insert_match(new_match(1, 1)).await.unwrap();
        let result = MatchResult {
            first_team_score: 3,
            second_team_score: 1,
            winning_team: 1,
            end_datetime: Utc::now(),
        };

        assert!(store.finalize_match(m.id, result).await.unwrap().is_some());
        assert!(store.finalize_match(m.id, result).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = InMemoryStore::new();
        let key = MatchKey::new(1, 2, 1);

        let created = store
            .upsert_slots(key, SlotWrite::Set(Some(5)), SlotWrite::Keep, Utc::now())
            .await
            .unwrap();
        assert!(created.created);
        assert_eq!(created.record.first_team, Some(5));
        assert_eq!(created.record.second_team, None);

        let merged = store
            .upsert_slots(key, SlotWrite::Keep, SlotWrite::Set(Some(7)), Utc::now())
            .await
            .unwrap();
        assert!(!merged.created);
        assert_eq!(merged.record.id, created.record.id);
        assert_eq!(merged.record.first_team, Some(5));
        assert_eq!(merged.record.second_team, Some(7));
        assert!(merged.displaced.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_reports_displaced_team() {
        let store = InMemoryStore::new();
        let key = MatchKey::new(1, 2, 1);
        store
            .upsert_slots(key, SlotWrite::Set(Some(5)), SlotWrite::Keep, Utc::now())
            .await
            .unwrap();

        let replaced = store
            .upsert_slots(key, SlotWrite::Set(Some(6)), SlotWrite::Keep, Utc::now())
            .await
            .unwrap();
        assert_eq!(replaced.displaced, vec![5]);
        assert!(!replaced.reset);
    }

    #[tokio::test]
    async fn test_upsert_clears_result_of_displaced_winner() {
        let store = InMemoryStore::new();
        let m = store.insert_match(new_match(2, 1)).await.unwrap();
        let result = MatchResult {
            first_team_score: 3,
            second_team_score: 1,
            winning_team: 1,
            end_datetime: Utc::now(),
        };
        store.finalize_match(m.id, result).await.unwrap();

        // Replacing the loser keeps the result
        let kept = store
            .upsert_slots(m.key(), SlotWrite::Keep, SlotWrite::Set(Some(4)), Utc::now())
            .await
            .unwrap();
        assert!(!kept.reset);
        assert_eq!(kept.record.winning_team, Some(1));
        assert_eq!(kept.record.status, MatchStatus::Completed);

        let cleared = store
            .upsert_slots(m.key(), SlotWrite::Set(Some(3)), SlotWrite::Keep, Utc::now())
            .await
            .unwrap();
        assert!(cleared.reset);
        assert_eq!(cleared.displaced, vec![1]);
        assert_eq!(cleared.record.first_team, Some(3));
        assert_eq!(cleared.record.second_team, Some(4));
        assert_eq!(cleared.record.winning_team, None);
        assert_eq!(cleared.record.first_team_score, None);
        assert_eq!(cleared.record.second_team_score, None);
        assert_eq!(cleared.record.end_datetime, None);
        assert_eq!(cleared.record.status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_injected_upsert_failure() {
        let store = InMemoryStore::new();
        store.fail_next_upserts(1);
        let key = MatchKey::new(1, 2, 1);

        let err = store
            .upsert_slots(key, SlotWrite::Set(Some(5)), SlotWrite::Keep, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(
            store
                .upsert_slots(key, SlotWrite::Set(Some(5)), SlotWrite::Keep, Utc::now())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_register_participant_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(store.register_participant(1, 10, 1).await.unwrap());
        assert!(!store.register_participant(1, 10, 1).await.unwrap());

        let stats = store.player_statistics(10, 1).await.unwrap().unwrap();
        assert_eq!(stats.matches_played, 1);
    }

    #[tokio::test]
    async fn test_release_participant_reverses_contribution() {
        let store = InMemoryStore::new();
        store.register_participant(1, 10, 1).await.unwrap();
        store.register_participant(2, 10, 1).await.unwrap();
        store
            .record_line(1, 10, 1, StatLine::new(6, 2, 1))
            .await
            .unwrap();

        assert!(store.release_participant(1, 10, 1).await.unwrap());
        let stats = store.player_statistics(10, 1).await.unwrap().unwrap();
        assert_eq!(stats.matches_played, 1);
        assert_eq!(stats.total_kills, 0);
        assert!(store.find_match_player(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accepted_teams_ordered_by_id() {
        let store = InMemoryStore::new();
        store.seed_tournament(
            tournament(1),
            vec![Team::new(3, "C", vec![]), Team::new(1, "A", vec![])],
        );
        store.add_team(Team::new(2, "B", vec![]));
        store.accept_team(1, 2);

        let ids: Vec<TeamId> = store
            .accepted_teams(1)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            store.tournament_status(1).await.unwrap(),
            Some(TournamentStatus::Active)
        );
    }
}
