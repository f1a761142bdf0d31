//! Shared fixtures for the bracket engine integration tests.

#![allow(dead_code)]

use bracket_engine::bracket::{Bracket, BracketManager, Match, Team, Tournament, TournamentStatus};
use bracket_engine::config::EngineConfig;
use bracket_engine::store::InMemoryStore;
use chrono::NaiveDate;
use std::sync::Arc;

pub const TOURNAMENT_ID: i64 = 1;
pub const GAME_ID: i64 = 7;

pub fn tournament(status: TournamentStatus) -> Tournament {
    Tournament {
        id: TOURNAMENT_ID,
        name: "Integration Cup".to_string(),
        game_id: GAME_ID,
        status,
        start_date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
        max_teams: None,
    }
}

/// Teams 1..=n, team t has players t*100+1..=t*100+3
pub fn teams(n: i64) -> Vec<Team> {
    (1..=n)
        .map(|id| {
            Team::new(
                id,
                format!("Team {id}"),
                vec![id * 100 + 1, id * 100 + 2, id * 100 + 3],
            )
        })
        .collect()
}

pub fn roster_of(team_id: i64) -> Vec<i64> {
    vec![team_id * 100 + 1, team_id * 100 + 2, team_id * 100 + 3]
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        propagation_backoff_ms: 1,
        ..EngineConfig::default()
    }
}

/// Active tournament with `n` accepted teams and a seeded manager
pub fn setup(n: i64) -> (Arc<InMemoryStore>, BracketManager) {
    setup_with(n, fast_config())
}

pub fn setup_with(n: i64, config: EngineConfig) -> (Arc<InMemoryStore>, BracketManager) {
    let store = Arc::new(InMemoryStore::new());
    store.seed_tournament(tournament(TournamentStatus::Active), teams(n));
    let manager = BracketManager::from_store(store.clone(), config).with_seed(2026);
    (store, manager)
}

pub async fn find(manager: &BracketManager, level: u32, number: u32) -> Option<Match> {
    manager
        .list_matches(TOURNAMENT_ID)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.bracket_level == level && m.match_number == number)
}

/// Record a first-team win for every ready match until nothing is left to play
pub async fn play_out(manager: &BracketManager) -> Bracket {
    loop {
        let pending: Vec<Match> = manager
            .list_matches(TOURNAMENT_ID)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_ready() && !m.status.is_final())
            .collect();
        if pending.is_empty() {
            break;
        }
        for m in pending {
            manager.record_result(m.id, Some(3), Some(1)).await.unwrap();
        }
    }
    manager.get_bracket(TOURNAMENT_ID).await.unwrap()
}
