//! Tournament fixtures for the in-memory backend.
//!
//! The in-memory store has no tournament registry of its own, so a server
//! started with `STORAGE=memory` loads tournaments and their accepted teams
//! from a JSON seed file:
//!
//! ```json
//! {
//!   "tournaments": [
//!     {
//!       "tournament": {
//!         "id": 1, "name": "Autumn Cup", "game_id": 1, "status": "ACTIVE",
//!         "start_date": "2026-11-07", "max_teams": 4
//!       },
//!       "teams": [{ "id": 1, "name": "Falcons", "roster": [101, 102] }]
//!     }
//!   ]
//! }
//! ```

use bracket_engine::bracket::{Team, Tournament, TournamentId};
use bracket_engine::store::InMemoryStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Contents of a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedFile {
    pub tournaments: Vec<SeedTournament>,
}

/// One tournament with the teams accepted into it
#[derive(Debug, Clone, Deserialize)]
pub struct SeedTournament {
    pub tournament: Tournament,
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Seed loading errors
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tournament {0} is listed more than once")]
    DuplicateTournament(TournamentId),
}

impl SeedFile {
    /// Parse a seed document, rejecting repeated tournament ids
    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        let seed: SeedFile = serde_json::from_str(raw)?;

        let mut seen = HashSet::new();
        for entry in &seed.tournaments {
            if !seen.insert(entry.tournament.id) {
                return Err(SeedError::DuplicateTournament(entry.tournament.id));
            }
        }
        Ok(seed)
    }

    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Register every tournament and accept its teams; returns the tournament count
    pub fn apply(self, store: &InMemoryStore) -> usize {
        let count = self.tournaments.len();
        for entry in self.tournaments {
            store.seed_tournament(entry.tournament, entry.teams);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracket_engine::bracket::TournamentStatus;
    use bracket_engine::store::RosterProvider;

    const SEED: &str = r#"{
        "tournaments": [
            {
                "tournament": {
                    "id": 4, "name": "Night Cup", "game_id": 2, "status": "ACTIVE",
                    "start_date": "2026-11-07", "max_teams": null
                },
                "teams": [
                    { "id": 40, "name": "Owls", "roster": [401, 402] },
                    { "id": 41, "name": "Bats", "roster": [411, 412] }
                ]
            },
            {
                "tournament": {
                    "id": 5, "name": "Open Qualifier", "game_id": 2, "status": "PENDING",
                    "start_date": "2026-12-01", "max_teams": 16
                }
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_apply_registers_tournaments_and_teams() {
        let store = InMemoryStore::new();
        let count = SeedFile::from_json(SEED).unwrap().apply(&store);
        assert_eq!(count, 2);

        let night = store.tournament(4).await.unwrap().unwrap();
        assert_eq!(night.status, TournamentStatus::Active);
        let teams = store.accepted_teams(4).await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].roster, vec![401, 402]);

        assert!(store.accepted_teams(5).await.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_tournament_rejected() {
        let raw = r#"{ "tournaments": [
            { "tournament": { "id": 1, "name": "A", "game_id": 1, "status": "ACTIVE",
                              "start_date": "2026-11-07", "max_teams": null } },
            { "tournament": { "id": 1, "name": "B", "game_id": 1, "status": "ACTIVE",
                              "start_date": "2026-11-08", "max_teams": null } }
        ] }"#;
        assert!(matches!(
            SeedFile::from_json(raw).unwrap_err(),
            SeedError::DuplicateTournament(1)
        ));
    }

    #[test]
    fn test_malformed_seed_rejected() {
        let raw = r#"{ "tournaments": [ { "tournament": { "id": 1, "status": "LIVE" } } ] }"#;
        assert!(matches!(
            SeedFile::from_json(raw).unwrap_err(),
            SeedError::Parse(_)
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SeedFile::load(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/seed.json"));
    }
}
