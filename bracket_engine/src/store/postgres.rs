//! PostgreSQL implementation of the store traits.
//!
//! The atomic operations are single conditional statements
//! (`UPDATE ... WHERE status NOT IN ... RETURNING`,
//! `INSERT ... ON CONFLICT ... DO UPDATE`) executed inside short transactions.
//! Timestamps are stored as `TIMESTAMP` columns holding UTC.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;

use super::{
    MatchStore, RosterProvider, SlotUpsert, SlotWrite, StatisticsStore, StoreError, StoreResult,
};
use crate::bracket::models::{
    GameId, Match, MatchId, MatchKey, MatchResult, NewMatch, PlayerId, Team, TeamId, Tournament,
    TournamentId, TournamentStatus,
};
use crate::stats::models::{MatchStatistics, PlayerStatistics, StatLine, StatisticId};

const MATCH_COLUMNS: &str = "id, tournament_id, bracket_level, match_number_in_round, \
     first_team_id, second_team_id, start_datetime, end_datetime, \
     first_team_score, second_team_score, winning_team_id, status";

const STATISTIC_COLUMNS: &str = "id, match_id, player_id, kills, deaths, assists";

const PLAYER_COLUMNS: &str = "player_id, game_id, total_kills, total_deaths, total_assists, \
     matches_played, average_kills, average_deaths, average_assists";

/// Bracket store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBracketStore {
    pool: PgPool,
}

impl PgBracketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply a played-match delta and a line replacement to a player aggregate
    async fn adjust_aggregate(
        tx: &mut Transaction<'_, Postgres>,
        player_id: PlayerId,
        game_id: GameId,
        played_delta: i32,
        old: StatLine,
        new: StatLine,
    ) -> StoreResult<PlayerStatistics> {
        sqlx::query(
            "INSERT INTO player_statistics (player_id, game_id)
             VALUES ($1, $2)
             ON CONFLICT (player_id, game_id) DO NOTHING",
        )
        .bind(player_id)
        .bind(game_id)
        .execute(&mut **tx)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_statistics
             WHERE player_id = $1 AND game_id = $2
             FOR UPDATE"
        ))
        .bind(player_id)
        .bind(game_id)
        .fetch_one(&mut **tx)
        .await?;

        let mut stats = player_from_row(&row);
        stats.matches_played = (stats.matches_played + played_delta).max(0);
        stats.fold_delta(old, new);

        sqlx::query(
            "UPDATE player_statistics
             SET total_kills = $3, total_deaths = $4, total_assists = $5,
                 matches_played = $6,
                 average_kills = $7, average_deaths = $8, average_assists = $9,
                 updated_at = NOW()
             WHERE player_id = $1 AND game_id = $2",
        )
        .bind(player_id)
        .bind(game_id)
        .bind(stats.total_kills)
        .bind(stats.total_deaths)
        .bind(stats.total_assists)
        .bind(stats.matches_played)
        .bind(stats.average_kills)
        .bind(stats.average_deaths)
        .bind(stats.average_assists)
        .execute(&mut **tx)
        .await?;

        Ok(stats)
    }
}

fn to_db_number(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_db_number(value: i32, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

fn map_unique_violation(err: sqlx::Error, key: MatchKey) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateKey(key),
        _ => StoreError::Database(err),
    }
}

fn match_from_row(row: &PgRow) -> StoreResult<Match> {
    let status: String = row.get("status");
    let start: NaiveDateTime = row.get("start_datetime");
    let end: Option<NaiveDateTime> = row.get("end_datetime");

    Ok(Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        bracket_level: from_db_number(row.get("bracket_level"), "bracket_level")?,
        match_number: from_db_number(row.get("match_number_in_round"), "match_number_in_round")?,
        first_team: row.get("first_team_id"),
        second_team: row.get("second_team_id"),
        start_datetime: start.and_utc(),
        end_datetime: end.map(|dt| dt.and_utc()),
        first_team_score: row.get("first_team_score"),
        second_team_score: row.get("second_team_score"),
        winning_team: row.get("winning_team_id"),
        status: status.parse().map_err(StoreError::Corrupt)?,
    })
}

fn statistic_from_row(row: &PgRow) -> MatchStatistics {
    MatchStatistics {
        id: row.get("id"),
        match_id: row.get("match_id"),
        player_id: row.get("player_id"),
        kills: row.get("kills"),
        deaths: row.get("deaths"),
        assists: row.get("assists"),
    }
}

fn player_from_row(row: &PgRow) -> PlayerStatistics {
    PlayerStatistics {
        player_id: row.get("player_id"),
        game_id: row.get("game_id"),
        total_kills: row.get("total_kills"),
        total_deaths: row.get("total_deaths"),
        total_assists: row.get("total_assists"),
        matches_played: row.get("matches_played"),
        average_kills: row.get("average_kills"),
        average_deaths: row.get("average_deaths"),
        average_assists: row.get("average_assists"),
    }
}

async fn insert_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    new_match: &NewMatch,
) -> StoreResult<Match> {
    let row = sqlx::query(&format!(
        "INSERT INTO matches (tournament_id, bracket_level, match_number_in_round,
                              first_team_id, second_team_id, start_datetime, end_datetime, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {MATCH_COLUMNS}"
    ))
    .bind(new_match.key.tournament_id)
    .bind(to_db_number(new_match.key.bracket_level))
    .bind(to_db_number(new_match.key.match_number))
    .bind(new_match.first_team)
    .bind(new_match.second_team)
    .bind(new_match.start_datetime.naive_utc())
    .bind(new_match.end_datetime.map(|dt| dt.naive_utc()))
    .bind(new_match.status.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_unique_violation(e, new_match.key))?;

    match_from_row(&row)
}

#[async_trait]
impl MatchStore for PgBracketStore {
    async fn insert_match(&self, new_match: NewMatch) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await?;
        let record = insert_in_tx(&mut tx, &new_match).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn insert_round(&self, matches: Vec<NewMatch>) -> StoreResult<Vec<Match>> {
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(matches.len());
        for new_match in &matches {
            records.push(insert_in_tx(&mut tx, new_match).await?);
        }
        tx.commit().await?;
        Ok(records)
    }

    async fn find_match(&self, match_id: MatchId) -> StoreResult<Option<Match>> {
        let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1"))
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn find_by_key(&self, key: MatchKey) -> StoreResult<Option<Match>> {
        let row = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE tournament_id = $1 AND bracket_level = $2 AND match_number_in_round = $3"
        ))
        .bind(key.tournament_id)
        .bind(to_db_number(key.bracket_level))
        .bind(to_db_number(key.match_number))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> StoreResult<Vec<Match>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE tournament_id = $1
             ORDER BY bracket_level, match_number_in_round"
        ))
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn finalize_match(
        &self,
        match_id: MatchId,
        result: MatchResult,
    ) -> StoreResult<Option<Match>> {
        // Conditional write: only one caller can move a match out of a non-final status
        let row = sqlx::query(&format!(
            "UPDATE matches
             SET first_team_score = $2, second_team_score = $3, winning_team_id = $4,
                 end_datetime = $5, status = 'COMPLETED'
             WHERE id = $1 AND status NOT IN ('COMPLETED', 'CANCELLED')
             RETURNING {MATCH_COLUMNS}"
        ))
        .bind(match_id)
        .bind(result.first_team_score)
        .bind(result.second_team_score)
        .bind(result.winning_team)
        .bind(result.end_datetime.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn update_match(&self, updated: &Match) -> StoreResult<Match> {
        let row = sqlx::query(&format!(
            "UPDATE matches
             SET start_datetime = $2, end_datetime = $3,
                 first_team_score = $4, second_team_score = $5,
                 winning_team_id = $6, status = $7
             WHERE id = $1
             RETURNING {MATCH_COLUMNS}"
        ))
        .bind(updated.id)
        .bind(updated.start_datetime.naive_utc())
        .bind(updated.end_datetime.map(|dt| dt.naive_utc()))
        .bind(updated.first_team_score)
        .bind(updated.second_team_score)
        .bind(updated.winning_team)
        .bind(updated.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => match_from_row(&row),
            None => Err(StoreError::Corrupt(format!(
                "match {} vanished during update",
                updated.id
            ))),
        }
    }

    async fn upsert_slots(
        &self,
        key: MatchKey,
        first: SlotWrite,
        second: SlotWrite,
        default_start: DateTime<Utc>,
    ) -> StoreResult<SlotUpsert> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(
            "SELECT first_team_id, second_team_id, winning_team_id FROM matches
             WHERE tournament_id = $1 AND bracket_level = $2 AND match_number_in_round = $3
             FOR UPDATE",
        )
        .bind(key.tournament_id)
        .bind(to_db_number(key.bracket_level))
        .bind(to_db_number(key.match_number))
        .fetch_optional(&mut *tx)
        .await?;

        let mut displaced = Vec::new();
        let mut reset = false;
        if let Some(row) = &current {
            let old_first: Option<TeamId> = row.get("first_team_id");
            let old_second: Option<TeamId> = row.get("second_team_id");
            let winner: Option<TeamId> = row.get("winning_team_id");
            for (old, write) in [(old_first, first), (old_second, second)] {
                match old {
                    Some(old) if write.apply(Some(old)) != Some(old) => displaced.push(old),
                    _ => {}
                }
            }
            reset = winner.is_some_and(|winner| displaced.contains(&winner));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO matches (tournament_id, bracket_level, match_number_in_round,
                                  first_team_id, second_team_id, start_datetime, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'SCHEDULED')
             ON CONFLICT (tournament_id, bracket_level, match_number_in_round)
             DO UPDATE SET
                first_team_id = CASE WHEN $7 THEN EXCLUDED.first_team_id
                                     ELSE matches.first_team_id END,
                second_team_id = CASE WHEN $8 THEN EXCLUDED.second_team_id
                                      ELSE matches.second_team_id END,
                first_team_score = CASE WHEN $9 THEN NULL ELSE matches.first_team_score END,
                second_team_score = CASE WHEN $9 THEN NULL ELSE matches.second_team_score END,
                winning_team_id = CASE WHEN $9 THEN NULL ELSE matches.winning_team_id END,
                end_datetime = CASE WHEN $9 THEN NULL ELSE matches.end_datetime END,
                status = CASE WHEN $9 THEN 'SCHEDULED' ELSE matches.status END
             RETURNING {MATCH_COLUMNS}, (xmax = 0) AS inserted"
        ))
        .bind(key.tournament_id)
        .bind(to_db_number(key.bracket_level))
        .bind(to_db_number(key.match_number))
        .bind(first.apply(None))
        .bind(second.apply(None))
        .bind(default_start.naive_utc())
        .bind(first.is_set())
        .bind(second.is_set())
        .bind(reset)
        .fetch_one(&mut *tx)
        .await?;

        let created: bool = row.get("inserted");
        let record = match_from_row(&row)?;
        tx.commit().await?;

        Ok(SlotUpsert {
            record,
            created,
            displaced,
            reset,
        })
    }

    async fn delete_match(&self, match_id: MatchId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(match_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StatisticsStore for PgBracketStore {
    async fn register_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO match_statistics (match_id, player_id, kills, deaths, assists)
             VALUES ($1, $2, 0, 0, 0)
             ON CONFLICT (match_id, player_id) DO NOTHING
             RETURNING id",
        )
        .bind(match_id)
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        Self::adjust_aggregate(
            &mut tx,
            player_id,
            game_id,
            1,
            StatLine::default(),
            StatLine::default(),
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn release_participant(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&format!(
            "DELETE FROM match_statistics
             WHERE match_id = $1 AND player_id = $2
             RETURNING {STATISTIC_COLUMNS}"
        ))
        .bind(match_id)
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = removed else {
            return Ok(false);
        };

        let old = statistic_from_row(&row).line();
        Self::adjust_aggregate(&mut tx, player_id, game_id, -1, old, StatLine::default()).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn record_line(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        game_id: GameId,
        line: StatLine,
    ) -> StoreResult<MatchStatistics> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query(
            "INSERT INTO match_statistics (match_id, player_id, kills, deaths, assists)
             VALUES ($1, $2, 0, 0, 0)
             ON CONFLICT (match_id, player_id) DO NOTHING
             RETURNING id",
        )
        .bind(match_id)
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        let previous = sqlx::query(&format!(
            "SELECT {STATISTIC_COLUMNS} FROM match_statistics
             WHERE match_id = $1 AND player_id = $2
             FOR UPDATE"
        ))
        .bind(match_id)
        .bind(player_id)
        .fetch_one(&mut *tx)
        .await?;
        let previous = statistic_from_row(&previous).line();

        let row = sqlx::query(&format!(
            "UPDATE match_statistics
             SET kills = $3, deaths = $4, assists = $5
             WHERE match_id = $1 AND player_id = $2
             RETURNING {STATISTIC_COLUMNS}"
        ))
        .bind(match_id)
        .bind(player_id)
        .bind(line.kills)
        .bind(line.deaths)
        .bind(line.assists)
        .fetch_one(&mut *tx)
        .await?;

        let played_delta = if created { 1 } else { 0 };
        Self::adjust_aggregate(&mut tx, player_id, game_id, played_delta, previous, line).await?;
        tx.commit().await?;

        Ok(statistic_from_row(&row))
    }

    async fn match_statistics(&self, match_id: MatchId) -> StoreResult<Vec<MatchStatistics>> {
        let rows = sqlx::query(&format!(
            "SELECT {STATISTIC_COLUMNS} FROM match_statistics WHERE match_id = $1 ORDER BY id"
        ))
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(statistic_from_row).collect())
    }

    async fn find_statistic(
        &self,
        statistic_id: StatisticId,
    ) -> StoreResult<Option<MatchStatistics>> {
        let row = sqlx::query(&format!(
            "SELECT {STATISTIC_COLUMNS} FROM match_statistics WHERE id = $1"
        ))
        .bind(statistic_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(statistic_from_row))
    }

    async fn find_match_player(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> StoreResult<Option<MatchStatistics>> {
        let row = sqlx::query(&format!(
            "SELECT {STATISTIC_COLUMNS} FROM match_statistics
             WHERE match_id = $1 AND player_id = $2"
        ))
        .bind(match_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(statistic_from_row))
    }

    async fn player_statistics(
        &self,
        player_id: PlayerId,
        game_id: GameId,
    ) -> StoreResult<Option<PlayerStatistics>> {
        let row = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_statistics
             WHERE player_id = $1 AND game_id = $2"
        ))
        .bind(player_id)
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(player_from_row))
    }

    async fn game_statistics(&self, game_id: GameId) -> StoreResult<Vec<PlayerStatistics>> {
        let rows = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player_statistics
             WHERE game_id = $1
             ORDER BY player_id"
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(player_from_row).collect())
    }
}

#[async_trait]
impl RosterProvider for PgBracketStore {
    async fn tournament(&self, tournament_id: TournamentId) -> StoreResult<Option<Tournament>> {
        let row = sqlx::query(
            "SELECT id, name, game_id, status, start_date, max_teams
             FROM tournaments WHERE id = $1",
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("status");
        let start_date: NaiveDate = row.get("start_date");
        let max_teams: Option<i32> = row.get("max_teams");

        Ok(Some(Tournament {
            id: row.get("id"),
            name: row.get("name"),
            game_id: row.get("game_id"),
            status: status.parse::<TournamentStatus>().map_err(StoreError::Corrupt)?,
            start_date,
            max_teams: max_teams.and_then(|n| u32::try_from(n).ok()),
        }))
    }

    async fn accepted_teams(&self, tournament_id: TournamentId) -> StoreResult<Vec<Team>> {
        let team_rows = sqlx::query(
            "SELECT t.id, t.name
             FROM teams t
             JOIN tournament_teams_accepted a ON a.team_id = t.id
             WHERE a.tournament_id = $1
             ORDER BY t.id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<TeamId> = team_rows.iter().map(|row| row.get("id")).collect();
        let member_rows = sqlx::query(
            "SELECT team_id, player_id FROM team_members
             WHERE team_id = ANY($1)
             ORDER BY player_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut rosters: HashMap<TeamId, Vec<PlayerId>> = HashMap::new();
        for row in &member_rows {
            rosters
                .entry(row.get("team_id"))
                .or_default()
                .push(row.get("player_id"));
        }

        Ok(team_rows
            .iter()
            .map(|row| {
                let id: TeamId = row.get("id");
                Team {
                    id,
                    name: row.get("name"),
                    roster: rosters.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }
}
