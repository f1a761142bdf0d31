//! Match endpoints: manual creation, results, corrections and statistics.
//!
//! # Examples
//!
//! Record a result:
//! ```bash
//! curl -X PATCH http://localhost:8080/api/v1/matches/12/result \
//!   -H "Content-Type: application/json" \
//!   -d '{"first_team_score": 16, "second_team_score": 9}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bracket_engine::bracket::{
    Match, MatchCorrection, MatchDetails, MatchId, MatchKey, MatchStatus, NewMatch, PlayerId,
    TeamId, TournamentId,
};
use bracket_engine::stats::{MatchStatistics, PlayerStatSubmission, StatLine, StatisticId};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::AppState;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub tournament_id: TournamentId,
    pub bracket_level: u32,
    pub match_number: u32,
    pub first_team: TeamId,
    pub second_team: TeamId,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub status: Option<MatchStatus>,
}

impl From<CreateMatchRequest> for NewMatch {
    fn from(req: CreateMatchRequest) -> Self {
        NewMatch {
            key: MatchKey::new(req.tournament_id, req.bracket_level, req.match_number),
            first_team: Some(req.first_team),
            second_team: Some(req.second_team),
            start_datetime: req.start_datetime,
            end_datetime: req.end_datetime,
            status: req.status.unwrap_or(MatchStatus::Scheduled),
        }
    }
}

/// Scores are optional so a missing one is reported as an invalid score
#[derive(Debug, Deserialize)]
pub struct RecordResultRequest {
    pub first_team_score: Option<i32>,
    pub second_team_score: Option<i32>,
}

/// Create a match outside the generated bracket.
///
/// # Errors
///
/// - `400 Bad Request`: teams missing, identical or not accepted
/// - `409 Conflict`: natural key already taken
pub async fn create_match(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> ApiResult<(StatusCode, Json<Match>)> {
    let created = state.manager.create_match(req.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Match with its statistics rows split by team
pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<Json<MatchDetails>> {
    Ok(Json(state.manager.get_match_details(match_id).await?))
}

/// Organizer correction of times, scores, status and winner
pub async fn correct_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(correction): Json<MatchCorrection>,
) -> ApiResult<Json<Match>> {
    Ok(Json(state.manager.correct_result(match_id, correction).await?))
}

pub async fn delete_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<StatusCode> {
    state.manager.delete_match(match_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record the final score of a ready match and advance its winner.
///
/// # Errors
///
/// - `400 Bad Request`: negative or missing score, draw
/// - `409 Conflict`: match already finalized or still waiting for a team
/// - `503 Service Unavailable`: result stored but propagation failed; retry with resync
pub async fn record_result(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<RecordResultRequest>,
) -> ApiResult<Json<Match>> {
    let recorded = state
        .manager
        .record_result(match_id, req.first_team_score, req.second_team_score)
        .await?;
    Ok(Json(recorded))
}

/// Submit per-player statistics for a started match
pub async fn submit_statistics(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(submissions): Json<Vec<PlayerStatSubmission>>,
) -> ApiResult<Json<Vec<MatchStatistics>>> {
    let rows = state
        .manager
        .submit_match_statistics(match_id, &submissions)
        .await?;
    Ok(Json(rows))
}

pub async fn update_statistic(
    State(state): State<AppState>,
    Path((match_id, statistic_id)): Path<(MatchId, StatisticId)>,
    Json(line): Json<StatLine>,
) -> ApiResult<Json<MatchStatistics>> {
    let row = state
        .manager
        .update_match_statistic(match_id, statistic_id, line)
        .await?;
    Ok(Json(row))
}

pub async fn get_match_player_statistics(
    State(state): State<AppState>,
    Path((match_id, player_id)): Path<(MatchId, PlayerId)>,
) -> ApiResult<Json<MatchStatistics>> {
    state
        .manager
        .get_match_player_statistics(match_id, player_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Player {player_id} has no statistics in match {match_id}"
            ))
        })
}
