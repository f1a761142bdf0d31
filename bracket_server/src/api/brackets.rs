//! Bracket generation and read endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bracket_engine::bracket::{Bracket, Match, TournamentId};

use super::AppState;
use super::error::ApiResult;

/// Generate the first round of a tournament.
///
/// Returns `201 Created` with the level-1 matches.
///
/// # Errors
///
/// - `400 Bad Request`: accepted team count is not a power of two
/// - `404 Not Found`: unknown tournament
/// - `409 Conflict`: tournament not ACTIVE or bracket already generated
pub async fn generate_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<(StatusCode, Json<Vec<Match>>)> {
    let round = state.manager.generate_first_round(tournament_id).await?;
    Ok((StatusCode::CREATED, Json(round)))
}

/// Bracket grouped by level, with the champion once the final is decided
pub async fn get_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<Bracket>> {
    Ok(Json(state.manager.get_bracket(tournament_id).await?))
}

/// Re-run propagation and statistics initialization from stored state
pub async fn resync_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<Bracket>> {
    Ok(Json(state.manager.resync_bracket(tournament_id).await?))
}

pub async fn list_matches(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<Vec<Match>>> {
    Ok(Json(state.manager.list_matches(tournament_id).await?))
}
