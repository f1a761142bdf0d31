//! Per-game player statistics endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use bracket_engine::bracket::{GameId, PlayerId};
use bracket_engine::stats::PlayerStatistics;

use super::AppState;
use super::error::ApiResult;

/// Aggregates of one player in one game; zeros when the player never played it
pub async fn get_player_statistics(
    State(state): State<AppState>,
    Path((player_id, game_id)): Path<(PlayerId, GameId)>,
) -> ApiResult<Json<PlayerStatistics>> {
    Ok(Json(
        state
            .manager
            .get_player_statistics(player_id, game_id)
            .await?,
    ))
}

/// Players of a game ordered by total kills, best first
pub async fn ranking(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> ApiResult<Json<Vec<PlayerStatistics>>> {
    Ok(Json(state.manager.ranking_by_kills(game_id).await?))
}
