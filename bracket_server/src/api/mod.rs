//! HTTP API for the bracket engine.
//!
//! # Modules
//!
//! - [`brackets`]: first-round generation, bracket and match listing, resync
//! - [`matches`]: manual creation, results, corrections, per-match statistics
//! - [`statistics`]: per-game player aggregates and rankings
//! - [`error`]: engine error to status code mapping
//! - [`request_id`]: request correlation middleware
//!
//! # Endpoints
//!
//! ```text
//! GET    /health
//! POST   /api/v1/tournaments/{id}/bracket
//! GET    /api/v1/tournaments/{id}/bracket
//! POST   /api/v1/tournaments/{id}/bracket/resync
//! GET    /api/v1/tournaments/{id}/matches
//! POST   /api/v1/matches
//! GET    /api/v1/matches/{id}
//! PUT    /api/v1/matches/{id}
//! DELETE /api/v1/matches/{id}
//! PATCH  /api/v1/matches/{id}/result
//! POST   /api/v1/matches/{id}/statistics
//! PUT    /api/v1/matches/{id}/statistics/{statistic_id}
//! GET    /api/v1/matches/{id}/statistics/players/{player_id}
//! GET    /api/v1/statistics/players/{player_id}/games/{game_id}
//! GET    /api/v1/statistics/games/{game_id}/ranking
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod brackets;
pub mod error;
pub mod matches;
pub mod request_id;
pub mod statistics;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
};
use bracket_engine::BracketManager;
use bracket_engine::db::Database;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BracketManager>,
    /// Present only with the postgres backend
    pub db: Option<Database>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use bracket_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(request_id::request_id_middleware)),
        )
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let tournament_routes = Router::new()
        .route(
            "/tournaments/{tournament_id}/bracket",
            post(brackets::generate_bracket).get(brackets::get_bracket),
        )
        .route(
            "/tournaments/{tournament_id}/bracket/resync",
            post(brackets::resync_bracket),
        )
        .route(
            "/tournaments/{tournament_id}/matches",
            get(brackets::list_matches),
        );

    let match_routes = Router::new()
        .route("/matches", post(matches::create_match))
        .route(
            "/matches/{match_id}",
            get(matches::get_match)
                .put(matches::correct_match)
                .delete(matches::delete_match),
        )
        .route("/matches/{match_id}/result", patch(matches::record_result))
        .route(
            "/matches/{match_id}/statistics",
            post(matches::submit_statistics),
        )
        .route(
            "/matches/{match_id}/statistics/{statistic_id}",
            put(matches::update_statistic),
        )
        .route(
            "/matches/{match_id}/statistics/players/{player_id}",
            get(matches::get_match_player_statistics),
        );

    let statistics_routes = Router::new()
        .route(
            "/statistics/players/{player_id}/games/{game_id}",
            get(statistics::get_player_statistics),
        )
        .route(
            "/statistics/games/{game_id}/ranking",
            get(statistics::ranking),
        );

    Router::new()
        .merge(tournament_routes)
        .merge(match_routes)
        .merge(statistics_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when storage is reachable, `503 Service Unavailable`
/// otherwise. The in-memory backend is always healthy.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, healthy) = match &state.db {
        Some(db) => ("postgres", db.health_check().await.is_ok()),
        None => ("memory", true),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
