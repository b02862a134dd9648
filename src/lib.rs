//! Tournament Server Library
//!
//! This module exposes the server components for integration testing.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod leaderboard;
pub mod puzzles;
pub mod scoring;
pub mod tournament;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Creates the application router with all endpoints
pub fn create_app(
    tournament_state: Arc<api::TournamentAppState>,
    allowed_origins: &[String],
) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Tournament Server" }))
        .route("/health", get(|| async { "OK" }))
        .nest(
            "/api/tournaments",
            api::tournaments_router().with_state(tournament_state),
        )
        .layer(cors)
}

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    let pool = db::create_memory_pool()
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test helper to create a fully configured test app
pub async fn create_test_app() -> (Router, Arc<tournament::TournamentManager>) {
    let pool = create_test_db().await;

    let tournament_manager = Arc::new(tournament::TournamentManager::new(
        Arc::new(pool),
        Arc::new(leaderboard::InMemoryLeaderboard::new()),
        Arc::new(puzzles::InMemoryPuzzleCatalog::sample(5)),
    ));

    let tournament_state = Arc::new(api::TournamentAppState {
        tournament_manager: tournament_manager.clone(),
        leaderboard_default_limit: 10,
    });

    let app = create_app(tournament_state, &[]);
    (app, tournament_manager)
}
