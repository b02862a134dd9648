use chrono::Utc;
use std::sync::Arc;
use tournament_server::{
    api, config, create_app, db,
    leaderboard::InMemoryLeaderboard,
    puzzles::{HttpPuzzleService, InMemoryPuzzleCatalog, PuzzleService},
    tournament,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config = config::Config::from_env();
    tracing::info!("Starting tournament server on {}", config.server_addr());

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    db::run_migrations(&pool).await?;

    // Puzzle service: remote when configured, built-in catalog otherwise
    let puzzles: Arc<dyn PuzzleService> = match &config.puzzle_service.url {
        Some(url) => {
            tracing::info!("Using puzzle service at {}", url);
            Arc::new(HttpPuzzleService::new(url, config.puzzle_service.timeout())?)
        }
        None => Arc::new(InMemoryPuzzleCatalog::sample(20)),
    };

    // Create tournament manager
    let tournament_manager = Arc::new(tournament::TournamentManager::new(
        Arc::new(pool.clone()),
        Arc::new(InMemoryLeaderboard::new()),
        puzzles,
    ));

    // Warm the leaderboard cache for tournaments already running
    match tournament_manager.rebuild_active_leaderboards().await {
        Ok(count) => tracing::info!("Rebuilt leaderboards for {} active tournaments", count),
        Err(e) => tracing::warn!("Initial leaderboard rebuild failed: {}", e),
    }

    let tournament_state = Arc::new(api::TournamentAppState {
        tournament_manager: tournament_manager.clone(),
        leaderboard_default_limit: config.leaderboard_default_limit,
    });

    // Build router using lib function
    let app = create_app(tournament_state, &config.cors_allowed_origins);

    // Spawn background task for scheduled transitions and cache reconciliation
    let tournament_mgr_scheduler = tournament_manager.clone();
    let interval_period = config.scheduler_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval_period);
        loop {
            interval.tick().await;
            if let Err(e) = tournament_mgr_scheduler
                .run_scheduled_transitions(Utc::now())
                .await
            {
                tracing::error!("Error running scheduled transitions: {:?}", e);
            }
            if let Err(e) = tournament_mgr_scheduler.rebuild_active_leaderboards().await {
                tracing::error!("Error rebuilding leaderboards: {:?}", e);
            }
        }
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("Server listening on {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
