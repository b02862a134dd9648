use crate::{
    audit,
    auth::AuthUser,
    db::models::{DashboardEntry, Participant, Tournament, TournamentResult, TournamentStatus},
    error::{AppError, Result},
    leaderboard::Standing,
    puzzles::PuzzleInfo,
    tournament::{NewTournament, SolveOutcome, TournamentManager, TournamentUpdate},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ValidatedJson, ValidatedQuery};

const MAX_LEADERBOARD_LIMIT: usize = 100;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTournamentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SolveRequest {
    pub puzzle_id: String,
    pub solve_time_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextPuzzleQuery {
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TournamentListResponse {
    pub tournaments: Vec<Tournament>,
}

#[derive(Debug, Serialize)]
pub struct TournamentResultsResponse {
    pub tournament: Tournament,
    pub results: Vec<TournamentResult>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub tournament_id: String,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ==================== AppState for Tournaments ====================

pub struct TournamentAppState {
    pub tournament_manager: Arc<TournamentManager>,
    pub leaderboard_default_limit: usize,
}

// ==================== Router ====================

pub fn router() -> Router<Arc<TournamentAppState>> {
    Router::new()
        // Tournament management
        .route("/", post(create_tournament).get(list_tournaments))
        .route("/current", get(current_tournament))
        .route(
            "/:id",
            get(get_tournament)
                .put(update_tournament)
                .delete(delete_tournament),
        )
        // Lifecycle
        .route("/:id/start", post(start_tournament))
        .route("/:id/finish", post(finish_tournament))
        .route("/:id/cancel", post(cancel_tournament))
        // Registration
        .route(
            "/:id/register",
            post(register_for_tournament).delete(unregister_from_tournament),
        )
        .route("/:id/participants", get(get_participants))
        // Play
        .route("/:id/solves", post(submit_solve))
        .route("/:id/puzzles/next", get(next_puzzle))
        // Standings and results
        .route("/:id/dashboard", get(get_dashboard))
        .route("/:id/leaderboard", get(get_leaderboard))
        .route("/:id/leaderboard/me", get(get_my_standing))
        .route("/:id/results", get(get_tournament_results))
}

// ==================== Handlers ====================

async fn create_tournament(
    State(state): State<Arc<TournamentAppState>>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<Tournament>)> {
    let config = NewTournament {
        name: req.name,
        description: req.description,
        start_time: req.start_time,
        end_time: req.end_time,
    };

    let tournament = state
        .tournament_manager
        .create_tournament(&auth_user.user_id, config)
        .await?;

    Ok((StatusCode::CREATED, Json(tournament)))
}

async fn list_tournaments(
    State(state): State<Arc<TournamentAppState>>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Json<TournamentListResponse>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<TournamentStatus>()
                .map_err(|_| AppError::Validation(format!("Unknown status '{}'", s)))
        })
        .transpose()?;

    let tournaments = state.tournament_manager.list_tournaments(status).await?;
    Ok(Json(TournamentListResponse { tournaments }))
}

async fn current_tournament(
    State(state): State<Arc<TournamentAppState>>,
) -> Result<Json<Tournament>> {
    Ok(Json(state.tournament_manager.current_tournament().await?))
}

async fn get_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tournament>> {
    Ok(Json(state.tournament_manager.get_tournament(&id).await?))
}

async fn update_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateTournamentRequest>,
) -> Result<Json<Tournament>> {
    verify_tournament_owner(&state, &id, &auth_user.user_id).await?;

    let update = TournamentUpdate {
        name: req.name,
        description: req.description,
        start_time: req.start_time,
        end_time: req.end_time,
    };
    if update.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    let tournament = state
        .tournament_manager
        .update_tournament(&id, update)
        .await?;
    Ok(Json(tournament))
}

async fn delete_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<SuccessResponse>> {
    verify_tournament_owner(&state, &id, &auth_user.user_id).await?;

    state.tournament_manager.delete_tournament(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn start_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<Tournament>> {
    verify_tournament_owner(&state, &id, &auth_user.user_id).await?;

    Ok(Json(state.tournament_manager.start_tournament(&id).await?))
}

async fn finish_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<TournamentResultsResponse>> {
    verify_tournament_owner(&state, &id, &auth_user.user_id).await?;

    let (tournament, results) = state.tournament_manager.finish_tournament(&id).await?;
    Ok(Json(TournamentResultsResponse {
        tournament,
        results,
    }))
}

async fn cancel_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<Tournament>> {
    verify_tournament_owner(&state, &id, &auth_user.user_id).await?;

    Ok(Json(state.tournament_manager.cancel_tournament(&id).await?))
}

async fn register_for_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Participant>)> {
    let participant = state
        .tournament_manager
        .register_participant(&id, &auth_user.user_id, &req.display_name)
        .await?;

    Ok((StatusCode::CREATED, Json(participant)))
}

async fn unregister_from_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<SuccessResponse>> {
    state
        .tournament_manager
        .unregister_participant(&id, &auth_user.user_id)
        .await?;

    Ok(Json(SuccessResponse { success: true }))
}

async fn get_participants(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Participant>>> {
    Ok(Json(state.tournament_manager.list_participants(&id).await?))
}

async fn submit_solve(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<SolveRequest>,
) -> Result<Json<SolveOutcome>> {
    let outcome = state
        .tournament_manager
        .report_solve(&id, &auth_user.user_id, &req.puzzle_id, req.solve_time_ms)
        .await?;

    Ok(Json(outcome))
}

async fn next_puzzle(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<NextPuzzleQuery>,
) -> Result<Json<PuzzleInfo>> {
    let difficulty = query
        .difficulty
        .ok_or_else(|| AppError::Validation("difficulty is required".to_string()))?;

    let puzzle = state
        .tournament_manager
        .next_puzzle(&id, &auth_user.user_id, &difficulty)
        .await?;

    Ok(Json(puzzle))
}

async fn get_dashboard(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DashboardEntry>>> {
    Ok(Json(state.tournament_manager.dashboard(&id).await?))
}

async fn get_leaderboard(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let limit = query.limit.unwrap_or(state.leaderboard_default_limit);
    if limit == 0 || limit > MAX_LEADERBOARD_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_LEADERBOARD_LIMIT
        )));
    }

    let standings = state.tournament_manager.leaderboard(&id, limit).await?;
    Ok(Json(LeaderboardResponse {
        tournament_id: id,
        standings,
    }))
}

async fn get_my_standing(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<Standing>> {
    Ok(Json(
        state
            .tournament_manager
            .standing(&id, &auth_user.user_id)
            .await?,
    ))
}

async fn get_tournament_results(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<TournamentResultsResponse>> {
    let results = state.tournament_manager.results(&id).await?;
    let tournament = state.tournament_manager.get_tournament(&id).await?;

    Ok(Json(TournamentResultsResponse {
        tournament,
        results,
    }))
}

// ==================== Helper Functions ====================

async fn verify_tournament_owner(
    state: &TournamentAppState,
    tournament_id: &str,
    user_id: &str,
) -> Result<()> {
    let tournament = state.tournament_manager.get_tournament(tournament_id).await?;

    if tournament.created_by != user_id {
        audit::log_security_event(
            user_id,
            "forbidden",
            &format!("not the creator of tournament {}", tournament_id),
        );
        return Err(AppError::Forbidden(
            "Only the tournament creator can do this".to_string(),
        ));
    }

    Ok(())
}
