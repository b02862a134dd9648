//! Tournament Manager
//!
//! Single entry point for the tournament engine:
//! - Creation, editing and deletion
//! - Lifecycle transitions and finalization
//! - Registration
//! - Solve crediting and puzzle selection
//! - Live standings, cached leaderboards and archived results

use crate::{
    db::{
        models::{DashboardEntry, Participant, Tournament, TournamentResult, TournamentStatus},
        DbPool,
    },
    error::{AppError, Result},
    leaderboard::{LeaderboardCache, Standing},
    puzzles::{PuzzleInfo, PuzzleService},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    context::TournamentContext, lifecycle::LifecycleService, progress::ProgressService,
    registration::RegistrationService, standings::StandingsService,
};

/// Input for creating a tournament
#[derive(Debug, Clone, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Partial edit; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TournamentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}

/// Outcome of a solve submission. A duplicate is `accepted: false` with the
/// participant's unchanged totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub accepted: bool,
    pub points: i64,
    pub score: i64,
    pub solved_count: i64,
}

/// What one scheduler tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub started: usize,
    pub finished: usize,
    pub resumed: usize,
}

/// Manages all tournaments
pub struct TournamentManager {
    ctx: Arc<TournamentContext>,
    lifecycle: LifecycleService,
    registration: RegistrationService,
    progress: ProgressService,
    standings: StandingsService,
}

impl TournamentManager {
    pub fn new(
        pool: Arc<DbPool>,
        leaderboard: Arc<dyn LeaderboardCache>,
        puzzles: Arc<dyn PuzzleService>,
    ) -> Self {
        let ctx = Arc::new(TournamentContext::new(pool, leaderboard, puzzles));
        Self {
            lifecycle: LifecycleService::new(ctx.clone()),
            registration: RegistrationService::new(ctx.clone()),
            progress: ProgressService::new(ctx.clone()),
            standings: StandingsService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn create_tournament(
        &self,
        created_by: &str,
        config: NewTournament,
    ) -> Result<Tournament> {
        self.lifecycle.create(created_by, config).await
    }

    pub async fn get_tournament(&self, tournament_id: &str) -> Result<Tournament> {
        self.ctx.load_tournament(tournament_id).await
    }

    /// Newest first, optionally filtered by status
    pub async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> Result<Vec<Tournament>> {
        let tournaments = match status {
            Some(status) => {
                sqlx::query_as::<_, Tournament>(
                    "SELECT * FROM tournaments WHERE status = ? ORDER BY created_at DESC, id ASC",
                )
                .bind(status)
                .fetch_all(&*self.ctx.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Tournament>(
                    "SELECT * FROM tournaments ORDER BY created_at DESC, id ASC",
                )
                .fetch_all(&*self.ctx.pool)
                .await?
            }
        };

        Ok(tournaments)
    }

    /// The most recently created tournament
    pub async fn current_tournament(&self) -> Result<Tournament> {
        sqlx::query_as::<_, Tournament>(
            "SELECT * FROM tournaments ORDER BY created_at DESC, id ASC LIMIT 1",
        )
        .fetch_optional(&*self.ctx.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No tournaments yet".to_string()))
    }

    pub async fn update_tournament(
        &self,
        tournament_id: &str,
        update: TournamentUpdate,
    ) -> Result<Tournament> {
        self.lifecycle.update(tournament_id, update).await
    }

    pub async fn delete_tournament(&self, tournament_id: &str) -> Result<()> {
        self.lifecycle.delete(tournament_id).await
    }

    pub async fn start_tournament(&self, tournament_id: &str) -> Result<Tournament> {
        self.lifecycle.start(tournament_id).await
    }

    pub async fn cancel_tournament(&self, tournament_id: &str) -> Result<Tournament> {
        self.lifecycle.cancel(tournament_id).await
    }

    /// Finish and finalize; also resumes an interrupted finalization
    pub async fn finish_tournament(
        &self,
        tournament_id: &str,
    ) -> Result<(Tournament, Vec<TournamentResult>)> {
        self.lifecycle.finish(tournament_id).await
    }

    pub async fn register_participant(
        &self,
        tournament_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<Participant> {
        self.registration
            .register(tournament_id, user_id, display_name)
            .await
    }

    pub async fn unregister_participant(&self, tournament_id: &str, user_id: &str) -> Result<()> {
        self.registration.unregister(tournament_id, user_id).await
    }

    pub async fn list_participants(&self, tournament_id: &str) -> Result<Vec<Participant>> {
        self.registration.participants(tournament_id).await
    }

    pub async fn record_solve(
        &self,
        tournament_id: &str,
        user_id: &str,
        puzzle_id: &str,
        difficulty: &str,
        solve_time_secs: i64,
    ) -> Result<SolveOutcome> {
        self.progress
            .record_solve(tournament_id, user_id, puzzle_id, difficulty, solve_time_secs)
            .await
    }

    pub async fn report_solve(
        &self,
        tournament_id: &str,
        user_id: &str,
        puzzle_id: &str,
        solve_time_ms: i64,
    ) -> Result<SolveOutcome> {
        self.progress
            .report_solve(tournament_id, user_id, puzzle_id, solve_time_ms)
            .await
    }

    pub async fn next_puzzle(
        &self,
        tournament_id: &str,
        user_id: &str,
        difficulty: &str,
    ) -> Result<PuzzleInfo> {
        self.progress
            .next_puzzle(tournament_id, user_id, difficulty)
            .await
    }

    pub async fn dashboard(&self, tournament_id: &str) -> Result<Vec<DashboardEntry>> {
        self.standings.dashboard(tournament_id).await
    }

    pub async fn leaderboard(&self, tournament_id: &str, limit: usize) -> Result<Vec<Standing>> {
        self.standings.top(tournament_id, limit).await
    }

    pub async fn standing(&self, tournament_id: &str, user_id: &str) -> Result<Standing> {
        self.standings.standing(tournament_id, user_id).await
    }

    pub async fn results(&self, tournament_id: &str) -> Result<Vec<TournamentResult>> {
        self.standings.results(tournament_id).await
    }

    pub async fn rebuild_leaderboard(&self, tournament_id: &str) -> Result<usize> {
        self.standings.rebuild(tournament_id).await
    }

    pub async fn rebuild_active_leaderboards(&self) -> Result<usize> {
        self.standings.rebuild_active().await
    }

    pub async fn run_scheduled_transitions(&self, now: DateTime<Utc>) -> Result<ScheduleReport> {
        self.lifecycle.run_scheduled(now).await
    }
}
