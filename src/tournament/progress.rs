use crate::{
    audit,
    db::models::{now_timestamp, SolveRecord, TournamentStatus},
    error::{AppError, Result},
    puzzles::PuzzleInfo,
    scoring::{self, Difficulty},
};
use rand::seq::SliceRandom;
use std::{collections::HashSet, sync::Arc};

use super::{context::TournamentContext, manager::SolveOutcome};

pub(crate) struct ProgressService {
    ctx: Arc<TournamentContext>,
}

impl ProgressService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Credit a solve at most once per (tournament, user, puzzle).
    ///
    /// The ledger insert and the score increment commit together, and the
    /// insert itself re-checks that the tournament is active and the user is
    /// registered, so a concurrent finish or duplicate submission is settled
    /// by the storage layer.
    pub(crate) async fn record_solve(
        &self,
        tournament_id: &str,
        user_id: &str,
        puzzle_id: &str,
        difficulty: &str,
        solve_time_secs: i64,
    ) -> Result<SolveOutcome> {
        if puzzle_id.trim().is_empty() {
            return Err(AppError::Validation("puzzle_id is required".to_string()));
        }
        if solve_time_secs < 0 {
            return Err(AppError::Validation(
                "Solve time must not be negative".to_string(),
            ));
        }
        self.ensure_active_participant(tournament_id, user_id).await?;

        let points = scoring::score(difficulty, solve_time_secs);
        let solved_at = now_timestamp();

        let mut tx = self.ctx.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO solve_records
                (tournament_id, user_id, puzzle_id, difficulty, points, solved_at)
             SELECT ?, ?, ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM tournaments WHERE id = ? AND status = 'active')
               AND EXISTS (SELECT 1 FROM tournament_participants
                           WHERE tournament_id = ? AND user_id = ?)
             ON CONFLICT (tournament_id, user_id, puzzle_id) DO NOTHING",
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(puzzle_id)
        .bind(difficulty)
        .bind(points)
        .bind(&solved_at)
        .bind(tournament_id)
        .bind(tournament_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return self.rejected_solve(tournament_id, user_id, puzzle_id).await;
        }

        let (score, solved_count): (i64, i64) = sqlx::query_as(
            "UPDATE tournament_participants
             SET score = score + ?, solved_count = solved_count + 1, last_solved_at = ?
             WHERE tournament_id = ? AND user_id = ?
             RETURNING score, solved_count",
        )
        .bind(points)
        .bind(&solved_at)
        .bind(tournament_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        audit::log_solve(tournament_id, user_id, puzzle_id, points, true);
        self.ctx.mirror_score(tournament_id, user_id, score).await;

        Ok(SolveOutcome {
            accepted: true,
            points,
            score,
            solved_count,
        })
    }

    /// Classify a guarded insert that wrote nothing.
    async fn rejected_solve(
        &self,
        tournament_id: &str,
        user_id: &str,
        puzzle_id: &str,
    ) -> Result<SolveOutcome> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Active {
            return Err(AppError::TournamentNotActive);
        }
        let participant = self
            .ctx
            .load_participant(tournament_id, user_id)
            .await?
            .ok_or(AppError::NotRegistered)?;

        audit::log_solve(tournament_id, user_id, puzzle_id, 0, false);
        Ok(SolveOutcome {
            accepted: false,
            points: 0,
            score: participant.score,
            solved_count: participant.solved_count,
        })
    }

    /// Record a client-reported solve, taking the difficulty from the puzzle service.
    pub(crate) async fn report_solve(
        &self,
        tournament_id: &str,
        user_id: &str,
        puzzle_id: &str,
        solve_time_ms: i64,
    ) -> Result<SolveOutcome> {
        if solve_time_ms < 0 {
            return Err(AppError::Validation(
                "solve_time_ms must not be negative".to_string(),
            ));
        }
        if puzzle_id.trim().is_empty() {
            return Err(AppError::Validation("puzzle_id is required".to_string()));
        }
        // Reject early so closed tournaments never reach the puzzle service.
        self.ensure_active_participant(tournament_id, user_id).await?;

        let puzzle = self.ctx.puzzles.puzzle(puzzle_id).await?;
        self.record_solve(
            tournament_id,
            user_id,
            &puzzle.id,
            &puzzle.difficulty,
            solve_time_ms / 1000,
        )
        .await
    }

    /// Pick a random puzzle of the tier that the user has not solved yet.
    pub(crate) async fn next_puzzle(
        &self,
        tournament_id: &str,
        user_id: &str,
        difficulty: &str,
    ) -> Result<PuzzleInfo> {
        let tier: Difficulty = difficulty
            .parse()
            .map_err(|_| AppError::Validation(format!("Unknown difficulty '{}'", difficulty)))?;
        self.ensure_active_participant(tournament_id, user_id).await?;

        let solved: HashSet<String> = sqlx::query_as::<_, SolveRecord>(
            "SELECT * FROM solve_records WHERE tournament_id = ? AND user_id = ?",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_all(&*self.ctx.pool)
        .await?
        .into_iter()
        .map(|record| record.puzzle_id)
        .collect();

        let mut candidates = self.ctx.puzzles.puzzles_by_difficulty(tier.as_str()).await?;
        candidates.shuffle(&mut rand::thread_rng());

        candidates
            .into_iter()
            .find(|p| !solved.contains(&p.id))
            .ok_or_else(|| {
                AppError::NotFound(format!("No unsolved {} puzzles left", tier.as_str()))
            })
    }

    async fn ensure_active_participant(&self, tournament_id: &str, user_id: &str) -> Result<()> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Active {
            return Err(AppError::TournamentNotActive);
        }
        if self
            .ctx
            .load_participant(tournament_id, user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotRegistered);
        }
        Ok(())
    }
}
