use crate::{
    audit,
    db::models::{
        format_timestamp, now_timestamp, Participant, Tournament, TournamentResult,
        TournamentStatus,
    },
    error::{AppError, Result},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{
    context::{apply_transition, TournamentContext},
    manager::{NewTournament, ScheduleReport, TournamentUpdate},
    ranking,
};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 2000;

pub(crate) struct LifecycleService {
    ctx: Arc<TournamentContext>,
}

impl LifecycleService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    pub(crate) async fn create(
        &self,
        created_by: &str,
        config: NewTournament,
    ) -> Result<Tournament> {
        if created_by.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }
        let name = normalize_name(&config.name)?;
        let description = normalize_description(config.description.as_deref().unwrap_or(""))?;
        validate_window(config.start_time, config.end_time)?;

        let tournament = Tournament::new(
            name,
            description,
            config.start_time,
            config.end_time,
            created_by.to_string(),
        );
        self.ctx.save_tournament(&tournament).await?;

        audit::log_tournament_event(
            &tournament.id,
            "created",
            &format!("'{}' by {}", tournament.name, created_by),
        );
        Ok(tournament)
    }

    /// Patch descriptive fields and the schedule of a non-terminal tournament.
    pub(crate) async fn update(
        &self,
        tournament_id: &str,
        update: TournamentUpdate,
    ) -> Result<Tournament> {
        let current = self.ctx.load_tournament(tournament_id).await?;
        if current.status.is_terminal() {
            return Err(AppError::TournamentClosed(current.status));
        }

        let name = match update.name.as_deref() {
            Some(name) => normalize_name(name)?,
            None => current.name.clone(),
        };
        let description = match update.description.as_deref() {
            Some(description) => normalize_description(description)?,
            None => current.description.clone(),
        };
        let start_time = update
            .start_time
            .map(format_timestamp)
            .unwrap_or_else(|| current.start_time.clone());
        let end_time = update
            .end_time
            .map(format_timestamp)
            .unwrap_or_else(|| current.end_time.clone());

        // Fixed-width timestamps compare correctly as strings.
        if start_time >= end_time {
            return Err(AppError::Validation(
                "start_time must be before end_time".to_string(),
            ));
        }

        let result = sqlx::query(
            "UPDATE tournaments
             SET name = ?, description = ?, start_time = ?, end_time = ?
             WHERE id = ? AND status IN ('pending', 'active')",
        )
        .bind(&name)
        .bind(&description)
        .bind(&start_time)
        .bind(&end_time)
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        let updated = self.ctx.load_tournament(tournament_id).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::TournamentClosed(updated.status));
        }

        audit::log_tournament_event(tournament_id, "updated", &updated.name);
        Ok(updated)
    }

    /// Delete a non-terminal tournament together with its participants and solves.
    pub(crate) async fn delete(&self, tournament_id: &str) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM tournaments WHERE id = ? AND status IN ('pending', 'active')",
        )
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.ctx.load_tournament(tournament_id).await?;
            return Err(AppError::TournamentClosed(current.status));
        }

        self.ctx.clear_board(tournament_id).await;
        audit::log_tournament_event(tournament_id, "deleted", "");
        Ok(())
    }

    pub(crate) async fn start(&self, tournament_id: &str) -> Result<Tournament> {
        self.ctx
            .transition(tournament_id, TournamentStatus::Pending, TournamentStatus::Active)
            .await?;

        // Seed the board so score mirrors have somewhere to land.
        if let Err(e) = self.ctx.rebuild_board(tournament_id).await {
            tracing::warn!("Could not seed leaderboard for {}: {}", tournament_id, e);
        }

        let tournament = self.ctx.load_tournament(tournament_id).await?;
        audit::log_tournament_event(tournament_id, "started", &tournament.name);
        Ok(tournament)
    }

    /// Cancel a pending tournament and drop its registrations atomically.
    pub(crate) async fn cancel(&self, tournament_id: &str) -> Result<Tournament> {
        let mut tx = self.ctx.pool.begin().await?;

        let won = apply_transition(
            &mut *tx,
            tournament_id,
            TournamentStatus::Pending,
            TournamentStatus::Cancelled,
        )
        .await?;
        if !won {
            tx.rollback().await?;
            return Err(self
                .ctx
                .rejected_transition(tournament_id, TournamentStatus::Cancelled)
                .await);
        }

        let removed = sqlx::query("DELETE FROM tournament_participants WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        self.ctx.clear_board(tournament_id).await;
        audit::log_tournament_event(
            tournament_id,
            "cancelled",
            &format!("{} registrations dropped", removed),
        );
        self.ctx.load_tournament(tournament_id).await
    }

    /// Finish an active tournament and archive its final standings.
    ///
    /// A tournament left `finished` by an interrupted archival is resumed
    /// instead of rejected, so re-running this call always converges.
    pub(crate) async fn finish(
        &self,
        tournament_id: &str,
    ) -> Result<(Tournament, Vec<TournamentResult>)> {
        match self
            .ctx
            .transition(tournament_id, TournamentStatus::Active, TournamentStatus::Finished)
            .await
        {
            Ok(()) => audit::log_tournament_event(tournament_id, "finished", ""),
            Err(err @ AppError::InvalidTransition { .. }) => {
                let current = self.ctx.load_tournament(tournament_id).await?;
                if !current.is_awaiting_finalize() {
                    return Err(err);
                }
                tracing::warn!(
                    "Resuming interrupted finalization of tournament {}",
                    tournament_id
                );
            }
            Err(e) => return Err(e),
        }

        let archived = self.archive_results(tournament_id).await.map_err(|e| match e {
            AppError::Database(db) => {
                tracing::error!(
                    "Archival of tournament {} failed, it stays resumable: {}",
                    tournament_id,
                    db
                );
                AppError::FinalizeFailed(db.to_string())
            }
            other => other,
        })?;

        let results = match archived {
            Some(results) => {
                self.ctx.clear_board(tournament_id).await;
                audit::log_tournament_event(
                    tournament_id,
                    "finalized",
                    &format!("{} results archived", results.len()),
                );
                results
            }
            None => {
                tracing::debug!(
                    "Tournament {} was finalized by a concurrent caller",
                    tournament_id
                );
                self.ctx.load_results(tournament_id).await?
            }
        };

        let tournament = self.ctx.load_tournament(tournament_id).await?;
        Ok((tournament, results))
    }

    /// Write the final ranking and remove live participant rows in one
    /// transaction. Upserting results keeps a repeated run from duplicating rows.
    ///
    /// Returns `None` when another caller already committed the archival.
    async fn archive_results(
        &self,
        tournament_id: &str,
    ) -> Result<Option<Vec<TournamentResult>>> {
        let finalized_at = now_timestamp();
        let mut tx = self.ctx.pool.begin().await?;

        // Claim the archival first; this also takes the write lock.
        let claimed = sqlx::query(
            "UPDATE tournaments SET finalized_at = ?
             WHERE id = ? AND status = 'finished' AND finalized_at IS NULL",
        )
        .bind(&finalized_at)
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let participants = sqlx::query_as::<_, Participant>(
            "SELECT * FROM tournament_participants WHERE tournament_id = ?",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?;

        let results = ranking::final_results(tournament_id, participants, &finalized_at);

        // Results are rewritten wholesale so a repeated archival converges.
        sqlx::query("DELETE FROM tournament_results WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        for result in &results {
            sqlx::query(
                "INSERT INTO tournament_results
                    (tournament_id, user_id, display_name, score, solved_count, rank, finished_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (tournament_id, user_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    score = excluded.score,
                    solved_count = excluded.solved_count,
                    rank = excluded.rank,
                    finished_at = excluded.finished_at",
            )
            .bind(&result.tournament_id)
            .bind(&result.user_id)
            .bind(&result.display_name)
            .bind(result.score)
            .bind(result.solved_count)
            .bind(result.rank)
            .bind(&result.finished_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM tournament_participants WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(results))
    }

    /// Apply time-driven transitions and resume interrupted finalizations.
    pub(crate) async fn run_scheduled(&self, now: DateTime<Utc>) -> Result<ScheduleReport> {
        let now = format_timestamp(now);
        let mut report = ScheduleReport::default();

        let due_to_start: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM tournaments WHERE status = 'pending' AND start_time <= ?",
        )
        .bind(&now)
        .fetch_all(&*self.ctx.pool)
        .await?;

        for id in due_to_start {
            match self.start(&id).await {
                Ok(_) => report.started += 1,
                Err(AppError::InvalidTransition { .. }) => {
                    tracing::debug!("Tournament {} was started elsewhere", id);
                }
                Err(e) => tracing::error!("Scheduled start of tournament {} failed: {}", id, e),
            }
        }

        let due_to_finish: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM tournaments WHERE status = 'active' AND end_time <= ?",
        )
        .bind(&now)
        .fetch_all(&*self.ctx.pool)
        .await?;

        for id in due_to_finish {
            match self.finish(&id).await {
                Ok(_) => report.finished += 1,
                Err(AppError::InvalidTransition { .. }) => {
                    tracing::debug!("Tournament {} was finished elsewhere", id);
                }
                Err(e) => tracing::error!("Scheduled finish of tournament {} failed: {}", id, e),
            }
        }

        let awaiting: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM tournaments WHERE status = 'finished' AND finalized_at IS NULL",
        )
        .fetch_all(&*self.ctx.pool)
        .await?;

        for id in awaiting {
            match self.finish(&id).await {
                Ok(_) => report.resumed += 1,
                Err(AppError::InvalidTransition { .. }) => {}
                Err(e) => tracing::error!("Resuming finalization of {} failed: {}", id, e),
            }
        }

        if report.started + report.finished + report.resumed > 0 {
            tracing::info!(
                "Scheduled transitions: {} started, {} finished, {} resumed",
                report.started,
                report.finished,
                report.resumed
            );
        }

        Ok(report)
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Tournament name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Tournament name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(description.to_string())
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(AppError::Validation(
            "start_time must be before end_time".to_string(),
        ));
    }
    Ok(())
}
