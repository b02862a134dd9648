use crate::{
    audit,
    db::{
        models::{now_timestamp, Participant, Tournament, TournamentResult, TournamentStatus},
        DbPool,
    },
    error::{AppError, Result},
    leaderboard::{LeaderboardCache, LeaderboardEntry},
    puzzles::PuzzleService,
};
use sqlx::SqliteConnection;
use std::sync::Arc;

/// Shared handles for the tournament services.
pub(crate) struct TournamentContext {
    pub(crate) pool: Arc<DbPool>,
    pub(crate) leaderboard: Arc<dyn LeaderboardCache>,
    pub(crate) puzzles: Arc<dyn PuzzleService>,
}

impl TournamentContext {
    pub(crate) fn new(
        pool: Arc<DbPool>,
        leaderboard: Arc<dyn LeaderboardCache>,
        puzzles: Arc<dyn PuzzleService>,
    ) -> Self {
        Self {
            pool,
            leaderboard,
            puzzles,
        }
    }

    pub(crate) async fn save_tournament(&self, tournament: &Tournament) -> Result<()> {
        sqlx::query(
            "INSERT INTO tournaments (
                id, name, description, start_time, end_time, status, created_by,
                created_at, started_at, finished_at, cancelled_at, finalized_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tournament.id)
        .bind(&tournament.name)
        .bind(&tournament.description)
        .bind(&tournament.start_time)
        .bind(&tournament.end_time)
        .bind(tournament.status)
        .bind(&tournament.created_by)
        .bind(&tournament.created_at)
        .bind(&tournament.started_at)
        .bind(&tournament.finished_at)
        .bind(&tournament.cancelled_at)
        .bind(&tournament.finalized_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn load_tournament(&self, tournament_id: &str) -> Result<Tournament> {
        sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = ?")
            .bind(tournament_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound("Tournament not found".to_string()),
                _ => AppError::Database(e),
            })
    }

    /// Move a tournament between states with a conditional update, so two
    /// racing callers can never both win the same edge.
    pub(crate) async fn transition(
        &self,
        tournament_id: &str,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if apply_transition(&mut conn, tournament_id, from, to).await? {
            return Ok(());
        }
        drop(conn);

        Err(self.rejected_transition(tournament_id, to).await)
    }

    /// Error for a transition whose conditional update matched no row.
    pub(crate) async fn rejected_transition(
        &self,
        tournament_id: &str,
        to: TournamentStatus,
    ) -> AppError {
        match self.load_tournament(tournament_id).await {
            Ok(current) => AppError::InvalidTransition {
                from: current.status,
                to,
            },
            Err(e) => e,
        }
    }

    pub(crate) async fn load_participant(
        &self,
        tournament_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT * FROM tournament_participants WHERE tournament_id = ? AND user_id = ?",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(participant)
    }

    pub(crate) async fn load_participants(&self, tournament_id: &str) -> Result<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(
            "SELECT * FROM tournament_participants
             WHERE tournament_id = ?
             ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(tournament_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(participants)
    }

    pub(crate) async fn load_results(&self, tournament_id: &str) -> Result<Vec<TournamentResult>> {
        let results = sqlx::query_as::<_, TournamentResult>(
            "SELECT * FROM tournament_results WHERE tournament_id = ? ORDER BY rank ASC",
        )
        .bind(tournament_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(results)
    }

    /// Push a committed score into the cache. Failures only degrade reads.
    pub(crate) async fn mirror_score(&self, tournament_id: &str, user_id: &str, score: i64) {
        if let Err(e) = self
            .leaderboard
            .set_score(tournament_id, user_id, score)
            .await
        {
            audit::log_cache_degraded(tournament_id, "set_score", &e.to_string());
        }
    }

    pub(crate) async fn forget_member(&self, tournament_id: &str, user_id: &str) {
        if let Err(e) = self.leaderboard.remove(tournament_id, user_id).await {
            audit::log_cache_degraded(tournament_id, "remove", &e.to_string());
        }
    }

    pub(crate) async fn clear_board(&self, tournament_id: &str) {
        if let Err(e) = self.leaderboard.clear(tournament_id).await {
            audit::log_cache_degraded(tournament_id, "clear", &e.to_string());
        }
    }

    /// Rebuild the cached board from participant rows. Returns the entries
    /// written so callers can serve them even if the cache rejected them.
    pub(crate) async fn rebuild_board(&self, tournament_id: &str) -> Result<Vec<LeaderboardEntry>> {
        let entries: Vec<LeaderboardEntry> = self
            .load_participants(tournament_id)
            .await?
            .into_iter()
            .map(|p| LeaderboardEntry {
                user_id: p.user_id,
                score: p.score,
            })
            .collect();

        if let Err(e) = self
            .leaderboard
            .replace(tournament_id, entries.clone())
            .await
        {
            audit::log_cache_degraded(tournament_id, "replace", &e.to_string());
        } else {
            tracing::debug!(
                "Rebuilt leaderboard for tournament {} ({} entries)",
                tournament_id,
                entries.len()
            );
        }

        Ok(entries)
    }
}

/// Conditional status update on any connection or transaction. Returns
/// whether this caller won the transition.
pub(crate) async fn apply_transition(
    conn: &mut SqliteConnection,
    tournament_id: &str,
    from: TournamentStatus,
    to: TournamentStatus,
) -> Result<bool> {
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidTransition { from, to });
    }

    let stamp_column = match to {
        TournamentStatus::Active => "started_at",
        TournamentStatus::Finished => "finished_at",
        TournamentStatus::Cancelled => "cancelled_at",
        TournamentStatus::Pending => return Err(AppError::InvalidTransition { from, to }),
    };
    let sql = format!(
        "UPDATE tournaments SET status = ?, {} = ? WHERE id = ? AND status = ?",
        stamp_column
    );

    let result = sqlx::query(&sql)
        .bind(to)
        .bind(now_timestamp())
        .bind(tournament_id)
        .bind(from)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
