use crate::{
    audit,
    db::models::{DashboardEntry, TournamentResult, TournamentStatus},
    error::{AppError, Result},
    leaderboard::{rank_entries, LeaderboardEntry, Standing},
};
use std::sync::Arc;

use super::{context::TournamentContext, ranking};

pub(crate) struct StandingsService {
    ctx: Arc<TournamentContext>,
}

impl StandingsService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Live standings computed from participant rows.
    pub(crate) async fn dashboard(&self, tournament_id: &str) -> Result<Vec<DashboardEntry>> {
        self.ctx.load_tournament(tournament_id).await?;
        let participants = self.ctx.load_participants(tournament_id).await?;
        Ok(ranking::dashboard(participants))
    }

    pub(crate) async fn results(&self, tournament_id: &str) -> Result<Vec<TournamentResult>> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Finished || tournament.finalized_at.is_none() {
            return Err(AppError::ResultsNotReady);
        }

        self.ctx.load_results(tournament_id).await
    }

    /// Top of the leaderboard, served from the cache when it has a board.
    pub(crate) async fn top(&self, tournament_id: &str, limit: usize) -> Result<Vec<Standing>> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        match tournament.status {
            TournamentStatus::Finished => {
                let results = self.results(tournament_id).await?;
                return Ok(results
                    .into_iter()
                    .take(limit)
                    .map(|r| Standing {
                        rank: r.rank,
                        user_id: r.user_id,
                        score: r.score,
                    })
                    .collect());
            }
            TournamentStatus::Cancelled => return Ok(Vec::new()),
            TournamentStatus::Pending | TournamentStatus::Active => {}
        }

        match self.ctx.leaderboard.top(tournament_id, limit).await {
            Ok(Some(standings)) => return Ok(standings),
            Ok(None) => {
                tracing::debug!("Leaderboard miss for tournament {}", tournament_id);
            }
            Err(e) => audit::log_cache_degraded(tournament_id, "top", &e.to_string()),
        }

        let entries = self.ctx.rebuild_board(tournament_id).await?;
        Ok(rank_entries(entries).into_iter().take(limit).collect())
    }

    /// One user's position on the leaderboard.
    pub(crate) async fn standing(&self, tournament_id: &str, user_id: &str) -> Result<Standing> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        match tournament.status {
            TournamentStatus::Finished => {
                return self
                    .results(tournament_id)
                    .await?
                    .into_iter()
                    .find(|r| r.user_id == user_id)
                    .map(|r| Standing {
                        rank: r.rank,
                        user_id: r.user_id,
                        score: r.score,
                    })
                    .ok_or(AppError::NotRegistered);
            }
            TournamentStatus::Cancelled => return Err(AppError::NotRegistered),
            TournamentStatus::Pending | TournamentStatus::Active => {}
        }

        match self.ctx.leaderboard.standing(tournament_id, user_id).await {
            Ok(Some(standing)) => return Ok(standing),
            Ok(None) => {
                // Non-participants are answered without touching the board.
                let participant = self
                    .ctx
                    .load_participant(tournament_id, user_id)
                    .await?
                    .ok_or(AppError::NotRegistered)?;
                self.ctx
                    .mirror_score(tournament_id, user_id, participant.score)
                    .await;
                if let Ok(Some(standing)) =
                    self.ctx.leaderboard.standing(tournament_id, user_id).await
                {
                    return Ok(standing);
                }
            }
            Err(e) => audit::log_cache_degraded(tournament_id, "standing", &e.to_string()),
        }

        let entries: Vec<LeaderboardEntry> = self.ctx.rebuild_board(tournament_id).await?;
        rank_entries(entries)
            .into_iter()
            .find(|s| s.user_id == user_id)
            .ok_or(AppError::NotRegistered)
    }

    pub(crate) async fn rebuild(&self, tournament_id: &str) -> Result<usize> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status.is_terminal() {
            self.ctx.clear_board(tournament_id).await;
            return Ok(0);
        }
        Ok(self.ctx.rebuild_board(tournament_id).await?.len())
    }

    /// Refresh every active tournament's board from canonical data.
    pub(crate) async fn rebuild_active(&self) -> Result<usize> {
        let active: Vec<String> =
            sqlx::query_scalar("SELECT id FROM tournaments WHERE status = 'active'")
                .fetch_all(&*self.ctx.pool)
                .await?;

        for id in &active {
            if let Err(e) = self.ctx.rebuild_board(id).await {
                tracing::warn!("Failed to rebuild leaderboard for {}: {}", id, e);
            }
        }
        Ok(active.len())
    }
}
