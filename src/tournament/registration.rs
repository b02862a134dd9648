use crate::{
    audit,
    db::models::{Participant, TournamentStatus},
    error::{AppError, Result},
};
use std::sync::Arc;

use super::context::TournamentContext;

const MAX_DISPLAY_NAME_LEN: usize = 64;

pub(crate) struct RegistrationService {
    ctx: Arc<TournamentContext>,
}

impl RegistrationService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Register a user for a pending tournament
    pub(crate) async fn register(
        &self,
        tournament_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<Participant> {
        if user_id.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }
        let display_name = normalize_display_name(display_name)?;

        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Pending {
            return Err(AppError::TournamentNotPending);
        }

        let participant = Participant::new(
            tournament_id.to_string(),
            user_id.to_string(),
            display_name,
        );

        // The status guard and the uniqueness check happen in the same statement,
        // so a concurrent start or a duplicate request cannot slip through.
        let inserted = sqlx::query(
            "INSERT INTO tournament_participants
                (tournament_id, user_id, display_name, score, solved_count, joined_at, last_solved_at)
             SELECT ?, ?, ?, 0, 0, ?, NULL
             WHERE EXISTS (SELECT 1 FROM tournaments WHERE id = ? AND status = 'pending')
             ON CONFLICT (tournament_id, user_id) DO NOTHING",
        )
        .bind(&participant.tournament_id)
        .bind(&participant.user_id)
        .bind(&participant.display_name)
        .bind(&participant.joined_at)
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            let current = self.ctx.load_tournament(tournament_id).await?;
            return Err(if current.status != TournamentStatus::Pending {
                AppError::TournamentNotPending
            } else {
                AppError::AlreadyRegistered
            });
        }

        audit::log_registration(tournament_id, user_id, true);
        Ok(participant)
    }

    /// Withdraw a registration before the tournament starts
    pub(crate) async fn unregister(&self, tournament_id: &str, user_id: &str) -> Result<()> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;
        if tournament.status.is_terminal() {
            return Err(AppError::TournamentClosed(tournament.status));
        }
        if tournament.status != TournamentStatus::Pending {
            return Err(AppError::TournamentNotPending);
        }

        let removed = sqlx::query(
            "DELETE FROM tournament_participants
             WHERE tournament_id = ? AND user_id = ?
               AND EXISTS (SELECT 1 FROM tournaments WHERE id = ? AND status = 'pending')",
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?
        .rows_affected();

        if removed == 0 {
            let current = self.ctx.load_tournament(tournament_id).await?;
            return Err(match current.status {
                TournamentStatus::Pending => AppError::NotRegistered,
                status if status.is_terminal() => AppError::TournamentClosed(status),
                _ => AppError::TournamentNotPending,
            });
        }

        self.ctx.forget_member(tournament_id, user_id).await;
        audit::log_registration(tournament_id, user_id, false);
        Ok(())
    }

    pub(crate) async fn participants(&self, tournament_id: &str) -> Result<Vec<Participant>> {
        self.ctx.load_tournament(tournament_id).await?;
        self.ctx.load_participants(tournament_id).await
    }
}

fn normalize_display_name(display_name: &str) -> Result<String> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::Validation("Display name is required".to_string()));
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(display_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_bounds() {
        assert_eq!(normalize_display_name(" neo ").unwrap(), "neo");
        assert!(normalize_display_name("").is_err());
        assert!(normalize_display_name(&"n".repeat(MAX_DISPLAY_NAME_LEN)).is_ok());
        assert!(normalize_display_name(&"n".repeat(MAX_DISPLAY_NAME_LEN + 1)).is_err());
    }
}
