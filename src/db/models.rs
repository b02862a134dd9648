use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Fixed-width RFC 3339 UTC timestamp, so string order matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

// ============================================================================
// Tournament
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "lowercase")]
pub enum TournamentStatus {
    Pending,
    Active,
    Finished,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Pending => "pending",
            TournamentStatus::Active => "active",
            TournamentStatus::Finished => "finished",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further writes of any kind.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TournamentStatus::Finished | TournamentStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        matches!(
            (self, next),
            (TournamentStatus::Pending, TournamentStatus::Active)
                | (TournamentStatus::Active, TournamentStatus::Finished)
                | (TournamentStatus::Pending, TournamentStatus::Cancelled)
        )
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TournamentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TournamentStatus::Pending),
            "active" => Ok(TournamentStatus::Active),
            "finished" => Ok(TournamentStatus::Finished),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub status: TournamentStatus,
    pub created_by: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub finalized_at: Option<String>,
}

impl Tournament {
    pub fn new(
        name: String,
        description: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        created_by: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            start_time: format_timestamp(start_time),
            end_time: format_timestamp(end_time),
            status: TournamentStatus::Pending,
            created_by,
            created_at: now_timestamp(),
            started_at: None,
            finished_at: None,
            cancelled_at: None,
            finalized_at: None,
        }
    }

    /// Finished, but the archival transaction has not committed yet.
    pub fn is_awaiting_finalize(&self) -> bool {
        self.status == TournamentStatus::Finished && self.finalized_at.is_none()
    }
}

// ============================================================================
// Participants, solves and results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub tournament_id: String,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
    pub solved_count: i64,
    pub joined_at: String,
    pub last_solved_at: Option<String>,
}

impl Participant {
    pub fn new(tournament_id: String, user_id: String, display_name: String) -> Self {
        Self {
            tournament_id,
            user_id,
            display_name,
            score: 0,
            solved_count: 0,
            joined_at: now_timestamp(),
            last_solved_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SolveRecord {
    pub tournament_id: String,
    pub user_id: String,
    pub puzzle_id: String,
    pub difficulty: String,
    pub points: i64,
    pub solved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TournamentResult {
    pub tournament_id: String,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
    pub solved_count: i64,
    pub rank: i64,
    pub finished_at: String,
}

/// Live standing derived from participant rows; the rank is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
    pub solved_count: i64,
    pub joined_at: String,
    pub last_solved_at: Option<String>,
}
