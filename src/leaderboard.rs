//! Read-optimized leaderboard view.
//!
//! The cache is an accelerator only: it may be stale or missing, it is never
//! read by finalization, and every write to it is best-effort. A tournament
//! whose board is missing is rebuilt from participant rows on the next read.

use async_trait::async_trait;
use serde::Serialize;
use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("leaderboard cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: i64,
    pub user_id: String,
    pub score: i64,
}

#[async_trait]
pub trait LeaderboardCache: Send + Sync {
    /// Mirror a participant's latest score into an existing board.
    async fn set_score(&self, tournament_id: &str, user_id: &str, score: i64)
        -> Result<(), CacheError>;

    async fn remove(&self, tournament_id: &str, user_id: &str) -> Result<(), CacheError>;

    /// `None` when no board is cached for the tournament.
    async fn top(&self, tournament_id: &str, limit: usize)
        -> Result<Option<Vec<Standing>>, CacheError>;

    /// `None` when the board or the member is missing.
    async fn standing(&self, tournament_id: &str, user_id: &str)
        -> Result<Option<Standing>, CacheError>;

    /// Replace the whole board with canonical data.
    async fn replace(&self, tournament_id: &str, entries: Vec<LeaderboardEntry>)
        -> Result<(), CacheError>;

    async fn clear(&self, tournament_id: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Default)]
struct Board {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(Reverse<i64>, String)>,
}

impl Board {
    fn upsert(&mut self, user_id: &str, score: i64) {
        if let Some(previous) = self.scores.insert(user_id.to_string(), score) {
            self.ordered.remove(&(Reverse(previous), user_id.to_string()));
        }
        self.ordered.insert((Reverse(score), user_id.to_string()));
    }

    fn remove(&mut self, user_id: &str) {
        if let Some(previous) = self.scores.remove(user_id) {
            self.ordered.remove(&(Reverse(previous), user_id.to_string()));
        }
    }

    fn standings(&self) -> impl Iterator<Item = Standing> + '_ {
        self.ordered
            .iter()
            .enumerate()
            .map(|(i, (Reverse(score), user_id))| Standing {
                rank: i as i64 + 1,
                user_id: user_id.clone(),
                score: *score,
            })
    }
}

/// Rank canonical entries in the same order the cache uses.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>) -> Vec<Standing> {
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| Standing {
            rank: i as i64 + 1,
            user_id: e.user_id,
            score: e.score,
        })
        .collect()
}

/// Sorted-set leaderboard held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLeaderboard {
    boards: RwLock<HashMap<String, Board>>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardCache for InMemoryLeaderboard {
    async fn set_score(
        &self,
        tournament_id: &str,
        user_id: &str,
        score: i64,
    ) -> Result<(), CacheError> {
        let mut boards = self.boards.write().await;
        if let Some(board) = boards.get_mut(tournament_id) {
            // Live scores never decrease, so a late write must not regress the board.
            let current = board.scores.get(user_id).copied().unwrap_or(i64::MIN);
            if score >= current {
                board.upsert(user_id, score);
            }
        }
        Ok(())
    }

    async fn remove(&self, tournament_id: &str, user_id: &str) -> Result<(), CacheError> {
        if let Some(board) = self.boards.write().await.get_mut(tournament_id) {
            board.remove(user_id);
        }
        Ok(())
    }

    async fn top(
        &self,
        tournament_id: &str,
        limit: usize,
    ) -> Result<Option<Vec<Standing>>, CacheError> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(tournament_id)
            .map(|board| board.standings().take(limit).collect()))
    }

    async fn standing(
        &self,
        tournament_id: &str,
        user_id: &str,
    ) -> Result<Option<Standing>, CacheError> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(tournament_id)
            .and_then(|board| board.standings().find(|s| s.user_id == user_id)))
    }

    async fn replace(
        &self,
        tournament_id: &str,
        entries: Vec<LeaderboardEntry>,
    ) -> Result<(), CacheError> {
        let mut board = Board::default();
        for entry in entries {
            board.upsert(&entry.user_id, entry.score);
        }
        self.boards
            .write()
            .await
            .insert(tournament_id.to_string(), board);
        Ok(())
    }

    async fn clear(&self, tournament_id: &str) -> Result<(), CacheError> {
        self.boards.write().await.remove(tournament_id);
        Ok(())
    }
}
