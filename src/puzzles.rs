//! Puzzle service boundary.
//!
//! The engine never stores puzzles itself. It asks a collaborator for a
//! puzzle's difficulty tier and for the candidate puzzles of a tier.

use crate::{
    error::{AppError, Result},
    scoring::Difficulty,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleInfo {
    pub id: String,
    #[serde(alias = "complexity")]
    pub difficulty: String,
}

#[async_trait]
pub trait PuzzleService: Send + Sync {
    async fn puzzle(&self, puzzle_id: &str) -> Result<PuzzleInfo>;

    async fn puzzles_by_difficulty(&self, difficulty: &str) -> Result<Vec<PuzzleInfo>>;
}

/// Remote puzzle service reached over HTTP with a per-request timeout.
pub struct HttpPuzzleService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPuzzleService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(unavailable)
    }
}

fn unavailable(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        tracing::warn!("Puzzle service request timed out: {}", err);
        AppError::CollaboratorUnavailable("request timed out".to_string())
    } else {
        tracing::warn!("Puzzle service request failed: {}", err);
        AppError::CollaboratorUnavailable(err.to_string())
    }
}

#[async_trait]
impl PuzzleService for HttpPuzzleService {
    async fn puzzle(&self, puzzle_id: &str) -> Result<PuzzleInfo> {
        let url = format!("{}/puzzles/{}", self.base_url, puzzle_id);
        let response = self.get(&url, &[]).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("Puzzle not found".to_string()));
        }
        if !response.status().is_success() {
            tracing::warn!("Puzzle service returned status {}", response.status());
            return Err(AppError::CollaboratorUnavailable(format!(
                "puzzle service returned status {}",
                response.status()
            )));
        }

        response.json::<PuzzleInfo>().await.map_err(unavailable)
    }

    async fn puzzles_by_difficulty(&self, difficulty: &str) -> Result<Vec<PuzzleInfo>> {
        let url = format!("{}/puzzles", self.base_url);
        let response = self.get(&url, &[("difficulty", difficulty)]).await?;

        if !response.status().is_success() {
            tracing::warn!("Puzzle service returned status {}", response.status());
            return Err(AppError::CollaboratorUnavailable(format!(
                "puzzle service returned status {}",
                response.status()
            )));
        }

        response.json::<Vec<PuzzleInfo>>().await.map_err(unavailable)
    }
}

/// Fixed puzzle catalog held in memory, used when no remote service is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPuzzleCatalog {
    puzzles: HashMap<String, PuzzleInfo>,
}

impl InMemoryPuzzleCatalog {
    pub fn new(puzzles: impl IntoIterator<Item = PuzzleInfo>) -> Self {
        Self {
            puzzles: puzzles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// `per_tier` puzzles for every difficulty, with ids like `easy-003`.
    pub fn sample(per_tier: usize) -> Self {
        Self::new(Difficulty::ALL.into_iter().flat_map(|tier| {
            (1..=per_tier).map(move |n| PuzzleInfo {
                id: format!("{}-{:03}", tier.as_str(), n),
                difficulty: tier.as_str().to_string(),
            })
        }))
    }
}

#[async_trait]
impl PuzzleService for InMemoryPuzzleCatalog {
    async fn puzzle(&self, puzzle_id: &str) -> Result<PuzzleInfo> {
        self.puzzles
            .get(puzzle_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Puzzle not found".to_string()))
    }

    async fn puzzles_by_difficulty(&self, difficulty: &str) -> Result<Vec<PuzzleInfo>> {
        let mut puzzles: Vec<_> = self
            .puzzles
            .values()
            .filter(|p| p.difficulty == difficulty)
            .cloned()
            .collect();
        puzzles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(puzzles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        response::IntoResponse,
        routing::get,
        Json, Router,
    };

    #[tokio::test]
    async fn sample_catalog_covers_every_tier() {
        let catalog = InMemoryPuzzleCatalog::sample(3);
        for tier in Difficulty::ALL {
            let puzzles = catalog.puzzles_by_difficulty(tier.as_str()).await.unwrap();
            assert_eq!(puzzles.len(), 3);
        }
        let puzzle = catalog.puzzle("hard-002").await.unwrap();
        assert_eq!(puzzle.difficulty, "hard");
        assert!(matches!(
            catalog.puzzle("hard-999").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn accepts_complexity_field_name() {
        let info: PuzzleInfo =
            serde_json::from_str(r#"{"id":"p1","complexity":"easy","solution":"..."}"#).unwrap();
        assert_eq!(info.difficulty, "easy");
    }

    #[derive(Deserialize)]
    struct DifficultyQuery {
        difficulty: String,
    }

    async fn puzzle_by_id(Path(id): Path<String>) -> axum::response::Response {
        match id.as_str() {
            "slow" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(PuzzleInfo {
                    id,
                    difficulty: "easy".into(),
                })
                .into_response()
            }
            "missing" => StatusCode::NOT_FOUND.into_response(),
            "broken" => StatusCode::BAD_GATEWAY.into_response(),
            _ => Json(PuzzleInfo {
                id,
                difficulty: "medium".into(),
            })
            .into_response(),
        }
    }

    async fn puzzles_by_tier(Query(q): Query<DifficultyQuery>) -> Json<Vec<PuzzleInfo>> {
        Json(vec![PuzzleInfo {
            id: format!("{}-1", q.difficulty),
            difficulty: q.difficulty,
        }])
    }

    async fn spawn_fake_service() -> String {
        let app = Router::new()
            .route("/puzzles", get(puzzles_by_tier))
            .route("/puzzles/:id", get(puzzle_by_id));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn http_service_fetches_puzzles() {
        let base = spawn_fake_service().await;
        let service = HttpPuzzleService::new(&base, Duration::from_secs(2)).unwrap();

        let puzzle = service.puzzle("p42").await.unwrap();
        assert_eq!(puzzle.id, "p42");
        assert_eq!(puzzle.difficulty, "medium");

        let list = service.puzzles_by_difficulty("hard").await.unwrap();
        assert_eq!(list[0].id, "hard-1");
    }

    #[tokio::test]
    async fn http_service_maps_failures() {
        let base = spawn_fake_service().await;
        let service = HttpPuzzleService::new(&base, Duration::from_millis(100)).unwrap();

        assert!(matches!(
            service.puzzle("slow").await,
            Err(AppError::CollaboratorUnavailable(_))
        ));
        assert!(matches!(
            service.puzzle("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.puzzle("broken").await,
            Err(AppError::CollaboratorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service =
            HttpPuzzleService::new(&format!("http://{}", addr), Duration::from_millis(200))
                .unwrap();
        assert!(matches!(
            service.puzzles_by_difficulty("easy").await,
            Err(AppError::CollaboratorUnavailable(_))
        ));
    }
}
