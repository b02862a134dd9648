use std::{env, str::FromStr, time::Duration};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub is_production: bool,
    pub puzzle_service: PuzzleServiceConfig,
    pub scheduler_interval_secs: u64,
    pub leaderboard_default_limit: usize,
}

#[derive(Clone, Debug)]
pub struct PuzzleServiceConfig {
    /// Base URL of the remote puzzle service; `None` uses the built-in catalog.
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let is_production = env::var("TOURNAMENT_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| parse_origins(&origins))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                if is_production {
                    panic!("DATABASE_URL environment variable must be set in production");
                }
                "sqlite:tournament.db".to_string()
            }
        };

        Self {
            database_url,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 3000),
            cors_allowed_origins,
            is_production,
            puzzle_service: PuzzleServiceConfig::from_env(is_production),
            scheduler_interval_secs: parse_var::<u64>("SCHEDULER_INTERVAL_SECS", 10).max(1),
            leaderboard_default_limit: parse_var::<usize>("LEADERBOARD_DEFAULT_LIMIT", 10).max(1),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_secs)
    }
}

impl PuzzleServiceConfig {
    pub fn from_env(is_production: bool) -> Self {
        let url = env::var("PUZZLE_SERVICE_URL")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        if url.is_none() {
            if is_production {
                panic!("PUZZLE_SERVICE_URL environment variable must be set in production");
            }
            tracing::warn!("PUZZLE_SERVICE_URL is not set; using the built-in puzzle catalog.");
        }

        Self {
            url,
            timeout_ms: parse_var("PUZZLE_SERVICE_TIMEOUT_MS", 2000),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a number", name)),
        Err(_) => default,
    }
}
