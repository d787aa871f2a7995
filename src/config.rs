use std::net::SocketAddr;
use std::str::FromStr;

use crate::types::GameConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://meme.db?mode=rwc";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
    /// Insert the demo memes and users into an empty database
    pub seed_demo: bool,
    pub game: GameConfig,
}

/// Parse an env var, falling back to `default` when it is unset or invalid
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

impl AppConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = GameConfig::default();

        let bind_addr = env_parse("BIND_ADDR", default_bind_addr());
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let allowed_origins = parse_origins(
            &std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.into()),
        );

        let mut game = GameConfig {
            round_limit: env_parse("ROUND_LIMIT", defaults.round_limit),
            round_seconds: env_parse("ROUND_SECONDS", defaults.round_seconds),
            captions_per_round: env_parse("CAPTIONS_PER_ROUND", defaults.captions_per_round),
            correct_reward: env_parse("CORRECT_REWARD", defaults.correct_reward),
            ..defaults
        };
        if game.round_limit == 0 {
            tracing::warn!("ROUND_LIMIT must be at least 1, using {}", defaults.round_limit);
            game.round_limit = defaults.round_limit;
        }
        if game.captions_per_round < game.min_captions {
            tracing::warn!(
                "CAPTIONS_PER_ROUND must be at least {}, using {}",
                game.min_captions,
                defaults.captions_per_round
            );
            game.captions_per_round = defaults.captions_per_round;
        }

        let seed_demo = env_flag("SEED_DEMO", true);

        tracing::info!(
            %bind_addr,
            round_limit = game.round_limit,
            round_seconds = game.round_seconds,
            seed_demo,
            "Config loaded"
        );

        Self {
            bind_addr,
            database_url,
            allowed_origins,
            seed_demo,
            game,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            seed_demo: true,
            game: GameConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
