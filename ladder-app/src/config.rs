use std::{str::FromStr, time::Duration};

use crate::domain::{rating::EloRatingService, search::QueryConfig, validation::ValidationConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub k_factor: f64,
    /// Extra attempts after the first one when a commit conflicts or a lease
    /// times out.
    pub max_retries: u32,
    pub lease_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k_factor: EloRatingService::DEFAULT_K_FACTOR,
            max_retries: 3,
            lease_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub query: QueryConfig,
    pub validation: ValidationConfig,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid value '{}' for {}", raw, name);
                default
            }
        },
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let engine = EngineConfig {
            k_factor: env_or("RATING_K_FACTOR", defaults.engine.k_factor),
            max_retries: env_or("UPDATE_MAX_RETRIES", defaults.engine.max_retries),
            lease_timeout: Duration::from_millis(env_or(
                "LEASE_TIMEOUT_MS",
                defaults.engine.lease_timeout.as_millis() as u64,
            )),
        };
        let query = QueryConfig {
            max_limit: env_or("QUERY_MAX_LIMIT", defaults.query.max_limit),
            default_search_limit: env_or(
                "SEARCH_DEFAULT_LIMIT",
                defaults.query.default_search_limit,
            ),
            default_leaderboard_limit: env_or(
                "LEADERBOARD_DEFAULT_LIMIT",
                defaults.query.default_leaderboard_limit,
            ),
        };
        Self {
            engine,
            query,
            validation: ValidationConfig::from_env(),
        }
    }
}
