use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::domains::dispatch::utils::scoring::RankingWeights;

/// Matching policy and server configuration loaded from environment variables.
///
/// The weights, radii and timeout are policy choices, not physics — they are
/// deliberately configuration so operators can tune them without a rebuild.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub port: u16,
    /// First search radius around a need (km). Doubles until a candidate is
    /// found or `max_radius_km` is reached.
    pub initial_radius_km: f64,
    /// Hard ceiling for the expanding radius search (km).
    pub max_radius_km: f64,
    /// Composite ranking weights (capability coverage weighted highest).
    pub weights: RankingWeights,
    /// How long a proposed assignment may sit unconfirmed before it expires
    /// and the need is re-queued.
    pub confirm_timeout: Duration,
    /// Upper bound on queued needs re-attempted per capacity-freeing trigger.
    pub rematch_batch: usize,
    /// Number of past assignment events kept for subscriber replay.
    pub replay_capacity: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            initial_radius_km: 10.0,
            max_radius_km: 160.0,
            weights: RankingWeights::default(),
            confirm_timeout: Duration::from_secs(300),
            rematch_batch: 16,
            replay_capacity: 1024,
        }
    }
}

impl MatcherConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        Ok(Self {
            port: env_or("PORT", defaults.port)?,
            initial_radius_km: env_or("MATCH_INITIAL_RADIUS_KM", defaults.initial_radius_km)?,
            max_radius_km: env_or("MATCH_MAX_RADIUS_KM", defaults.max_radius_km)?,
            weights: RankingWeights {
                capability: env_or("MATCH_WEIGHT_CAPABILITY", defaults.weights.capability)?,
                distance: env_or("MATCH_WEIGHT_DISTANCE", defaults.weights.distance)?,
                load: env_or("MATCH_WEIGHT_LOAD", defaults.weights.load)?,
            },
            confirm_timeout: Duration::from_secs(env_or(
                "MATCH_CONFIRM_TIMEOUT_SECS",
                defaults.confirm_timeout.as_secs(),
            )?),
            rematch_batch: env_or("MATCH_REMATCH_BATCH", defaults.rematch_batch)?,
            replay_capacity: env_or("MATCH_REPLAY_CAPACITY", defaults.replay_capacity)?,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number (got {raw:?})")),
        Err(_) => Ok(default),
    }
}
