//! Engine configuration loaded from the environment.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::types::math::MAX_RESERVE_FACTOR;

pub const DEFAULT_MAX_SORTED_USERS: usize = 20;
pub const DEFAULT_MAX_MATCHING_ITERATIONS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// NMAX: ranked slots per (market, side, book)
    pub max_sorted_users: NonZeroUsize,

    /// Accounts visited by one matching or unmatching pass
    pub max_matching_iterations: usize,

    /// Reserve factor (bps) given to newly created markets
    pub default_reserve_factor: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sorted_users: NonZeroUsize::new(DEFAULT_MAX_SORTED_USERS).unwrap_or(NonZeroUsize::MIN),
            max_matching_iterations: DEFAULT_MAX_MATCHING_ITERATIONS,
            default_reserve_factor: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let max_sorted_users = parse_positive(&env_map, "OVERLAY_MAX_SORTED_USERS", DEFAULT_MAX_SORTED_USERS)?;

        let max_matching_iterations = parse_positive(
            &env_map,
            "OVERLAY_MAX_MATCHING_ITERATIONS",
            DEFAULT_MAX_MATCHING_ITERATIONS,
        )?
        .get();

        let default_reserve_factor = env_map
            .get("OVERLAY_DEFAULT_RESERVE_FACTOR")
            .map(|s| s.as_str())
            .unwrap_or("0")
            .parse::<u16>()
            .ok()
            .filter(|bps| *bps <= MAX_RESERVE_FACTOR)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "OVERLAY_DEFAULT_RESERVE_FACTOR".to_string(),
                    format!("must be an integer between 0 and {}", MAX_RESERVE_FACTOR),
                )
            })?;

        Ok(EngineConfig {
            max_sorted_users,
            max_matching_iterations,
            default_reserve_factor,
        })
    }
}

fn parse_positive(
    env_map: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<NonZeroUsize, ConfigError> {
    let value = match env_map.get(key) {
        Some(s) => s.trim().parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid usize".to_string())
        })?,
        None => default,
    };

    NonZeroUsize::new(value).ok_or_else(|| {
        ConfigError::InvalidValue(key.to_string(), "must be greater than zero".to_string())
    })
}
