//! Main application configuration
//!
//! This module defines the configuration structures for the room-matchmaker
//! service, including TOML file loading, environment variable overrides and
//! validation.

use crate::controller::ControllerSettings;
use crate::error::MatchmakingError;
use crate::types::MatchingPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub simulation: SimulationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and health reports
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Controller tick period in milliseconds
    pub tick_interval_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Connect as soon as a participant starts
    pub auto_connect: bool,
    /// Run selection automatically while in the lobby
    pub auto_join: bool,
    /// Capacity of created sessions; a session starts when this is reached
    pub max_players_per_session: usize,
    /// Require equal skill tiers when selecting sessions
    pub rank_matching_enabled: bool,
    /// Private matching keyword, empty for public matching
    pub shared_keyword: String,
}

/// Simulated participants driven by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of participants to run
    pub participants: usize,
    /// Skill tiers assigned round-robin to participants
    pub skill_tiers: Vec<i64>,
    /// Nickname prefix; participants are named `<prefix>-<n>`
    pub name_prefix: String,
    /// Delay between consecutive participant connects in milliseconds
    pub join_stagger_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "room-matchmaker".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            tick_interval_ms: 1000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        let policy = MatchingPolicy::default();
        Self {
            auto_connect: true,
            auto_join: true,
            max_players_per_session: policy.max_players_per_session,
            rank_matching_enabled: policy.rank_matching_enabled,
            shared_keyword: policy.shared_keyword,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            participants: 4,
            skill_tiers: vec![1],
            name_prefix: "player".to_string(),
            join_stagger_ms: 250,
        }
    }
}

impl MatchmakingSettings {
    /// Matching policy applied by every controller
    pub fn policy(&self) -> MatchingPolicy {
        MatchingPolicy {
            rank_matching_enabled: self.rank_matching_enabled,
            shared_keyword: self.shared_keyword.clone(),
            max_players_per_session: self.max_players_per_session,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            policy: self.policy(),
            auto_connect: self.auto_connect,
            auto_join: self.auto_join,
        }
    }
}

impl SimulationSettings {
    /// Skill tier for the participant at `index`
    pub fn tier_for(&self, index: usize) -> i64 {
        if self.skill_tiers.is_empty() {
            return 0;
        }
        self.skill_tiers[index % self.skill_tiers.len()]
    }

    pub fn name_for(&self, index: usize) -> String {
        format!("{}-{}", self.name_prefix, index + 1)
    }

    pub fn join_stagger(&self) -> Duration {
        Duration::from_millis(self.join_stagger_ms)
    }
}

fn parse_env<T: FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse TOML without consulting the environment
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        parse_env("HEALTH_PORT", &mut self.service.health_port)?;
        parse_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;
        parse_env("TICK_INTERVAL_MS", &mut self.service.tick_interval_ms)?;

        // Matchmaking settings
        parse_env("AUTO_CONNECT", &mut self.matchmaking.auto_connect)?;
        parse_env("AUTO_JOIN", &mut self.matchmaking.auto_join)?;
        parse_env(
            "MAX_PLAYERS_PER_SESSION",
            &mut self.matchmaking.max_players_per_session,
        )?;
        parse_env(
            "RANK_MATCHING_ENABLED",
            &mut self.matchmaking.rank_matching_enabled,
        )?;
        if let Ok(keyword) = env::var("SHARED_KEYWORD") {
            self.matchmaking.shared_keyword = keyword;
        }

        // Simulation settings
        parse_env("SIMULATED_PARTICIPANTS", &mut self.simulation.participants)?;
        parse_env("JOIN_STAGGER_MS", &mut self.simulation.join_stagger_ms)?;
        if let Ok(tiers) = env::var("SKILL_TIERS") {
            self.simulation.skill_tiers = tiers
                .split(',')
                .map(|t| t.trim().parse::<i64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| anyhow!("Invalid SKILL_TIERS value: {}", tiers))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get controller tick period as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.service.tick_interval_ms)
    }
}

/// Validate configuration values
fn invalid(message: impl Into<String>) -> anyhow::Error {
    MatchmakingError::ConfigurationError {
        message: message.into(),
    }
    .into()
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(invalid(format!(
                "Invalid log level: {}",
                config.service.log_level
            )))
        }
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(invalid("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(invalid("Shutdown timeout must be greater than 0"));
    }
    if config.service.tick_interval_ms == 0 {
        return Err(invalid("Tick interval must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.max_players_per_session < 2 {
        return Err(invalid(format!(
            "Max players per session must be at least 2, got {}",
            config.matchmaking.max_players_per_session
        )));
    }

    // Validate simulation settings
    if config.simulation.participants == 0 {
        return Err(invalid("At least one simulated participant is required"));
    }
    if config.simulation.skill_tiers.is_empty() {
        return Err(invalid("Skill tier list cannot be empty"));
    }

    Ok(())
}
