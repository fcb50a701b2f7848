//! Configuration management for the room-matchmaker service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;

pub use app::{
    validate_config, AppConfig, MatchmakingSettings, ServiceSettings, SimulationSettings,
};
