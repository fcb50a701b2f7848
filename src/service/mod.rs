//! Service layer for the room-matchmaker binary
//!
//! This module contains the application state that runs the simulated
//! participants and the health evaluation reported over HTTP.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus, ParticipantStats};
