//! Health evaluation over the running participants
//!
//! Health is derived from the controller statuses: a participant that lost
//! its provider connection counts against the service.

use crate::controller::ControllerStatus;
use crate::types::ControllerState;
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub stats: ParticipantStats,
}

/// Participant counts per controller phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub total: usize,
    pub disconnected: usize,
    pub in_lobby: usize,
    pub waiting: usize,
    pub ready: usize,
    pub in_game: usize,
    /// Distinct sessions the participants currently sit in
    pub sessions: usize,
}

impl ParticipantStats {
    pub fn collect(statuses: &[ControllerStatus]) -> Self {
        let mut stats = Self {
            total: statuses.len(),
            ..Self::default()
        };

        let mut sessions: Vec<&str> = Vec::new();
        for status in statuses {
            match status.state {
                ControllerState::Disconnected => stats.disconnected += 1,
                ControllerState::InLobby => stats.in_lobby += 1,
                ControllerState::Waiting => stats.waiting += 1,
                ControllerState::Ready => stats.ready += 1,
                ControllerState::InGame => stats.in_game += 1,
                ControllerState::Init | ControllerState::Connected => {}
            }
            if let Some(session) = status.session.as_deref() {
                if !sessions.contains(&session) {
                    sessions.push(session);
                }
            }
        }
        stats.sessions = sessions.len();
        stats
    }
}

impl HealthCheck {
    /// Evaluate service health from participant statuses
    pub fn evaluate(service: &str, statuses: &[ControllerStatus]) -> Self {
        let stats = ParticipantStats::collect(statuses);
        Self {
            status: Self::status_of(&stats),
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            stats,
        }
    }

    fn status_of(stats: &ParticipantStats) -> HealthStatus {
        if stats.total == 0 || stats.disconnected == stats.total {
            HealthStatus::Unhealthy
        } else if stats.disconnected > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
