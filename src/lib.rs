//! Room Matchmaker - peer matchmaking controller
//!
//! This crate drives a participant from connecting to a session provider,
//! through the lobby and candidate selection by keyword and skill tier, into
//! a full session whose start is broadcast by exactly one participant.

pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod selector;
pub mod service;
pub mod sync;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use controller::{
    spawn_controller, ControllerCommand, ControllerHandle, ControllerInput, ControllerSettings,
    ControllerStatus, MatchmakingController, PhaseHandlers, SessionListObserver,
};
pub use selector::{CandidateSelector, KeywordRankSelector};
pub use transport::{LoopbackBackend, SessionTransport, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
