//! Error types for the matchmaking controller
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

use crate::types::ControllerState;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Transport operation '{operation}' failed: {message}")]
    TransportFailed { operation: String, message: String },

    #[error("Illegal state transition: {from} -> {to}")]
    InvalidTransition {
        from: ControllerState,
        to: ControllerState,
    },

    #[error("Matching policy cannot change while in state {state}")]
    PolicyLocked { state: ControllerState },

    #[error("Session not found: {name}")]
    SessionNotFound { name: String },

    #[error("Session is full: {name}")]
    SessionFull { name: String },

    #[error("Missing property: {key}")]
    MissingProperty { key: String },

    #[error("Invalid property '{key}': {message}")]
    InvalidProperty { key: String, message: String },

    #[error("Participant is not in a session")]
    NotInSession,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}
