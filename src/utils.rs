//! Utility functions for the matchmaking controller

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session name
pub fn generate_session_name() -> String {
    Uuid::new_v4().to_string()
}

/// Generate the unique identifier a participant publishes in its player properties
pub fn generate_player_guid() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
