//! Session-property synchronization
//!
//! Translates the local profile to and from provider property storage,
//! rebuilds the participant roster and builds the start-gating write.

pub mod profile;
pub mod roster;
pub mod start;

pub use profile::{lobby_player_properties, lobby_visible_keys, session_creation_properties};
pub use roster::{Participant, ParticipantRoster};
pub use start::{capacity_reached, open_expectation, start_properties, StartGate};
