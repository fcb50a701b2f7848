//! Matchmaking controller
//!
//! The state machine lives in [`machine`]; [`runner`] drives it from a
//! single task and exposes a cloneable handle.

pub mod handlers;
pub mod machine;
pub mod runner;
pub mod state;

pub use handlers::{
    ListingLogObserver, LoggingPhaseHandlers, NoopObserver, PhaseHandlers, SessionListObserver,
    SessionListing,
};
pub use machine::{
    ControllerCommand, ControllerInput, ControllerSettings, ControllerStatus,
    MatchmakingController,
};
pub use runner::{spawn_controller, ControllerHandle};
