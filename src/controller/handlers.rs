//! Pluggable phase handlers and session-list observers
//!
//! Both are injected when a controller is constructed. Every method must
//! return promptly: they run on the controller's event loop.

use crate::types::SessionDescriptor;
use std::fmt;
use tracing::{debug, info};

/// Callbacks invoked at the controller's phase boundaries
pub trait PhaseHandlers: Send + Sync {
    /// The local participant entered a session
    fn on_session_joined(&self, _session: &str) {}

    /// The start broadcast was received and the controller entered `InGame`
    fn on_game_start(&self, _session: Option<&str>) {}

    /// An event relayed by a session participant
    fn on_event(&self, _sender_id: &str, _event_code: i32) {}

    /// A peer left the current session
    fn on_peer_left(&self, _player_id: &str) {}
}

/// Handlers that only log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPhaseHandlers;

impl PhaseHandlers for LoggingPhaseHandlers {
    fn on_session_joined(&self, session: &str) {
        info!("Joined session '{}'", session);
    }

    fn on_game_start(&self, session: Option<&str>) {
        info!("Game started in session '{}'", session.unwrap_or("?"));
    }

    fn on_event(&self, sender_id: &str, event_code: i32) {
        info!("Game event from {}: {}", sender_id, event_code);
    }

    fn on_peer_left(&self, player_id: &str) {
        info!("Peer {} left the session", player_id);
    }
}

/// Notified on every session-list update
pub trait SessionListObserver: Send + Sync {
    fn on_session_list(&self, sessions: &[SessionDescriptor]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionListObserver for NoopObserver {
    fn on_session_list(&self, _sessions: &[SessionDescriptor]) {}
}

/// Display row for one listed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListing {
    pub name: String,
    pub locked: bool,
    pub host: String,
    pub player_count: usize,
    pub max_players: usize,
}

impl From<&SessionDescriptor> for SessionListing {
    fn from(session: &SessionDescriptor) -> Self {
        Self {
            name: session.name.clone(),
            locked: session.is_keyword_gated(),
            host: session.host_name().unwrap_or_default(),
            player_count: session.player_count,
            max_players: session.max_players,
        }
    }
}

impl fmt::Display for SessionListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locked {
            write!(f, "[locked] ")?;
        }
        write!(
            f,
            "{} ({}) {}/{}",
            self.name, self.host, self.player_count, self.max_players
        )
    }
}

/// Tooling observer that renders the listing to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct ListingLogObserver;

impl SessionListObserver for ListingLogObserver {
    fn on_session_list(&self, sessions: &[SessionDescriptor]) {
        debug!("Session list updated: {} session(s)", sessions.len());
        for session in sessions {
            debug!("  {}", SessionListing::from(session));
        }
    }
}
