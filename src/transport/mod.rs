//! Session transport provider contract
//!
//! The controller drives matchmaking exclusively through [`SessionTransport`]
//! and reacts to the [`TransportEvent`] notifications the provider pushes back.

pub mod loopback;

pub use loopback::{LoopbackBackend, LoopbackTransport};

use crate::error::Result;
use crate::types::{PlayerId, PropertyMap, RemoteCall, RemoteTarget, SessionDescriptor, SessionName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options for creating a new session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: SessionName,
    pub visible: bool,
    pub max_players: usize,
    pub properties: PropertyMap,
    /// Property keys exposed in lobby listings
    pub properties_visible_in_lobby: Vec<String>,
}

/// Provider operation that can be rejected asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportOperation {
    Connect,
    JoinLobby,
    JoinSession,
    CreateSession,
    SetPlayerProperties,
}

impl std::fmt::Display for TransportOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportOperation::Connect => write!(f, "connect"),
            TransportOperation::JoinLobby => write!(f, "join_lobby"),
            TransportOperation::JoinSession => write!(f, "join_session"),
            TransportOperation::CreateSession => write!(f, "create_session"),
            TransportOperation::SetPlayerProperties => write!(f, "set_player_properties"),
        }
    }
}

/// Notifications delivered by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    JoinedLobby,
    JoinedSession,
    LeftSession,
    SessionListUpdated(Vec<SessionDescriptor>),
    PeerJoined(PlayerId),
    PeerLeft(PlayerId),
    RemoteCallReceived(RemoteCall),
    RequestFailed {
        operation: TransportOperation,
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// A participant of the current session with its player properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub properties: PropertyMap,
}

/// Full view of the session the local participant is in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub name: SessionName,
    pub max_players: usize,
    pub properties: PropertyMap,
    pub players: Vec<PlayerSnapshot>,
}

impl SessionSnapshot {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Capabilities the controller consumes from the networking/session provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Connect to the backend under the given nickname
    async fn connect(&self, nickname: &str) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn join_lobby(&self) -> Result<()>;

    async fn leave_session(&self) -> Result<()>;

    async fn create_session(&self, request: CreateSessionRequest) -> Result<()>;

    /// `Ok(false)` when the session is already known to be full, locked or missing
    async fn join_session(&self, name: &str) -> Result<bool>;

    async fn set_local_player_properties(&self, properties: PropertyMap) -> Result<()>;

    /// Commit all keys atomically. When `expected` is given the write only
    /// happens if every expected key currently holds the expected value;
    /// returns whether the write was applied.
    async fn set_session_properties(
        &self,
        properties: PropertyMap,
        expected: Option<PropertyMap>,
    ) -> Result<bool>;

    async fn send_remote_call(&self, target: RemoteTarget, call: RemoteCall) -> Result<()>;

    /// Snapshot of the current session, `None` outside a session
    fn current_session(&self) -> Option<SessionSnapshot>;

    fn local_player_id(&self) -> Option<PlayerId>;

    /// Clock shared by all participants of the backend
    fn synchronized_time(&self) -> DateTime<Utc>;
}
