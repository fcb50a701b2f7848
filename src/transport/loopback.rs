//! In-process session provider
//!
//! `LoopbackBackend` keeps lobby membership, sessions and properties in memory
//! and delivers notifications to every connected client over unbounded channels.
//! It backs the simulation binary and the end-to-end tests.

use crate::error::{MatchmakingError, Result};
use crate::transport::{
    CreateSessionRequest, PlayerSnapshot, SessionSnapshot, SessionTransport, TransportEvent,
    TransportOperation,
};
use crate::types::{
    GameState, PlayerId, PropertyMap, RemoteCall, RemoteTarget, SessionDescriptor, SessionName,
    keys,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct ClientEntry {
    nickname: String,
    connected: bool,
    in_lobby: bool,
    session: Option<SessionName>,
    properties: PropertyMap,
    events: mpsc::UnboundedSender<TransportEvent>,
}

struct SessionEntry {
    visible: bool,
    max_players: usize,
    properties: PropertyMap,
    lobby_keys: Vec<String>,
    players: Vec<PlayerId>,
}

impl SessionEntry {
    fn descriptor(&self, name: &str) -> SessionDescriptor {
        let properties = self
            .properties
            .iter()
            .filter(|(key, _)| self.lobby_keys.iter().any(|k| k == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        SessionDescriptor {
            name: name.to_string(),
            player_count: self.players.len(),
            max_players: self.max_players,
            properties,
        }
    }

    fn is_locked(&self) -> bool {
        self.properties
            .get(keys::GAME_STATE)
            .and_then(|v| v.as_int())
            .and_then(GameState::from_code)
            == Some(GameState::Started)
    }
}

#[derive(Default)]
struct BackendState {
    clients: HashMap<PlayerId, ClientEntry>,
    sessions: BTreeMap<SessionName, SessionEntry>,
}

impl BackendState {
    fn send(&self, player_id: &str, event: TransportEvent) {
        if let Some(client) = self.clients.get(player_id) {
            if client.events.send(event).is_err() {
                debug!("Dropping event for '{}': receiver closed", player_id);
            }
        }
    }

    fn session_list(&self) -> Vec<SessionDescriptor> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.visible)
            .map(|(name, session)| session.descriptor(name))
            .collect()
    }

    /// Push the current session list to every client sitting in the lobby
    fn broadcast_session_list(&self) {
        let list = self.session_list();
        for (id, client) in &self.clients {
            if client.connected && client.in_lobby && client.session.is_none() {
                self.send(id, TransportEvent::SessionListUpdated(list.clone()));
            }
        }
    }

    fn client_mut(&mut self, player_id: &str) -> Result<&mut ClientEntry> {
        self.clients
            .get_mut(player_id)
            .ok_or_else(|| {
                MatchmakingError::InternalError {
                    message: format!("Unknown loopback client '{}'", player_id),
                }
                .into()
            })
    }

    fn require_connected(&mut self, player_id: &str, operation: &str) -> Result<&mut ClientEntry> {
        let client = self.client_mut(player_id)?;
        if !client.connected {
            return Err(MatchmakingError::TransportFailed {
                operation: operation.to_string(),
                message: "not connected".to_string(),
            }
            .into());
        }
        Ok(client)
    }

    /// Drop a client entirely, leaving its session first
    fn detach(&mut self, player_id: &str) -> bool {
        let left_session = self.remove_from_session(player_id).is_some();
        let removed = self.clients.remove(player_id).is_some();
        if left_session {
            self.broadcast_session_list();
        }
        removed
    }

    /// Detach every client whose notification receiver was dropped
    fn prune_closed(&mut self) -> usize {
        let closed: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.events.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &closed {
            debug!("Pruning loopback client {} (receiver closed)", id);
            self.detach(id);
        }
        closed.len()
    }

    /// Remove a player from its session, notifying the remaining members
    fn remove_from_session(&mut self, player_id: &str) -> Option<SessionName> {
        let name = self.clients.get_mut(player_id)?.session.take()?;

        let mut remaining = Vec::new();
        let mut now_empty = false;
        if let Some(session) = self.sessions.get_mut(&name) {
            session.players.retain(|p| p != player_id);
            remaining = session.players.clone();
            now_empty = session.players.is_empty();
        }

        for peer in &remaining {
            self.send(peer, TransportEvent::PeerLeft(player_id.to_string()));
        }

        if now_empty {
            self.sessions.remove(&name);
            info!("Session '{}' closed (no players left)", name);
        }

        Some(name)
    }
}

/// Shared in-memory backend
#[derive(Clone, Default)]
pub struct LoopbackBackend {
    state: Arc<Mutex<BackendState>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and return its transport plus notification stream
    pub fn connect_client(
        &self,
    ) -> Result<(LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>)> {
        let id = format!("player-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.lock()?;
        state.prune_closed();
        state.clients.insert(
            id.clone(),
            ClientEntry {
                nickname: String::new(),
                connected: false,
                in_lobby: false,
                session: None,
                properties: PropertyMap::new(),
                events: tx,
            },
        );

        drop(state);

        debug!("Registered loopback client {}", id);
        Ok((
            LoopbackTransport {
                player_id: id,
                backend: self.clone(),
            },
            rx,
        ))
    }

    /// Session list as a lobby member would see it
    pub fn session_list(&self) -> Result<Vec<SessionDescriptor>> {
        Ok(self.lock()?.session_list())
    }

    /// Full (not lobby-filtered) properties of a session
    pub fn session_properties(&self, name: &str) -> Result<Option<PropertyMap>> {
        Ok(self
            .lock()?
            .sessions
            .get(name)
            .map(|session| session.properties.clone()))
    }

    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock()?.sessions.len())
    }

    pub fn client_count(&self) -> Result<usize> {
        Ok(self.lock()?.clients.len())
    }

    /// Forget a client, removing it from its session. Returns whether it was registered.
    pub fn detach_client(&self, player_id: &str) -> Result<bool> {
        let detached = self.lock()?.detach(player_id);
        if detached {
            debug!("Detached loopback client {}", player_id);
        }
        Ok(detached)
    }

    /// Detach clients whose notification receivers were dropped
    pub fn prune_closed_clients(&self) -> Result<usize> {
        Ok(self.lock()?.prune_closed())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BackendState>> {
        self.state.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire loopback backend lock".to_string(),
            }
            .into()
        })
    }
}

/// Per-participant handle onto a [`LoopbackBackend`]
#[derive(Clone)]
pub struct LoopbackTransport {
    player_id: PlayerId,
    backend: LoopbackBackend,
}

impl LoopbackTransport {
    pub fn player_id(&self) -> &str {
        &self.player_id
    }
}

#[async_trait]
impl SessionTransport for LoopbackTransport {
    async fn connect(&self, nickname: &str) -> Result<()> {
        let mut state = self.backend.lock()?;
        let client = state.client_mut(&self.player_id)?;
        client.nickname = nickname.to_string();
        client.connected = true;

        info!("Loopback client {} connected as '{}'", self.player_id, nickname);
        state.send(&self.player_id, TransportEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.backend.lock()?;
        let left_session = state.remove_from_session(&self.player_id).is_some();

        let client = state.client_mut(&self.player_id)?;
        client.connected = false;
        client.in_lobby = false;

        state.send(
            &self.player_id,
            TransportEvent::Disconnected {
                reason: "client disconnect".to_string(),
            },
        );
        if left_session {
            state.broadcast_session_list();
        }
        Ok(())
    }

    async fn join_lobby(&self) -> Result<()> {
        let mut state = self.backend.lock()?;
        state.require_connected(&self.player_id, "join_lobby")?.in_lobby = true;

        let list = state.session_list();
        state.send(&self.player_id, TransportEvent::JoinedLobby);
        state.send(&self.player_id, TransportEvent::SessionListUpdated(list));
        Ok(())
    }

    async fn leave_session(&self) -> Result<()> {
        let mut state = self.backend.lock()?;
        state.require_connected(&self.player_id, "leave_session")?;

        let Some(name) = state.remove_from_session(&self.player_id) else {
            return Err(MatchmakingError::NotInSession.into());
        };
        debug!("{} left session '{}'", self.player_id, name);

        state.client_mut(&self.player_id)?.in_lobby = true;
        state.send(&self.player_id, TransportEvent::LeftSession);
        state.broadcast_session_list();
        Ok(())
    }

    async fn create_session(&self, request: CreateSessionRequest) -> Result<()> {
        let mut state = self.backend.lock()?;
        if state
            .require_connected(&self.player_id, "create_session")?
            .session
            .is_some()
        {
            return Err(MatchmakingError::TransportFailed {
                operation: "create_session".to_string(),
                message: "already in a session".to_string(),
            }
            .into());
        }

        if state.sessions.contains_key(&request.name) {
            warn!("Session name '{}' already taken", request.name);
            state.send(
                &self.player_id,
                TransportEvent::RequestFailed {
                    operation: TransportOperation::CreateSession,
                    reason: format!("session '{}' already exists", request.name),
                },
            );
            return Ok(());
        }

        state.sessions.insert(
            request.name.clone(),
            SessionEntry {
                visible: request.visible,
                max_players: request.max_players,
                properties: request.properties,
                lobby_keys: request.properties_visible_in_lobby,
                players: vec![self.player_id.clone()],
            },
        );

        let client = state.client_mut(&self.player_id)?;
        client.session = Some(request.name.clone());
        client.in_lobby = false;

        info!(
            "Session '{}' created by {} (max {} players)",
            request.name, self.player_id, request.max_players
        );
        state.send(&self.player_id, TransportEvent::JoinedSession);
        state.broadcast_session_list();
        Ok(())
    }

    async fn join_session(&self, name: &str) -> Result<bool> {
        let mut state = self.backend.lock()?;
        if state
            .require_connected(&self.player_id, "join_session")?
            .session
            .is_some()
        {
            return Ok(false);
        }

        let peers = match state.sessions.get_mut(name) {
            None => {
                debug!("Join rejected: session '{}' does not exist", name);
                return Ok(false);
            }
            Some(session) if session.players.len() >= session.max_players => {
                debug!("Join rejected: session '{}' is full", name);
                return Ok(false);
            }
            Some(session) if session.is_locked() => {
                debug!("Join rejected: session '{}' already started", name);
                return Ok(false);
            }
            Some(session) => {
                let peers = session.players.clone();
                session.players.push(self.player_id.clone());
                peers
            }
        };

        let client = state.client_mut(&self.player_id)?;
        client.session = Some(name.to_string());
        client.in_lobby = false;

        for peer in &peers {
            state.send(peer, TransportEvent::PeerJoined(self.player_id.clone()));
        }
        state.send(&self.player_id, TransportEvent::JoinedSession);
        state.broadcast_session_list();
        Ok(true)
    }

    async fn set_local_player_properties(&self, properties: PropertyMap) -> Result<()> {
        let mut state = self.backend.lock()?;
        state
            .require_connected(&self.player_id, "set_local_player_properties")?
            .properties
            .extend(properties);
        Ok(())
    }

    async fn set_session_properties(
        &self,
        properties: PropertyMap,
        expected: Option<PropertyMap>,
    ) -> Result<bool> {
        let mut state = self.backend.lock()?;
        let name = state
            .require_connected(&self.player_id, "set_session_properties")?
            .session
            .clone()
            .ok_or(MatchmakingError::NotInSession)?;

        let session = state
            .sessions
            .get_mut(&name)
            .ok_or_else(|| MatchmakingError::SessionNotFound { name: name.clone() })?;

        if let Some(expected) = expected {
            let matches = expected
                .iter()
                .all(|(key, value)| session.properties.get(key) == Some(value));
            if !matches {
                debug!("Conditional write on '{}' rejected", name);
                return Ok(false);
            }
        }

        session.properties.extend(properties);
        state.broadcast_session_list();
        Ok(true)
    }

    async fn send_remote_call(&self, target: RemoteTarget, call: RemoteCall) -> Result<()> {
        let mut state = self.backend.lock()?;
        let name = state
            .require_connected(&self.player_id, "send_remote_call")?
            .session
            .clone()
            .ok_or(MatchmakingError::NotInSession)?;

        let members = state
            .sessions
            .get(&name)
            .map(|session| session.players.clone())
            .unwrap_or_default();

        let recipients: Vec<PlayerId> = match target {
            RemoteTarget::All => members,
            RemoteTarget::Player(id) => members.into_iter().filter(|p| *p == id).collect(),
        };

        debug!(
            "{} sending {} to {} participant(s) of '{}'",
            self.player_id,
            call.method_name(),
            recipients.len(),
            name
        );
        for recipient in &recipients {
            state.send(recipient, TransportEvent::RemoteCallReceived(call.clone()));
        }
        Ok(())
    }

    fn current_session(&self) -> Option<SessionSnapshot> {
        let state = self.backend.lock().ok()?;
        let name = state.clients.get(&self.player_id)?.session.clone()?;
        let session = state.sessions.get(&name)?;

        let players = session
            .players
            .iter()
            .map(|id| PlayerSnapshot {
                id: id.clone(),
                properties: state
                    .clients
                    .get(id)
                    .map(|c| c.properties.clone())
                    .unwrap_or_default(),
            })
            .collect();

        Some(SessionSnapshot {
            name,
            max_players: session.max_players,
            properties: session.properties.clone(),
            players,
        })
    }

    fn local_player_id(&self) -> Option<PlayerId> {
        let state = self.backend.lock().ok()?;
        state
            .clients
            .get(&self.player_id)
            .filter(|c| c.connected)
            .map(|_| self.player_id.clone())
    }

    fn synchronized_time(&self) -> DateTime<Utc> {
        current_timestamp()
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nickname = self
            .backend
            .lock()
            .ok()
            .and_then(|s| s.clients.get(&self.player_id).map(|c| c.nickname.clone()))
            .unwrap_or_default();
        f.debug_struct("LoopbackTransport")
            .field("player_id", &self.player_id)
            .field("nickname", &nickname)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;

    fn create_request(name: &str, max_players: usize) -> CreateSessionRequest {
        let mut properties = PropertyMap::new();
        properties.insert(keys::GAME_STATE.to_string(), PropertyValue::Int(0));
        properties.insert(keys::KEYWORD.to_string(), PropertyValue::from(""));
        properties.insert(keys::NAME.to_string(), PropertyValue::from("host"));
        CreateSessionRequest {
            name: name.to_string(),
            visible: true,
            max_players,
            properties,
            properties_visible_in_lobby: vec![
                keys::GAME_STATE.to_string(),
                keys::KEYWORD.to_string(),
            ],
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_lobby_join_pushes_session_list() {
        let backend = LoopbackBackend::new();
        let (client, mut rx) = backend.connect_client().unwrap();

        client.connect("alice").await.unwrap();
        client.join_lobby().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events[0], TransportEvent::Connected);
        assert_eq!(events[1], TransportEvent::JoinedLobby);
        assert_eq!(events[2], TransportEvent::SessionListUpdated(vec![]));
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let backend = LoopbackBackend::new();
        let (client, _rx) = backend.connect_client().unwrap();

        assert!(client.join_lobby().await.is_err());
        assert!(client.local_player_id().is_none());
    }

    #[tokio::test]
    async fn test_listing_hides_private_properties() {
        let backend = LoopbackBackend::new();
        let (host, _rx) = backend.connect_client().unwrap();
        host.connect("host").await.unwrap();
        host.create_session(create_request("room", 2)).await.unwrap();

        let list = backend.session_list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].player_count, 1);
        assert!(list[0].property(keys::NAME).is_none());
        assert!(list[0].property(keys::GAME_STATE).is_some());
    }

    #[tokio::test]
    async fn test_join_rejects_full_and_missing_sessions() {
        let backend = LoopbackBackend::new();
        let (host, _h) = backend.connect_client().unwrap();
        let (guest, _g) = backend.connect_client().unwrap();
        let (late, _l) = backend.connect_client().unwrap();
        for (client, name) in [(&host, "host"), (&guest, "guest"), (&late, "late")] {
            client.connect(name).await.unwrap();
        }

        host.create_session(create_request("room", 2)).await.unwrap();
        assert!(!guest.join_session("nowhere").await.unwrap());
        assert!(guest.join_session("room").await.unwrap());
        assert!(!late.join_session("room").await.unwrap());
    }

    #[tokio::test]
    async fn test_conditional_write_applies_once() {
        let backend = LoopbackBackend::new();
        let (host, _rx) = backend.connect_client().unwrap();
        host.connect("host").await.unwrap();
        host.create_session(create_request("room", 2)).await.unwrap();

        let mut update = PropertyMap::new();
        update.insert(keys::GAME_STATE.to_string(), PropertyValue::Int(1));
        let mut expected = PropertyMap::new();
        expected.insert(keys::GAME_STATE.to_string(), PropertyValue::Int(0));

        assert!(host
            .set_session_properties(update.clone(), Some(expected.clone()))
            .await
            .unwrap());
        assert!(!host
            .set_session_properties(update, Some(expected))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_leave_notifies_peers_and_closes_empty_session() {
        let backend = LoopbackBackend::new();
        let (host, mut host_rx) = backend.connect_client().unwrap();
        let (guest, mut guest_rx) = backend.connect_client().unwrap();
        host.connect("host").await.unwrap();
        guest.connect("guest").await.unwrap();

        host.create_session(create_request("room", 2)).await.unwrap();
        guest.join_session("room").await.unwrap();
        drain(&mut host_rx);
        drain(&mut guest_rx);

        guest.leave_session().await.unwrap();
        assert!(drain(&mut host_rx).contains(&TransportEvent::PeerLeft(guest.player_id().to_string())));
        assert!(drain(&mut guest_rx).contains(&TransportEvent::LeftSession));

        host.leave_session().await.unwrap();
        assert_eq!(backend.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_detached_clients_are_removed() {
        let backend = LoopbackBackend::new();
        let (host, mut host_rx) = backend.connect_client().unwrap();
        let (guest, guest_rx) = backend.connect_client().unwrap();
        host.connect("host").await.unwrap();
        guest.connect("guest").await.unwrap();
        host.create_session(create_request("room", 2)).await.unwrap();
        guest.join_session("room").await.unwrap();
        drain(&mut host_rx);
        assert_eq!(backend.client_count().unwrap(), 2);

        drop(guest_rx);
        assert_eq!(backend.prune_closed_clients().unwrap(), 1);
        assert_eq!(backend.client_count().unwrap(), 1);
        assert!(drain(&mut host_rx).contains(&TransportEvent::PeerLeft(guest.player_id().to_string())));
        assert!(guest.join_lobby().await.is_err());

        assert!(backend.detach_client(host.player_id()).unwrap());
        assert!(!backend.detach_client(host.player_id()).unwrap());
        assert_eq!(backend.client_count().unwrap(), 0);
        assert_eq!(backend.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_registration_prunes_abandoned_clients() {
        let backend = LoopbackBackend::new();
        for _ in 0..5 {
            let (_client, rx) = backend.connect_client().unwrap();
            drop(rx);
        }
        let (_client, _rx) = backend.connect_client().unwrap();
        assert_eq!(backend.client_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_call_loops_back_to_sender() {
        let backend = LoopbackBackend::new();
        let (host, mut rx) = backend.connect_client().unwrap();
        host.connect("host").await.unwrap();
        host.create_session(create_request("room", 2)).await.unwrap();
        drain(&mut rx);

        host.send_remote_call(RemoteTarget::All, RemoteCall::GameStart)
            .await
            .unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![TransportEvent::RemoteCallReceived(RemoteCall::GameStart)]
        );
    }
}
