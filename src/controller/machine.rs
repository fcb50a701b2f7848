//! Matchmaking controller state machine
//!
//! This module provides the `MatchmakingController` that drives a participant
//! from connect through lobby, session selection and start-gating into a game.
//! Every input (tick, provider notification, command) is processed by
//! [`MatchmakingController::handle`], which must only ever be called from a
//! single task.

use crate::controller::handlers::{LoggingPhaseHandlers, NoopObserver, PhaseHandlers, SessionListObserver};
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::selector::{choose_candidate, CandidateSelector, KeywordRankSelector};
use crate::sync::{
    capacity_reached, lobby_player_properties, lobby_visible_keys, open_expectation,
    session_creation_properties, start_properties, ParticipantRoster, StartGate,
};
use crate::transport::{CreateSessionRequest, SessionTransport, TransportEvent, TransportOperation};
use crate::types::{
    ControllerState, LocalProfile, MatchingPolicy, PlayerId, RemoteCall, RemoteTarget,
    SessionDescriptor, SessionName,
};
use crate::utils::{generate_player_guid, generate_session_name};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    pub policy: MatchingPolicy,
    /// Connect as soon as the event loop starts
    pub auto_connect: bool,
    /// Run the selection protocol on every lobby tick
    pub auto_join: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            policy: MatchingPolicy::default(),
            auto_connect: true,
            auto_join: true,
        }
    }
}

/// Explicit requests from the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    Connect,
    Disconnect,
    /// Join a specific listed session
    JoinSession(SessionName),
    CreateSession,
    /// Run the selection protocol once
    QuickMatch,
    LeaveSession,
    /// Relay a game event to every participant of the session
    SendEvent(i32),
    SetKeyword(String),
    SetRankMatching(bool),
    UpdateProfile(LocalProfile),
}

/// Discrete inputs consumed by the controller
#[derive(Debug, Clone)]
pub enum ControllerInput {
    Tick,
    Transport(TransportEvent),
    Command(ControllerCommand),
}

/// Snapshot published after every processed input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub nickname: String,
    pub state: ControllerState,
    pub session: Option<SessionName>,
    pub roster: ParticipantRoster,
    pub policy: MatchingPolicy,
    pub open_sessions: Option<usize>,
}

impl ControllerStatus {
    pub fn is_game_now(&self) -> bool {
        self.state == ControllerState::InGame
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingRequest {
    Connect,
    JoinLobby,
    JoinSession(SessionName),
    CreateSession(SessionName),
}

/// The matchmaking controller for one local participant
pub struct MatchmakingController {
    profile: LocalProfile,
    settings: ControllerSettings,
    state: ControllerState,
    transport: Arc<dyn SessionTransport>,
    selector: Arc<dyn CandidateSelector>,
    handlers: Arc<dyn PhaseHandlers>,
    observer: Arc<dyn SessionListObserver>,
    metrics: Arc<MetricsCollector>,
    session_list: Option<Vec<SessionDescriptor>>,
    roster: ParticipantRoster,
    current_session: Option<SessionName>,
    player_guid: Option<String>,
    pending: Option<PendingRequest>,
    start_gate: StartGate,
    start_broadcast_pending: bool,
    /// A requested connect was rejected and is re-issued on the next tick
    connect_retry: bool,
    rng: StdRng,
}

impl MatchmakingController {
    /// Create a controller with the default selector, logging handlers and no observer
    pub fn new(
        profile: LocalProfile,
        settings: ControllerSettings,
        transport: Arc<dyn SessionTransport>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            profile,
            settings,
            state: ControllerState::Init,
            transport,
            selector: Arc::new(KeywordRankSelector::new()),
            handlers: Arc::new(LoggingPhaseHandlers),
            observer: Arc::new(NoopObserver),
            metrics,
            session_list: None,
            roster: ParticipantRoster::default(),
            current_session: None,
            player_guid: None,
            pending: None,
            start_gate: StartGate::default(),
            start_broadcast_pending: false,
            connect_retry: false,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<dyn PhaseHandlers>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionListObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Make candidate choice reproducible
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.settings.policy
    }

    pub fn profile(&self) -> &LocalProfile {
        &self.profile
    }

    pub fn roster(&self) -> &ParticipantRoster {
        &self.roster
    }

    pub fn player_guid(&self) -> Option<&str> {
        self.player_guid.as_deref()
    }

    pub fn is_game_now(&self) -> bool {
        self.state == ControllerState::InGame
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            nickname: self.profile.name.clone(),
            state: self.state,
            session: self.current_session.clone(),
            roster: self.roster.clone(),
            policy: self.settings.policy.clone(),
            open_sessions: self.session_list.as_ref().map(Vec::len),
        }
    }

    /// Process one input to completion
    pub async fn handle(&mut self, input: ControllerInput) -> Result<()> {
        match input {
            ControllerInput::Tick => self.on_tick().await,
            ControllerInput::Transport(event) => self.on_transport_event(event).await,
            ControllerInput::Command(command) => self.on_command(command).await,
        }
    }

    fn transition(&mut self, next: ControllerState) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            error!(
                "[{}] Rejected illegal transition {} -> {}",
                self.profile.name, from, next
            );
            return Err(MatchmakingError::InvalidTransition { from, to: next }.into());
        }

        if from == next {
            debug!("[{}] Re-entering {}", self.profile.name, next);
        } else {
            info!("[{}] State {} -> {}", self.profile.name, from, next);
        }
        self.metrics.record_transition(from, next);
        self.state = next;
        Ok(())
    }

    async fn on_tick(&mut self) -> Result<()> {
        if self.connect_retry {
            if let Err(e) = self.issue_connect().await {
                debug!("[{}] Connect retry pending: {}", self.profile.name, e);
            }
            return Ok(());
        }

        match self.state {
            ControllerState::Connected => self.request_lobby().await,
            ControllerState::InLobby => {
                if !self.ensure_profile_published().await {
                    return Ok(());
                }
                if self.settings.auto_join && self.session_list.is_some() {
                    self.run_selection().await?;
                }
                Ok(())
            }
            ControllerState::Ready => {
                if self.start_broadcast_pending {
                    self.broadcast_start().await;
                    Ok(())
                } else {
                    self.evaluate_capacity().await
                }
            }
            _ => Ok(()),
        }
    }

    async fn request_lobby(&mut self) -> Result<()> {
        info!("[{}] Joining lobby", self.profile.name);
        match self.transport.join_lobby().await {
            Ok(()) => {
                self.pending = Some(PendingRequest::JoinLobby);
                self.transition(ControllerState::Waiting)
            }
            Err(e) => {
                warn!("[{}] join_lobby failed, will retry: {}", self.profile.name, e);
                self.metrics.record_request_failure(TransportOperation::JoinLobby);
                Ok(())
            }
        }
    }

    /// Selection protocol: join a random candidate or create a session.
    /// Returns whether a request was issued.
    async fn run_selection(&mut self) -> Result<bool> {
        let listed = self.session_list.clone().unwrap_or_default();
        let candidates =
            self.selector
                .select(&listed, &self.settings.policy, self.profile.skill_tier);
        self.metrics.record_selection(listed.len(), candidates.len());

        info!(
            "[{}] Selection: {} listed, {} candidate(s) (keyword: '{}', rank matching: {}, tier: {})",
            self.profile.name,
            listed.len(),
            candidates.len(),
            self.settings.policy.shared_keyword,
            self.settings.policy.rank_matching_enabled,
            self.profile.skill_tier
        );

        let choice = choose_candidate(&candidates, &mut self.rng).map(|s| s.name.clone());
        match choice {
            Some(name) => self.request_join(&name).await,
            None => self.request_create().await,
        }
    }

    async fn request_join(&mut self, name: &str) -> Result<bool> {
        info!("[{}] Requesting to join session '{}'", self.profile.name, name);
        match self.transport.join_session(name).await {
            Ok(true) => {
                self.pending = Some(PendingRequest::JoinSession(name.to_string()));
                self.transition(ControllerState::Waiting)?;
                Ok(true)
            }
            Ok(false) => {
                warn!(
                    "[{}] Session '{}' is full, locked or gone",
                    self.profile.name, name
                );
                self.metrics.record_request_failure(TransportOperation::JoinSession);
                Ok(false)
            }
            Err(e) => {
                warn!("[{}] join_session '{}' failed: {}", self.profile.name, name, e);
                self.metrics.record_request_failure(TransportOperation::JoinSession);
                Ok(false)
            }
        }
    }

    async fn request_create(&mut self) -> Result<bool> {
        let name = generate_session_name();
        let policy = &self.settings.policy;
        let request = CreateSessionRequest {
            name: name.clone(),
            visible: true,
            max_players: policy.max_players_per_session,
            properties: session_creation_properties(&self.profile, &policy.shared_keyword),
            properties_visible_in_lobby: lobby_visible_keys(),
        };

        info!(
            "[{}] No candidate session, creating '{}' (max {} players)",
            self.profile.name, name, request.max_players
        );
        match self.transport.create_session(request).await {
            Ok(()) => {
                self.pending = Some(PendingRequest::CreateSession(name));
                self.transition(ControllerState::Waiting)?;
                Ok(true)
            }
            Err(e) => {
                warn!("[{}] create_session failed: {}", self.profile.name, e);
                self.metrics.record_request_failure(TransportOperation::CreateSession);
                Ok(false)
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::JoinedLobby => self.on_joined_lobby().await,
            TransportEvent::SessionListUpdated(sessions) => {
                self.on_session_list(sessions);
                Ok(())
            }
            TransportEvent::JoinedSession => self.on_joined_session().await,
            TransportEvent::LeftSession => self.on_left_session(),
            TransportEvent::PeerJoined(player_id) => self.on_peer_joined(&player_id).await,
            TransportEvent::PeerLeft(player_id) => {
                self.on_peer_left(&player_id);
                Ok(())
            }
            TransportEvent::RemoteCallReceived(call) => self.on_remote_call(call),
            TransportEvent::RequestFailed { operation, reason } => {
                self.on_request_failed(operation, &reason)
            }
            TransportEvent::Disconnected { reason } => self.on_disconnected(&reason),
        }
    }

    fn on_connected(&mut self) -> Result<()> {
        if self.state != ControllerState::Waiting {
            warn!(
                "[{}] Ignoring connected notification in state {}",
                self.profile.name, self.state
            );
            return Ok(());
        }
        self.pending = None;
        self.connect_retry = false;
        self.transition(ControllerState::Connected)
    }

    async fn on_joined_lobby(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Waiting | ControllerState::InLobby) {
            warn!(
                "[{}] Ignoring joined-lobby notification in state {}",
                self.profile.name, self.state
            );
            return Ok(());
        }

        self.player_guid = None;
        self.publish_profile(generate_player_guid()).await;
        self.pending = None;
        self.transition(ControllerState::InLobby)
    }

    /// Write the profile and `guid` into the local player's properties.
    /// The GUID is only recorded once the write succeeded; until then the
    /// lobby tick re-publishes before selecting.
    async fn publish_profile(&mut self, guid: String) -> bool {
        let properties = lobby_player_properties(&self.profile, &guid);
        match self.transport.set_local_player_properties(properties).await {
            Ok(()) => {
                debug!("[{}] Published profile as {}", self.profile.name, guid);
                self.player_guid = Some(guid);
                true
            }
            Err(e) => {
                warn!(
                    "[{}] Failed to publish player properties, will retry: {}",
                    self.profile.name, e
                );
                self.metrics
                    .record_request_failure(TransportOperation::SetPlayerProperties);
                self.player_guid = None;
                false
            }
        }
    }

    async fn ensure_profile_published(&mut self) -> bool {
        if self.player_guid.is_some() {
            return true;
        }
        self.publish_profile(generate_player_guid()).await
    }

    fn require_profile_published(&self) -> Result<()> {
        if self.player_guid.is_none() {
            return Err(MatchmakingError::TransportFailed {
                operation: TransportOperation::SetPlayerProperties.to_string(),
                message: "player properties not yet published".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn on_session_list(&mut self, sessions: Vec<SessionDescriptor>) {
        debug!(
            "[{}] Session list updated ({} sessions)",
            self.profile.name,
            sessions.len()
        );
        self.metrics.record_session_list(sessions.len());
        self.observer.on_session_list(&sessions);
        self.session_list = Some(sessions);
    }

    async fn on_joined_session(&mut self) -> Result<()> {
        if self.state != ControllerState::Waiting {
            warn!(
                "[{}] Ignoring joined-session notification in state {}",
                self.profile.name, self.state
            );
            return Ok(());
        }

        let requested = match self.pending.take() {
            Some(PendingRequest::CreateSession(name)) => {
                self.metrics.record_session_created();
                Some(name)
            }
            Some(PendingRequest::JoinSession(name)) => {
                self.metrics.record_session_joined();
                Some(name)
            }
            _ => None,
        };

        let session = self
            .transport
            .current_session()
            .map(|snapshot| snapshot.name)
            .or(requested);
        self.current_session = session.clone();
        self.start_gate.reset();
        self.start_broadcast_pending = false;
        self.transition(ControllerState::Ready)?;

        if let Some(name) = &session {
            self.handlers.on_session_joined(name);
        }
        self.refresh_roster();
        self.evaluate_capacity().await
    }

    fn on_left_session(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            ControllerState::Ready | ControllerState::InGame | ControllerState::InLobby
        ) {
            warn!(
                "[{}] Ignoring left-session notification in state {}",
                self.profile.name, self.state
            );
            return Ok(());
        }

        self.current_session = None;
        self.roster.clear();
        self.start_gate.reset();
        self.start_broadcast_pending = false;
        // Wait for a fresh listing before selecting again
        self.session_list = None;
        self.transition(ControllerState::InLobby)
    }

    async fn on_peer_joined(&mut self, player_id: &str) -> Result<()> {
        if !self.state.in_session() {
            return Ok(());
        }
        debug!("[{}] Peer {} joined", self.profile.name, player_id);
        self.refresh_roster();
        self.evaluate_capacity().await
    }

    fn on_peer_left(&mut self, player_id: &str) {
        if !self.state.in_session() {
            return;
        }
        self.refresh_roster();
        self.handlers.on_peer_left(player_id);
    }

    fn on_remote_call(&mut self, call: RemoteCall) -> Result<()> {
        self.metrics.record_remote_call(&call);
        match call {
            RemoteCall::GameStart => self.on_game_start(),
            RemoteCall::EventRelay {
                sender_id,
                event_code,
            } => {
                if self.state.in_session() {
                    self.handlers.on_event(&sender_id, event_code);
                } else {
                    debug!(
                        "[{}] Dropping event {} from {} outside a session",
                        self.profile.name, event_code, sender_id
                    );
                }
                Ok(())
            }
        }
    }

    fn on_game_start(&mut self) -> Result<()> {
        match self.state {
            ControllerState::InGame => {
                debug!("[{}] Duplicate game start ignored", self.profile.name);
                Ok(())
            }
            ControllerState::Ready | ControllerState::Waiting => {
                self.start_gate.settle();
                self.start_broadcast_pending = false;
                self.transition(ControllerState::InGame)?;
                self.handlers.on_game_start(self.current_session.as_deref());
                Ok(())
            }
            state => {
                debug!(
                    "[{}] Game start ignored in state {}",
                    self.profile.name, state
                );
                Ok(())
            }
        }
    }

    fn on_request_failed(&mut self, operation: TransportOperation, reason: &str) -> Result<()> {
        warn!(
            "[{}] Provider rejected {}: {}",
            self.profile.name, operation, reason
        );
        self.metrics.record_request_failure(operation);

        if self.state != ControllerState::Waiting {
            return Ok(());
        }

        match (operation, self.pending.clone()) {
            (TransportOperation::JoinSession, Some(PendingRequest::JoinSession(_)))
            | (TransportOperation::CreateSession, Some(PendingRequest::CreateSession(_))) => {
                self.pending = None;
                self.transition(ControllerState::InLobby)
            }
            (TransportOperation::JoinLobby, Some(PendingRequest::JoinLobby)) => {
                self.pending = None;
                self.transition(ControllerState::Connected)
            }
            (TransportOperation::Connect, Some(PendingRequest::Connect)) => {
                // Stay in Waiting; the next tick re-issues the connect
                self.pending = None;
                self.connect_retry = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_disconnected(&mut self, reason: &str) -> Result<()> {
        if self.state == ControllerState::Disconnected {
            return Ok(());
        }
        warn!("[{}] Disconnected: {}", self.profile.name, reason);

        self.session_list = None;
        self.roster.clear();
        self.current_session = None;
        self.pending = None;
        self.connect_retry = false;
        self.start_gate.reset();
        self.start_broadcast_pending = false;
        self.transition(ControllerState::Disconnected)
    }

    fn refresh_roster(&mut self) {
        match self.transport.current_session() {
            Some(snapshot) => {
                self.roster = ParticipantRoster::rebuild(&snapshot);
                debug!(
                    "[{}] Roster rebuilt: {} of {} player(s) synchronized",
                    self.profile.name,
                    self.roster.len(),
                    snapshot.player_count()
                );
            }
            None => self.roster.clear(),
        }
        self.metrics.record_roster_size(self.roster.len());
    }

    /// Start-gating: first participant to see a full session locks it and
    /// broadcasts the start. The conditional write keyed on an open
    /// `GameState` lets exactly one participant win.
    async fn evaluate_capacity(&mut self) -> Result<()> {
        if self.state != ControllerState::Ready {
            return Ok(());
        }
        let Some(snapshot) = self.transport.current_session() else {
            return Ok(());
        };
        if self.start_gate.is_settled_for(&snapshot.name) {
            return Ok(());
        }

        if !capacity_reached(snapshot.player_count(), &self.settings.policy) {
            debug!(
                "[{}] Waiting for players in '{}': {}/{}",
                self.profile.name,
                snapshot.name,
                snapshot.player_count(),
                self.settings.policy.max_players_per_session
            );
            return Ok(());
        }

        if !self.start_gate.try_claim(&snapshot.name) {
            return Ok(());
        }

        let start_time = self.transport.synchronized_time();
        match self
            .transport
            .set_session_properties(start_properties(start_time), Some(open_expectation()))
            .await
        {
            Ok(true) => {
                info!(
                    "[{}] Session '{}' full, locked at {}",
                    self.profile.name,
                    snapshot.name,
                    start_time.to_rfc3339()
                );
                self.start_gate.settle();
                self.metrics.record_game_started();
                self.start_broadcast_pending = true;
                self.broadcast_start().await;
            }
            Ok(false) => {
                info!(
                    "[{}] Session '{}' already locked by another participant",
                    self.profile.name, snapshot.name
                );
                self.start_gate.settle();
                self.metrics.record_start_conflict();
            }
            Err(e) => {
                warn!(
                    "[{}] Failed to lock session '{}', will retry: {}",
                    self.profile.name, snapshot.name, e
                );
                self.start_gate.release();
            }
        }
        Ok(())
    }

    async fn broadcast_start(&mut self) {
        match self
            .transport
            .send_remote_call(RemoteTarget::All, RemoteCall::GameStart)
            .await
        {
            Ok(()) => self.start_broadcast_pending = false,
            Err(e) => warn!(
                "[{}] Game start broadcast failed, will retry: {}",
                self.profile.name, e
            ),
        }
    }

    async fn on_command(&mut self, command: ControllerCommand) -> Result<()> {
        debug!("[{}] Command {:?}", self.profile.name, command);
        match command {
            ControllerCommand::Connect => self.connect().await,
            ControllerCommand::Disconnect => self.disconnect().await,
            ControllerCommand::JoinSession(name) => {
                self.require_lobby(ControllerState::Waiting)?;
                self.require_profile_published()?;
                if let Some(listed) = self.session_list.as_ref() {
                    match listed.iter().find(|s| s.name == name) {
                        None => return Err(MatchmakingError::SessionNotFound { name }.into()),
                        Some(s) if !s.has_room(self.settings.policy.max_players_per_session) => {
                            return Err(MatchmakingError::SessionFull { name }.into())
                        }
                        Some(_) => {}
                    }
                }
                if self.request_join(&name).await? {
                    Ok(())
                } else {
                    Err(MatchmakingError::TransportFailed {
                        operation: TransportOperation::JoinSession.to_string(),
                        message: format!("session '{}' is full, locked or missing", name),
                    }
                    .into())
                }
            }
            ControllerCommand::CreateSession => {
                self.require_lobby(ControllerState::Waiting)?;
                self.require_profile_published()?;
                if self.request_create().await? {
                    Ok(())
                } else {
                    Err(MatchmakingError::TransportFailed {
                        operation: TransportOperation::CreateSession.to_string(),
                        message: "session creation failed".to_string(),
                    }
                    .into())
                }
            }
            ControllerCommand::QuickMatch => {
                self.require_lobby(ControllerState::Waiting)?;
                self.require_profile_published()?;
                self.run_selection().await.map(|_| ())
            }
            ControllerCommand::LeaveSession => {
                if !self.state.in_session() {
                    return Err(MatchmakingError::NotInSession.into());
                }
                info!("[{}] Leaving session", self.profile.name);
                self.transport.leave_session().await
            }
            ControllerCommand::SendEvent(code) => self.send_event(code).await,
            ControllerCommand::SetKeyword(keyword) => {
                self.require_policy_unlocked()?;
                info!("[{}] Shared keyword set to '{}'", self.profile.name, keyword);
                self.settings.policy.shared_keyword = keyword;
                Ok(())
            }
            ControllerCommand::SetRankMatching(enabled) => {
                self.require_policy_unlocked()?;
                self.settings.policy.rank_matching_enabled = enabled;
                Ok(())
            }
            ControllerCommand::UpdateProfile(profile) => {
                self.require_policy_unlocked()?;
                self.profile = profile;
                if self.state == ControllerState::InLobby {
                    let guid = self.player_guid.clone().unwrap_or_else(generate_player_guid);
                    if !self.publish_profile(guid).await {
                        return Err(MatchmakingError::TransportFailed {
                            operation: TransportOperation::SetPlayerProperties.to_string(),
                            message: "profile update not published".to_string(),
                        }
                        .into());
                    }
                }
                Ok(())
            }
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let retrying = self.connect_retry && self.state == ControllerState::Waiting;
        if !retrying
            && !matches!(
                self.state,
                ControllerState::Init | ControllerState::Disconnected
            )
        {
            return Err(MatchmakingError::InvalidTransition {
                from: self.state,
                to: ControllerState::Waiting,
            }
            .into());
        }

        self.issue_connect().await
    }

    /// Issue the provider connect. A rejection leaves the state unchanged and
    /// marks the connect for retry on the next tick.
    async fn issue_connect(&mut self) -> Result<()> {
        info!("[{}] Connecting", self.profile.name);
        if let Err(e) = self.transport.connect(&self.profile.name).await {
            warn!("[{}] connect failed, will retry: {}", self.profile.name, e);
            self.metrics.record_request_failure(TransportOperation::Connect);
            self.connect_retry = true;
            return Err(e);
        }
        self.connect_retry = false;
        self.pending = Some(PendingRequest::Connect);
        if self.state == ControllerState::Waiting {
            Ok(())
        } else {
            self.transition(ControllerState::Waiting)
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connect_retry = false;
        if matches!(
            self.state,
            ControllerState::Init | ControllerState::Disconnected
        ) {
            return Ok(());
        }
        info!("[{}] Disconnecting", self.profile.name);
        self.transport.disconnect().await
    }

    async fn send_event(&mut self, event_code: i32) -> Result<()> {
        if !self.state.in_session() {
            return Err(MatchmakingError::NotInSession.into());
        }
        let sender_id: PlayerId = self
            .transport
            .local_player_id()
            .ok_or(MatchmakingError::NotInSession)?;
        self.transport
            .send_remote_call(
                RemoteTarget::All,
                RemoteCall::EventRelay {
                    sender_id,
                    event_code,
                },
            )
            .await
    }

    fn require_lobby(&self, target: ControllerState) -> Result<()> {
        if self.state != ControllerState::InLobby {
            return Err(MatchmakingError::InvalidTransition {
                from: self.state,
                to: target,
            }
            .into());
        }
        Ok(())
    }

    fn require_policy_unlocked(&self) -> Result<()> {
        if !self.state.allows_policy_change() {
            return Err(MatchmakingError::PolicyLocked { state: self.state }.into());
        }
        Ok(())
    }
}
