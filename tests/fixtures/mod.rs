//! Test fixtures and recording implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use room_matchmaker::controller::{
    ControllerInput, ControllerSettings, MatchmakingController, PhaseHandlers,
};
use room_matchmaker::error::Result;
use room_matchmaker::metrics::MetricsCollector;
use room_matchmaker::transport::{
    CreateSessionRequest, PlayerSnapshot, SessionSnapshot, SessionTransport, TransportEvent,
};
use room_matchmaker::types::{
    keys, LocalProfile, MatchingPolicy, PlayerId, PropertyMap, PropertyValue, RemoteCall,
    RemoteTarget, SessionDescriptor,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Every provider call the controller made, in order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect(String),
    Disconnect,
    JoinLobby,
    LeaveSession,
    CreateSession(CreateSessionRequest),
    JoinSession(String),
    SetLocalPlayerProperties(PropertyMap),
    SetSessionProperties {
        properties: PropertyMap,
        expected: Option<PropertyMap>,
    },
    SendRemoteCall(RemoteTarget, RemoteCall),
}

/// Scriptable transport that records calls instead of talking to a provider
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    join_accepts: Mutex<bool>,
    create_fails: Mutex<bool>,
    write_outcomes: Mutex<VecDeque<std::result::Result<bool, String>>>,
    session: Mutex<Option<SessionSnapshot>>,
    local_id: PlayerId,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            join_accepts: Mutex::new(true),
            create_fails: Mutex::new(false),
            write_outcomes: Mutex::new(VecDeque::new()),
            session: Mutex::new(None),
            local_id: "local".to_string(),
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn set_join_accepts(&self, accepts: bool) {
        *self.join_accepts.lock().unwrap() = accepts;
    }

    pub fn set_create_fails(&self, fails: bool) {
        *self.create_fails.lock().unwrap() = fails;
    }

    /// Queue the result of the next conditional write; defaults to success
    pub fn push_write_outcome(&self, outcome: std::result::Result<bool, String>) {
        self.write_outcomes.lock().unwrap().push_back(outcome);
    }

    /// Provider view of the session the local participant sits in
    pub fn set_session(&self, snapshot: Option<SessionSnapshot>) {
        *self.session.lock().unwrap() = snapshot;
    }

    pub fn join_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::JoinSession(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn create_requests(&self) -> Vec<CreateSessionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::CreateSession(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn session_writes(&self) -> Vec<(PropertyMap, Option<PropertyMap>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::SetSessionProperties {
                    properties,
                    expected,
                } => Some((properties, expected)),
                _ => None,
            })
            .collect()
    }

    pub fn start_broadcasts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    TransportCall::SendRemoteCall(RemoteTarget::All, RemoteCall::GameStart)
                )
            })
            .count()
    }

    fn record(&self, call: TransportCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SessionTransport for RecordingTransport {
    async fn connect(&self, nickname: &str) -> Result<()> {
        self.record(TransportCall::Connect(nickname.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }

    async fn join_lobby(&self) -> Result<()> {
        self.record(TransportCall::JoinLobby);
        Ok(())
    }

    async fn leave_session(&self) -> Result<()> {
        self.record(TransportCall::LeaveSession);
        Ok(())
    }

    async fn create_session(&self, request: CreateSessionRequest) -> Result<()> {
        self.record(TransportCall::CreateSession(request));
        if *self.create_fails.lock().unwrap() {
            anyhow::bail!("create rejected");
        }
        Ok(())
    }

    async fn join_session(&self, name: &str) -> Result<bool> {
        self.record(TransportCall::JoinSession(name.to_string()));
        Ok(*self.join_accepts.lock().unwrap())
    }

    async fn set_local_player_properties(&self, properties: PropertyMap) -> Result<()> {
        self.record(TransportCall::SetLocalPlayerProperties(properties));
        Ok(())
    }

    async fn set_session_properties(
        &self,
        properties: PropertyMap,
        expected: Option<PropertyMap>,
    ) -> Result<bool> {
        self.record(TransportCall::SetSessionProperties {
            properties,
            expected,
        });
        match self.write_outcomes.lock().unwrap().pop_front() {
            Some(Ok(applied)) => Ok(applied),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(true),
        }
    }

    async fn send_remote_call(&self, target: RemoteTarget, call: RemoteCall) -> Result<()> {
        self.record(TransportCall::SendRemoteCall(target, call));
        Ok(())
    }

    fn current_session(&self) -> Option<SessionSnapshot> {
        self.session.lock().unwrap().clone()
    }

    fn local_player_id(&self) -> Option<PlayerId> {
        Some(self.local_id.clone())
    }

    fn synchronized_time(&self) -> DateTime<Utc> {
        fixed_time()
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
}

/// Phase handler that remembers what it was told
#[derive(Default)]
pub struct RecordingHandlers {
    pub joined: Mutex<Vec<String>>,
    pub game_starts: Mutex<usize>,
    pub events: Mutex<Vec<(String, i32)>>,
    pub peers_left: Mutex<Vec<String>>,
}

impl PhaseHandlers for RecordingHandlers {
    fn on_session_joined(&self, session: &str) {
        self.joined.lock().unwrap().push(session.to_string());
    }

    fn on_game_start(&self, _session: Option<&str>) {
        *self.game_starts.lock().unwrap() += 1;
    }

    fn on_event(&self, sender_id: &str, event_code: i32) {
        self.events
            .lock()
            .unwrap()
            .push((sender_id.to_string(), event_code));
    }

    fn on_peer_left(&self, player_id: &str) {
        self.peers_left.lock().unwrap().push(player_id.to_string());
    }
}

/// Open, public session advertised with a skill tier
pub fn open_session(name: &str, player_count: usize, max_players: usize, rank: i64) -> SessionDescriptor {
    SessionDescriptor::new(name, player_count, max_players)
        .with_property(keys::GAME_STATE, 0)
        .with_property(keys::KEYWORD, "")
        .with_property(keys::RANK, rank)
}

/// Player as seen inside a session, synchronized unless `guid` is `None`
pub fn session_player(id: &str, name: &str, tier: i64, guid: Option<&str>) -> PlayerSnapshot {
    let mut properties = LocalProfile::new(name, tier).to_properties();
    if let Some(guid) = guid {
        properties.insert(keys::GUID.to_string(), PropertyValue::from(guid));
    }
    PlayerSnapshot {
        id: id.to_string(),
        properties,
    }
}

pub fn session_snapshot(name: &str, max_players: usize, players: Vec<PlayerSnapshot>) -> SessionSnapshot {
    SessionSnapshot {
        name: name.to_string(),
        max_players,
        properties: PropertyMap::new(),
        players,
    }
}

pub fn policy(rank_matching_enabled: bool, keyword: &str, max_players: usize) -> MatchingPolicy {
    MatchingPolicy {
        rank_matching_enabled,
        shared_keyword: keyword.to_string(),
        max_players_per_session: max_players,
    }
}

/// Controller over a recording transport with auto-connect off
pub fn controller_with(
    transport: Arc<RecordingTransport>,
    policy: MatchingPolicy,
    tier: i64,
    handlers: Arc<RecordingHandlers>,
) -> MatchmakingController {
    let settings = ControllerSettings {
        policy,
        auto_connect: false,
        auto_join: true,
    };
    MatchmakingController::new(
        LocalProfile::new("searcher", tier),
        settings,
        transport,
        Arc::new(MetricsCollector::new().unwrap()),
    )
    .with_handlers(handlers)
    .with_rng_seed(7)
}

pub async fn feed(controller: &mut MatchmakingController, event: TransportEvent) {
    controller
        .handle(ControllerInput::Transport(event))
        .await
        .unwrap();
}

pub async fn tick(controller: &mut MatchmakingController) {
    controller.handle(ControllerInput::Tick).await.unwrap();
}

/// Walk a fresh controller through connect and lobby join
pub async fn enter_lobby(controller: &mut MatchmakingController) {
    use room_matchmaker::controller::ControllerCommand;

    controller
        .handle(ControllerInput::Command(ControllerCommand::Connect))
        .await
        .unwrap();
    feed(controller, TransportEvent::Connected).await;
    tick(controller).await;
    feed(controller, TransportEvent::JoinedLobby).await;
}
