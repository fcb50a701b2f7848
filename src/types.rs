//! Common types used throughout the matchmaking controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique, generator-assigned session name
pub type SessionName = String;

/// Provider-assigned identifier of a connected participant
pub type PlayerId = String;

/// Key-value property storage as exposed by the session provider
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Well-known property keys shared by every participant
pub mod keys {
    pub const NAME: &str = "Name";
    pub const RANK: &str = "Rank";
    pub const GUID: &str = "GUID";
    pub const GAME_STATE: &str = "GameState";
    pub const KEYWORD: &str = "Keyword";
    pub const GAME_START_TIME: &str = "GameStartTime";
}

/// A single value stored in session or player properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl PropertyValue {
    /// Interpret the value as an integer. Text holding a number is accepted
    /// since peers are free to store numbers as strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::Bool(b) => Some(i64::from(*b)),
            PropertyValue::Float(_) | PropertyValue::Timestamp(_) => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
            PropertyValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

/// Lock state of a session as stored under `GameState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    Open,
    Started,
}

impl GameState {
    pub fn code(self) -> i64 {
        match self {
            GameState::Open => 0,
            GameState::Started => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(GameState::Open),
            1 => Some(GameState::Started),
            _ => None,
        }
    }
}

/// Profile of the local participant, shared with peers through player properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalProfile {
    pub name: String,
    pub skill_tier: i64,
}

impl LocalProfile {
    pub fn new(name: impl Into<String>, skill_tier: i64) -> Self {
        Self {
            name: name.into(),
            skill_tier,
        }
    }
}

/// Read-only snapshot of an open session as listed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub name: SessionName,
    pub player_count: usize,
    pub max_players: usize,
    pub properties: PropertyMap,
}

impl SessionDescriptor {
    pub fn new(name: impl Into<String>, player_count: usize, max_players: usize) -> Self {
        Self {
            name: name.into(),
            player_count,
            max_players,
            properties: PropertyMap::new(),
        }
    }

    /// Builder-style property setter, mostly useful when assembling listings
    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// `None` when the property is absent or holds an unknown code
    pub fn game_state(&self) -> Option<GameState> {
        self.property(keys::GAME_STATE)
            .and_then(PropertyValue::as_int)
            .and_then(GameState::from_code)
    }

    pub fn keyword(&self) -> Option<String> {
        self.property(keys::KEYWORD).map(|v| v.to_string())
    }

    /// True when the session is gated behind a non-empty shared secret
    pub fn is_keyword_gated(&self) -> bool {
        self.keyword().is_some_and(|k| !k.is_empty())
    }

    pub fn rank(&self) -> Option<i64> {
        self.property(keys::RANK).and_then(PropertyValue::as_int)
    }

    pub fn host_name(&self) -> Option<String> {
        self.property(keys::NAME).map(|v| v.to_string())
    }

    /// Room left under both the session's own limit and the local per-session cap
    pub fn has_room(&self, max_players_per_session: usize) -> bool {
        self.player_count < self.max_players && self.player_count < max_players_per_session
    }
}

/// Process-wide matching policy, fixed for the duration of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPolicy {
    pub rank_matching_enabled: bool,
    pub shared_keyword: String,
    pub max_players_per_session: usize,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            rank_matching_enabled: true,
            shared_keyword: String::new(),
            max_players_per_session: 2,
        }
    }
}

impl MatchingPolicy {
    pub fn uses_keyword(&self) -> bool {
        !self.shared_keyword.is_empty()
    }
}

/// Phase of the matchmaking controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    Init,
    Connected,
    InLobby,
    Ready,
    InGame,
    Disconnected,
    Waiting,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Init => "Init",
            ControllerState::Connected => "Connected",
            ControllerState::InLobby => "InLobby",
            ControllerState::Ready => "Ready",
            ControllerState::InGame => "InGame",
            ControllerState::Disconnected => "Disconnected",
            ControllerState::Waiting => "Waiting",
        };
        f.write_str(name)
    }
}

/// Remote calls exchanged between session participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RemoteCall {
    EventRelay { sender_id: PlayerId, event_code: i32 },
    GameStart,
}

impl RemoteCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            RemoteCall::EventRelay { .. } => "EventCall",
            RemoteCall::GameStart => "GameStartCall",
        }
    }
}

/// Recipient of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteTarget {
    All,
    Player(PlayerId),
}
