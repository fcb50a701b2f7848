//! Start-gating: lock the session and stamp its start time in one write

use crate::types::{keys, GameState, MatchingPolicy, PropertyMap, PropertyValue, SessionName};
use chrono::{DateTime, Utc};

/// Whether the session holds enough players to start
pub fn capacity_reached(player_count: usize, policy: &MatchingPolicy) -> bool {
    player_count >= policy.max_players_per_session
}

/// Combined `GameState` + `GameStartTime` update
pub fn start_properties(start_time: DateTime<Utc>) -> PropertyMap {
    let mut properties = PropertyMap::new();
    properties.insert(
        keys::GAME_STATE.to_string(),
        PropertyValue::Int(GameState::Started.code()),
    );
    properties.insert(
        keys::GAME_START_TIME.to_string(),
        PropertyValue::Timestamp(start_time),
    );
    properties
}

/// Expectation attached to the start write so only one participant wins
pub fn open_expectation() -> PropertyMap {
    let mut expected = PropertyMap::new();
    expected.insert(
        keys::GAME_STATE.to_string(),
        PropertyValue::Int(GameState::Open.code()),
    );
    expected
}

/// Local guard against attempting start-gating twice for the same session
#[derive(Debug, Clone, Default)]
pub struct StartGate {
    session: Option<SessionName>,
    settled: bool,
}

impl StartGate {
    /// Claim the gate for a session; `false` if already claimed or settled
    pub fn try_claim(&mut self, session: &str) -> bool {
        if self.session.as_deref() == Some(session) {
            return false;
        }
        self.session = Some(session.to_string());
        self.settled = false;
        true
    }

    /// The start write for the claimed session is done, by us or a peer
    pub fn settle(&mut self) {
        self.settled = true;
    }

    /// Drop an unsettled claim so a later evaluation may retry
    pub fn release(&mut self) {
        if !self.settled {
            self.session = None;
        }
    }

    pub fn is_settled_for(&self, session: &str) -> bool {
        self.settled && self.session.as_deref() == Some(session)
    }

    pub fn reset(&mut self) {
        self.session = None;
        self.settled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_capacity_reached() {
        let policy = MatchingPolicy {
            max_players_per_session: 2,
            ..MatchingPolicy::default()
        };
        assert!(!capacity_reached(1, &policy));
        assert!(capacity_reached(2, &policy));
        assert!(capacity_reached(3, &policy));
    }

    #[test]
    fn test_start_properties_are_combined() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let properties = start_properties(ts);

        assert_eq!(properties.len(), 2);
        assert_eq!(properties.get(keys::GAME_STATE), Some(&PropertyValue::Int(1)));
        assert_eq!(
            properties.get(keys::GAME_START_TIME).and_then(|v| v.as_timestamp()),
            Some(ts)
        );
        assert_eq!(open_expectation().get(keys::GAME_STATE), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn test_start_gate_claims_once() {
        let mut gate = StartGate::default();
        assert!(gate.try_claim("room"));
        assert!(!gate.try_claim("room"));

        gate.release();
        assert!(gate.try_claim("room"));

        gate.settle();
        gate.release();
        assert!(!gate.try_claim("room"));
        assert!(gate.is_settled_for("room"));

        assert!(gate.try_claim("other"));
        assert!(!gate.is_settled_for("other"));
    }
}
