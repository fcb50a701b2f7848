//! Participant roster reconstruction
//!
//! The roster is rebuilt wholesale from the session's player properties on
//! every refresh; it is never patched incrementally.

use crate::transport::SessionSnapshot;
use crate::types::{keys, LocalProfile, PlayerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A synchronized session participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: PlayerId,
    pub guid: String,
    pub profile: LocalProfile,
}

/// Ordered participants of the current session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRoster {
    participants: Vec<Participant>,
}

impl ParticipantRoster {
    /// Rebuild from a session snapshot, skipping players that have not
    /// published their identifier yet
    pub fn rebuild(snapshot: &SessionSnapshot) -> Self {
        let mut participants = Vec::with_capacity(snapshot.players.len());

        for player in &snapshot.players {
            let Some(guid) = player.properties.get(keys::GUID) else {
                debug!("Skipping {}: no {} property yet", player.id, keys::GUID);
                continue;
            };

            match LocalProfile::from_properties(&player.properties) {
                Ok(profile) => participants.push(Participant {
                    player_id: player.id.clone(),
                    guid: guid.to_string(),
                    profile,
                }),
                Err(e) => warn!("Skipping {}: unreadable profile ({})", player.id, e),
            }
        }

        Self { participants }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
