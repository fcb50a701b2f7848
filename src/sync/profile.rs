//! Profile <-> property map translation

use crate::error::{MatchmakingError, Result};
use crate::types::{keys, GameState, LocalProfile, PropertyMap, PropertyValue};

impl LocalProfile {
    /// Keys written by [`LocalProfile::to_properties`]
    pub fn property_keys() -> [&'static str; 2] {
        [keys::NAME, keys::RANK]
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut properties = PropertyMap::new();
        properties.insert(keys::NAME.to_string(), PropertyValue::from(self.name.as_str()));
        properties.insert(keys::RANK.to_string(), PropertyValue::Int(self.skill_tier));
        properties
    }

    pub fn from_properties(properties: &PropertyMap) -> Result<Self> {
        let name = properties
            .get(keys::NAME)
            .ok_or_else(|| MatchmakingError::MissingProperty {
                key: keys::NAME.to_string(),
            })?
            .to_string();

        let rank = properties
            .get(keys::RANK)
            .ok_or_else(|| MatchmakingError::MissingProperty {
                key: keys::RANK.to_string(),
            })?;
        let skill_tier = rank.as_int().ok_or_else(|| MatchmakingError::InvalidProperty {
            key: keys::RANK.to_string(),
            message: format!("expected an integer, got '{}'", rank),
        })?;

        Ok(Self { name, skill_tier })
    }
}

/// Player properties published on lobby join
pub fn lobby_player_properties(profile: &LocalProfile, guid: &str) -> PropertyMap {
    let mut properties = profile.to_properties();
    properties.insert(keys::GUID.to_string(), PropertyValue::from(guid));
    properties
}

/// Initial session properties for a session created by this participant
pub fn session_creation_properties(profile: &LocalProfile, keyword: &str) -> PropertyMap {
    let mut properties = profile.to_properties();
    properties.insert(
        keys::GAME_STATE.to_string(),
        PropertyValue::Int(GameState::Open.code()),
    );
    properties.insert(keys::KEYWORD.to_string(), PropertyValue::from(keyword));
    properties
}

/// Session property keys other searchers need to see in the lobby listing
pub fn lobby_visible_keys() -> Vec<String> {
    LocalProfile::property_keys()
        .into_iter()
        .chain([keys::GAME_STATE, keys::KEYWORD])
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_properties() {
        let profile = LocalProfile::new("alice", 3);
        let properties = profile.to_properties();

        assert_eq!(properties.get(keys::NAME), Some(&PropertyValue::from("alice")));
        assert_eq!(properties.get(keys::RANK), Some(&PropertyValue::Int(3)));
        assert_eq!(LocalProfile::from_properties(&properties).unwrap(), profile);
    }

    #[test]
    fn test_profile_accepts_textual_rank() {
        let mut properties = PropertyMap::new();
        properties.insert(keys::NAME.to_string(), PropertyValue::from("bob"));
        properties.insert(keys::RANK.to_string(), PropertyValue::from("5"));

        let profile = LocalProfile::from_properties(&properties).unwrap();
        assert_eq!(profile.skill_tier, 5);
    }

    #[test]
    fn test_profile_missing_fields() {
        let mut properties = PropertyMap::new();
        properties.insert(keys::NAME.to_string(), PropertyValue::from("bob"));
        assert!(LocalProfile::from_properties(&properties).is_err());

        properties.insert(keys::RANK.to_string(), PropertyValue::from("high"));
        assert!(LocalProfile::from_properties(&properties).is_err());
    }

    #[test]
    fn test_creation_properties() {
        let profile = LocalProfile::new("alice", 3);
        let properties = session_creation_properties(&profile, "ABC");

        assert_eq!(properties.get(keys::GAME_STATE), Some(&PropertyValue::Int(0)));
        assert_eq!(properties.get(keys::KEYWORD), Some(&PropertyValue::from("ABC")));
        assert_eq!(properties.get(keys::RANK), Some(&PropertyValue::Int(3)));
        assert_eq!(
            lobby_visible_keys(),
            vec!["Name", "Rank", "GameState", "Keyword"]
        );
    }

    #[test]
    fn test_lobby_properties_carry_guid() {
        let properties = lobby_player_properties(&LocalProfile::new("alice", 3), "guid-1");
        assert_eq!(properties.get(keys::GUID), Some(&PropertyValue::from("guid-1")));
    }
}
