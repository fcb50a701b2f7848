//! Property tests for candidate selection
//!
//! Sessions are generated with arbitrary capacity, lock state, keyword and
//! rank, including missing properties, and the selector output is checked
//! against the exclusion and partition rules.

use proptest::prelude::*;
use room_matchmaker::selector::select;
use room_matchmaker::types::{keys, MatchingPolicy, SessionDescriptor};

fn arb_session(index: usize) -> impl Strategy<Value = SessionDescriptor> {
    (
        0usize..6,
        1usize..6,
        proptest::option::of(0i64..3),
        proptest::option::of(prop_oneof![Just(""), Just("ABC"), Just("XYZ")]),
        proptest::option::of(0i64..6),
    )
        .prop_map(move |(players, max_players, game_state, keyword, rank)| {
            let mut session = SessionDescriptor::new(format!("s{}", index), players, max_players);
            if let Some(state) = game_state {
                session = session.with_property(keys::GAME_STATE, state);
            }
            if let Some(keyword) = keyword {
                session = session.with_property(keys::KEYWORD, keyword);
            }
            if let Some(rank) = rank {
                session = session.with_property(keys::RANK, rank);
            }
            session
        })
}

fn arb_sessions() -> impl Strategy<Value = Vec<SessionDescriptor>> {
    (0usize..12).prop_flat_map(|len| (0..len).map(arb_session).collect::<Vec<_>>())
}

fn arb_policy() -> impl Strategy<Value = MatchingPolicy> {
    (any::<bool>(), prop_oneof![Just(""), Just("ABC")], 2usize..6).prop_map(
        |(rank_matching_enabled, keyword, max_players)| MatchingPolicy {
            rank_matching_enabled,
            shared_keyword: keyword.to_string(),
            max_players_per_session: max_players,
        },
    )
}

fn names(sessions: &[SessionDescriptor]) -> Vec<String> {
    sessions.iter().map(|s| s.name.clone()).collect()
}

proptest! {
    #[test]
    fn full_sessions_are_never_selected(
        sessions in arb_sessions(),
        policy in arb_policy(),
        tier in 0i64..6,
    ) {
        for session in select(&sessions, &policy, tier) {
            prop_assert!(session.player_count < session.max_players);
            prop_assert!(session.player_count < policy.max_players_per_session);
        }
    }

    #[test]
    fn locked_or_unmarked_sessions_are_never_selected(
        sessions in arb_sessions(),
        policy in arb_policy(),
        tier in 0i64..6,
    ) {
        for session in select(&sessions, &policy, tier) {
            let state = session.property(keys::GAME_STATE).and_then(|v| v.as_int());
            prop_assert_eq!(state, Some(0));
        }
    }

    #[test]
    fn keyword_partitions_candidates(
        sessions in arb_sessions(),
        policy in arb_policy(),
        tier in 0i64..6,
    ) {
        let selected = select(&sessions, &policy, tier);
        for session in &selected {
            if policy.shared_keyword.is_empty() {
                prop_assert!(!session.is_keyword_gated());
            } else {
                prop_assert_eq!(session.keyword(), Some(policy.shared_keyword.clone()));
            }
        }

        // With a keyword, every open matching session is a candidate whatever its rank
        if !policy.shared_keyword.is_empty() {
            let selected_names = names(&selected);
            for session in &sessions {
                let open = session.property(keys::GAME_STATE).and_then(|v| v.as_int()) == Some(0);
                let has_room = session.player_count < session.max_players
                    && session.player_count < policy.max_players_per_session;
                if open && has_room && session.keyword() == Some(policy.shared_keyword.clone()) {
                    prop_assert!(selected_names.contains(&session.name));
                }
            }
        }
    }

    #[test]
    fn rank_partitions_public_candidates(
        sessions in arb_sessions(),
        max_players in 2usize..6,
        tier in 0i64..6,
    ) {
        let policy = MatchingPolicy {
            rank_matching_enabled: true,
            shared_keyword: String::new(),
            max_players_per_session: max_players,
        };
        for session in select(&sessions, &policy, tier) {
            prop_assert_eq!(session.rank(), Some(tier));
        }
    }

    #[test]
    fn rank_has_no_effect_when_disabled(
        sessions in arb_sessions(),
        max_players in 2usize..6,
        tier in 0i64..6,
        other_tier in 0i64..6,
    ) {
        let policy = MatchingPolicy {
            rank_matching_enabled: false,
            shared_keyword: String::new(),
            max_players_per_session: max_players,
        };
        let reranked: Vec<SessionDescriptor> = sessions
            .iter()
            .cloned()
            .map(|s| s.with_property(keys::RANK, other_tier))
            .collect();

        prop_assert_eq!(
            names(&select(&sessions, &policy, tier)),
            names(&select(&reranked, &policy, tier))
        );
    }

    #[test]
    fn selection_is_an_ordered_subset(
        sessions in arb_sessions(),
        policy in arb_policy(),
        tier in 0i64..6,
    ) {
        let selected = names(&select(&sessions, &policy, tier));
        let mut remaining = names(&sessions).into_iter();
        for name in selected {
            prop_assert!(remaining.any(|candidate| candidate == name));
        }
    }
}

#[test]
fn rank_scenario_selects_matching_tier_only() {
    let policy = MatchingPolicy {
        rank_matching_enabled: true,
        shared_keyword: String::new(),
        max_players_per_session: 2,
    };
    let sessions = vec![
        SessionDescriptor::new("A", 1, 2)
            .with_property(keys::GAME_STATE, 0)
            .with_property(keys::KEYWORD, "")
            .with_property(keys::RANK, 3),
        SessionDescriptor::new("B", 1, 2)
            .with_property(keys::GAME_STATE, 0)
            .with_property(keys::KEYWORD, "")
            .with_property(keys::RANK, 7),
    ];

    assert_eq!(names(&select(&sessions, &policy, 3)), vec!["A".to_string()]);
    assert!(select(&sessions[1..], &policy, 3).is_empty());
}
