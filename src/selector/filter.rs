//! Candidate filtering for finding joinable sessions
//!
//! This module holds the compatibility rules applied to every open session
//! before the controller commits to joining one.

use crate::types::{GameState, MatchingPolicy, SessionDescriptor};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use tracing::debug;

/// Why a session was not accepted as a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Player count already at the policy or session limit
    Full,
    /// `GameState` says the session already started
    Locked,
    /// `GameState` is absent or unreadable
    MissingGameState,
    /// Searching with a keyword, session keyword absent or different
    KeywordMismatch,
    /// Searching without a keyword, session is keyword-gated
    PrivateSession,
    /// Rank matching on, session rank absent or different
    RankMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Full => "full",
            Rejection::Locked => "locked",
            Rejection::MissingGameState => "missing game state",
            Rejection::KeywordMismatch => "keyword mismatch",
            Rejection::PrivateSession => "keyword-gated session",
            Rejection::RankMismatch => "rank mismatch",
        };
        f.write_str(reason)
    }
}

/// Trait for candidate selection strategies
pub trait CandidateSelector: Send + Sync {
    /// Decide whether a single session is joinable for the searcher
    fn evaluate(
        &self,
        session: &SessionDescriptor,
        policy: &MatchingPolicy,
        searcher_tier: i64,
    ) -> Result<(), Rejection>;

    /// Return every session that passes all active predicates
    fn select(
        &self,
        sessions: &[SessionDescriptor],
        policy: &MatchingPolicy,
        searcher_tier: i64,
    ) -> Vec<SessionDescriptor> {
        sessions
            .iter()
            .filter(|session| match self.evaluate(session, policy, searcher_tier) {
                Ok(()) => true,
                Err(reason) => {
                    debug!("Session '{}' rejected: {}", session.name, reason);
                    false
                }
            })
            .cloned()
            .collect()
    }
}

/// Default selector: capacity, lock state, keyword gating, then rank gating
///
/// A matching keyword decides inclusion on its own; rank is only checked for
/// searches without a keyword.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRankSelector;

impl KeywordRankSelector {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateSelector for KeywordRankSelector {
    fn evaluate(
        &self,
        session: &SessionDescriptor,
        policy: &MatchingPolicy,
        searcher_tier: i64,
    ) -> Result<(), Rejection> {
        if !session.has_room(policy.max_players_per_session) {
            return Err(Rejection::Full);
        }

        match session.game_state() {
            Some(GameState::Open) => {}
            Some(GameState::Started) => return Err(Rejection::Locked),
            None => return Err(Rejection::MissingGameState),
        }

        if policy.uses_keyword() {
            return match session.keyword() {
                Some(keyword) if keyword == policy.shared_keyword => Ok(()),
                _ => Err(Rejection::KeywordMismatch),
            };
        }

        if session.is_keyword_gated() {
            return Err(Rejection::PrivateSession);
        }

        if policy.rank_matching_enabled && session.rank() != Some(searcher_tier) {
            return Err(Rejection::RankMismatch);
        }

        Ok(())
    }
}

/// Pick one candidate uniformly at random
pub fn choose_candidate<'a, R: Rng + ?Sized>(
    candidates: &'a [SessionDescriptor],
    rng: &mut R,
) -> Option<&'a SessionDescriptor> {
    candidates.choose(rng)
}
