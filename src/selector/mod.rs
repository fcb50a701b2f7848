//! Candidate selection over the provider's open session list
//!
//! Selection is a pure function of the listed sessions, the active matching
//! policy and the searcher's skill tier.

pub mod filter;

pub use filter::{choose_candidate, CandidateSelector, KeywordRankSelector, Rejection};

use crate::types::{MatchingPolicy, SessionDescriptor};

/// Run the default selector over a session list
pub fn select(
    sessions: &[SessionDescriptor],
    policy: &MatchingPolicy,
    searcher_tier: i64,
) -> Vec<SessionDescriptor> {
    KeywordRankSelector::new().select(sessions, policy, searcher_tier)
}
