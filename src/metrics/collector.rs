//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the matchmaking controller
//! using Prometheus metrics.

use crate::transport::TransportOperation;
use crate::types::{ControllerState, RemoteCall};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

/// Main metrics collector for the matchmaking controller
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Controller state machine metrics
    controller_metrics: ControllerMetrics,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,
}

/// State machine metrics
#[derive(Clone)]
pub struct ControllerMetrics {
    /// State transitions by from/to state
    pub state_transitions_total: IntCounterVec,

    /// Provider requests rejected, by operation
    pub request_failures_total: IntCounterVec,

    /// Remote calls received, by kind
    pub remote_calls_total: IntCounterVec,

    /// Size of the candidate set per selection run
    pub candidate_count: Histogram,

    /// Open sessions in the latest lobby listing
    pub open_sessions: IntGauge,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Sessions joined through selection or by name
    pub sessions_joined_total: IntCounter,

    /// Sessions created because no candidate matched
    pub sessions_created_total: IntCounter,

    /// Games started by the local participant's start write
    pub games_started_total: IntCounter,

    /// Start writes lost to another participant
    pub start_gate_conflicts_total: IntCounter,

    /// Participants in the most recently rebuilt roster
    pub roster_size: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let controller_metrics = ControllerMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            controller_metrics,
            session_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn controller(&self) -> &ControllerMetrics {
        &self.controller_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Record a state machine transition
    pub fn record_transition(&self, from: ControllerState, to: ControllerState) {
        self.controller_metrics
            .state_transitions_total
            .with_label_values(&[&from.to_string(), &to.to_string()])
            .inc();
    }

    /// Record a rejected or failed provider request
    pub fn record_request_failure(&self, operation: TransportOperation) {
        self.controller_metrics
            .request_failures_total
            .with_label_values(&[&operation.to_string()])
            .inc();
    }

    pub fn record_remote_call(&self, call: &RemoteCall) {
        self.controller_metrics
            .remote_calls_total
            .with_label_values(&[call.method_name()])
            .inc();
    }

    /// Record the outcome of a selection run
    pub fn record_selection(&self, listed: usize, candidates: usize) {
        self.controller_metrics.open_sessions.set(listed as i64);
        self.controller_metrics
            .candidate_count
            .observe(candidates as f64);
    }

    pub fn record_session_list(&self, listed: usize) {
        self.controller_metrics.open_sessions.set(listed as i64);
    }

    pub fn record_session_joined(&self) {
        self.session_metrics.sessions_joined_total.inc();
    }

    pub fn record_session_created(&self) {
        self.session_metrics.sessions_created_total.inc();
    }

    pub fn record_game_started(&self) {
        self.session_metrics.games_started_total.inc();
    }

    pub fn record_start_conflict(&self) {
        self.session_metrics.start_gate_conflicts_total.inc();
    }

    pub fn record_roster_size(&self, size: usize) {
        self.session_metrics.roster_size.set(size as i64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

impl ControllerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let state_transitions_total = IntCounterVec::new(
            Opts::new(
                "room_matchmaker_state_transitions_total",
                "Controller state transitions",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(state_transitions_total.clone()))?;

        let request_failures_total = IntCounterVec::new(
            Opts::new(
                "room_matchmaker_request_failures_total",
                "Provider requests that failed or were rejected",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(request_failures_total.clone()))?;

        let remote_calls_total = IntCounterVec::new(
            Opts::new(
                "room_matchmaker_remote_calls_total",
                "Remote calls received from session participants",
            ),
            &["method"],
        )?;
        registry.register(Box::new(remote_calls_total.clone()))?;

        let candidate_count = Histogram::with_opts(
            HistogramOpts::new(
                "room_matchmaker_candidate_count",
                "Number of candidate sessions per selection run",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(candidate_count.clone()))?;

        let open_sessions = IntGauge::new(
            "room_matchmaker_open_sessions",
            "Sessions in the latest lobby listing",
        )?;
        registry.register(Box::new(open_sessions.clone()))?;

        Ok(Self {
            state_transitions_total,
            request_failures_total,
            remote_calls_total,
            candidate_count,
            open_sessions,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_joined_total =
            IntCounter::new("room_matchmaker_sessions_joined_total", "Sessions joined")?;
        registry.register(Box::new(sessions_joined_total.clone()))?;

        let sessions_created_total =
            IntCounter::new("room_matchmaker_sessions_created_total", "Sessions created")?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let games_started_total = IntCounter::new(
            "room_matchmaker_games_started_total",
            "Games started by this process",
        )?;
        registry.register(Box::new(games_started_total.clone()))?;

        let start_gate_conflicts_total = IntCounter::new(
            "room_matchmaker_start_gate_conflicts_total",
            "Start writes lost to another participant",
        )?;
        registry.register(Box::new(start_gate_conflicts_total.clone()))?;

        let roster_size = IntGauge::new(
            "room_matchmaker_roster_size",
            "Participants in the current roster",
        )?;
        registry.register(Box::new(roster_size.clone()))?;

        Ok(Self {
            sessions_joined_total,
            sessions_created_total,
            games_started_total,
            start_gate_conflicts_total,
            roster_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_session_joined();
        let families = collector.registry().gather();
        assert!(!families.is_empty());
    }

    #[test]
    fn test_record_transition_labels() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_transition(ControllerState::InLobby, ControllerState::Waiting);
        collector.record_transition(ControllerState::InLobby, ControllerState::Waiting);

        let count = collector
            .controller()
            .state_transitions_total
            .with_label_values(&["InLobby", "Waiting"])
            .get();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_session_counters() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_session_created();
        collector.record_game_started();
        collector.record_start_conflict();
        collector.record_roster_size(2);
        collector.record_selection(4, 1);
        collector.record_request_failure(TransportOperation::JoinSession);

        assert_eq!(collector.session().sessions_created_total.get(), 1);
        assert_eq!(collector.session().games_started_total.get(), 1);
        assert_eq!(collector.session().start_gate_conflicts_total.get(), 1);
        assert_eq!(collector.session().roster_size.get(), 2);
        assert_eq!(collector.controller().open_sessions.get(), 4);
        assert_eq!(
            collector
                .controller()
                .request_failures_total
                .with_label_values(&["join_session"])
                .get(),
            1
        );
    }
}
