//! Main application state and service coordination
//!
//! This module contains the AppState that wires the loopback provider, the
//! simulated participants and the metrics service together.

use crate::config::AppConfig;
use crate::controller::{
    spawn_controller, ControllerCommand, ControllerHandle, ControllerStatus, ListingLogObserver,
    MatchmakingController,
};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::health::HealthCheck;
use crate::transport::LoopbackBackend;
use crate::types::LocalProfile;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// A running simulated participant
struct SimulatedParticipant {
    handle: ControllerHandle,
    task: JoinHandle<()>,
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Shared in-memory session provider
    backend: LoopbackBackend,

    /// Metrics service for monitoring and health checks
    metrics_service: Option<Arc<MetricsService>>,

    metrics_collector: Arc<MetricsCollector>,

    participants: Vec<SimulatedParticipant>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing room-matchmaker service");

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        Ok(Self {
            config,
            backend: LoopbackBackend::default(),
            metrics_service: None,
            metrics_collector,
            participants: Vec::new(),
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Spawn the participants and the health endpoints
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting room-matchmaker service");

        *self.is_running.write().await = true;

        self.start_participants()?;
        self.start_metrics_service();

        info!(
            "✅ Room-matchmaker service started with {} participant(s)",
            self.participants.len()
        );
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of room-matchmaker service");

        *self.is_running.write().await = false;

        for participant in &self.participants {
            if let Err(e) = participant.handle.execute(ControllerCommand::Disconnect).await {
                warn!(
                    "Failed to disconnect '{}': {}",
                    participant.handle.status().nickname,
                    e
                );
            }
        }

        if let Some(metrics_service) = &self.metrics_service {
            info!("Stopping metrics service...");
            metrics_service.stop();
        }

        let final_health = HealthCheck::evaluate(&self.config.service.name, &self.statuses());
        info!("Final participant statistics: {:?}", final_health.stats);

        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        for participant in self.participants.drain(..) {
            participant.task.abort();
            // Wait for the loop to drop its event receiver
            let _ = participant.task.await;
        }
        match self.backend.prune_closed_clients() {
            Ok(pruned) => debug!("Released {} loopback client(s)", pruned),
            Err(e) => warn!("Failed to release loopback clients: {}", e),
        }

        info!("✅ Room-matchmaker service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn backend(&self) -> &LoopbackBackend {
        &self.backend
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Handles of every running participant
    pub fn handles(&self) -> Vec<ControllerHandle> {
        self.participants.iter().map(|p| p.handle.clone()).collect()
    }

    pub fn statuses(&self) -> Vec<ControllerStatus> {
        self.participants.iter().map(|p| p.handle.status()).collect()
    }

    pub fn health(&self) -> HealthCheck {
        HealthCheck::evaluate(&self.config.service.name, &self.statuses())
    }

    fn start_participants(&mut self) -> Result<(), ServiceError> {
        let simulation = &self.config.simulation;
        let mut settings = self.config.matchmaking.controller_settings();
        // Connects are ramped below instead of all firing at once
        let ramp_connects = settings.auto_connect;
        settings.auto_connect = false;

        for index in 0..simulation.participants {
            let profile = LocalProfile::new(simulation.name_for(index), simulation.tier_for(index));
            let (transport, events) =
                self.backend
                    .connect_client()
                    .map_err(|e| ServiceError::Initialization {
                        message: format!("Failed to attach participant: {}", e),
                    })?;

            info!(
                "Spawning participant '{}' (tier {}) as {}",
                profile.name,
                profile.skill_tier,
                transport.player_id()
            );

            let mut controller = MatchmakingController::new(
                profile,
                settings.clone(),
                Arc::new(transport),
                self.metrics_collector.clone(),
            );
            if index == 0 {
                controller = controller.with_observer(Arc::new(ListingLogObserver));
            }

            let (handle, task) = spawn_controller(controller, events, self.config.tick_interval());
            self.participants.push(SimulatedParticipant { handle, task });
        }

        if ramp_connects {
            let handles = self.handles();
            let stagger = simulation.join_stagger();
            self.background_tasks.push(tokio::spawn(async move {
                for handle in handles {
                    if let Err(e) = handle.execute(ControllerCommand::Connect).await {
                        warn!("Failed to connect '{}': {}", handle.status().nickname, e);
                    }
                    tokio::time::sleep(stagger).await;
                }
            }));
        }

        Ok(())
    }

    fn start_metrics_service(&mut self) {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
            service_name: self.config.service.name.clone(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_participants(self.handles()),
        );
        let metrics_service = Arc::new(MetricsService::new(
            self.metrics_collector.clone(),
            health_server,
        ));
        self.metrics_service = Some(metrics_service.clone());

        let port = self.config.service.health_port;
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        info!("Metrics and health endpoints starting on port {}", port);
    }
}
