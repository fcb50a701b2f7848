//! Main entry point for the room-matchmaker service
//!
//! Runs a set of simulated participants against the in-memory session
//! provider, serves health and metrics endpoints, and shuts down gracefully
//! on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use room_matchmaker::config::{validate_config, AppConfig};
use room_matchmaker::service::{AppState, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Room Matchmaker - peer session discovery, filtering and start-gating
#[derive(Parser)]
#[command(
    name = "room-matchmaker",
    version,
    about = "Peer matchmaking controller simulation over an in-memory session provider",
    long_about = "Room Matchmaker runs simulated participants that connect to a session provider, \
                 pick an open session by keyword and skill tier (or create one), and start the \
                 game once the session is full, with exactly one participant broadcasting the start."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health/metrics server port")]
    health_port: Option<u16>,

    /// Number of simulated participants
    #[arg(short, long, value_name = "N", help = "Number of simulated participants")]
    participants: Option<usize>,

    /// Shared matching keyword
    #[arg(short, long, value_name = "KEYWORD", help = "Private matching keyword")]
    keyword: Option<String>,

    /// Disable skill-tier matching
    #[arg(long, help = "Match sessions regardless of skill tier")]
    no_rank_matching: bool,

    /// Session capacity override
    #[arg(long, value_name = "N", help = "Players per session (at least 2)")]
    max_players: Option<usize>,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting participants"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log aggregated participant health periodically
async fn health_report_task(app_state: Arc<RwLock<AppState>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        let state = app_state.read().await;
        if !state.is_running().await {
            break;
        }

        let health = state.health();
        let line = format!(
            "Health check: {} - {} in lobby, {} ready, {} in game across {} session(s)",
            health.status,
            health.stats.in_lobby,
            health.stats.ready,
            health.stats.in_game,
            health.stats.sessions
        );
        if health.status == HealthStatus::Healthy {
            info!("{}", line);
        } else {
            warn!("{}", line);
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Room Matchmaker");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Tick interval: {}ms", config.service.tick_interval_ms);
    info!(
        "   Participants: {} (tiers {:?})",
        config.simulation.participants, config.simulation.skill_tiers
    );
    info!(
        "   Players per session: {}",
        config.matchmaking.max_players_per_session
    );
    info!(
        "   Rank matching: {}",
        config.matchmaking.rank_matching_enabled
    );
    if config.matchmaking.shared_keyword.is_empty() {
        info!("   Keyword: (public matching)");
    } else {
        info!("   Keyword: '{}'", config.matchmaking.shared_keyword);
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file, environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(participants) = args.participants {
        config.simulation.participants = participants;
    }

    if let Some(keyword) = &args.keyword {
        config.matchmaking.shared_keyword = keyword.clone();
    }

    if args.no_rank_matching {
        config.matchmaking.rank_matching_enabled = false;
    }

    if let Some(max_players) = args.max_players {
        config.matchmaking.max_players_per_session = max_players;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting participants");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let app_state = Arc::new(RwLock::new(app_state));

    let health_task = tokio::spawn(health_report_task(app_state.clone()));

    info!("✅ Room Matchmaker is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    let shutdown_future = async {
        let mut state = app_state.write().await;
        state.shutdown().await
    };

    match tokio::time::timeout(config.shutdown_timeout(), shutdown_future).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            error!("Shutdown failed: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Room Matchmaker stopped");
    Ok(())
}
