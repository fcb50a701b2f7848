//! Single-consumer event loop for a controller
//!
//! Ticks, provider notifications and application commands are serialized
//! through one task so the controller never sees concurrent inputs. The
//! latest [`ControllerStatus`] is published on a watch channel.

use crate::controller::machine::{
    ControllerCommand, ControllerInput, ControllerStatus, MatchmakingController,
};
use crate::error::{MatchmakingError, Result};
use crate::transport::TransportEvent;
use crate::types::ControllerState;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

struct CommandEnvelope {
    command: ControllerCommand,
    reply: oneshot::Sender<Result<()>>,
}

/// Cloneable handle to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<CommandEnvelope>,
    status: watch::Receiver<ControllerStatus>,
}

impl ControllerHandle {
    /// Submit a command and wait for the controller to process it
    pub async fn execute(&self, command: ControllerCommand) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(CommandEnvelope { command, reply })
            .map_err(|_| MatchmakingError::InternalError {
                message: "controller task has stopped".to_string(),
            })?;

        response.await.map_err(|_| MatchmakingError::InternalError {
            message: "controller dropped the command".to_string(),
        })?
    }

    /// Latest published status
    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ControllerState {
        self.status.borrow().state
    }

    pub fn is_game_now(&self) -> bool {
        self.status.borrow().is_game_now()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Wait until the controller reaches `target`
    pub async fn wait_for_state(
        &self,
        target: ControllerState,
        timeout: Duration,
    ) -> Result<ControllerStatus> {
        let mut receiver = self.status.clone();
        let waited = tokio::time::timeout(timeout, receiver.wait_for(|s| s.state == target)).await;

        match waited {
            Ok(Ok(status)) => Ok((*status).clone()),
            Ok(Err(_)) => Err(MatchmakingError::InternalError {
                message: "controller task has stopped".to_string(),
            }
            .into()),
            Err(_) => Err(MatchmakingError::InternalError {
                message: format!(
                    "timed out after {:?} waiting for {} (currently {})",
                    timeout,
                    target,
                    self.state()
                ),
            }
            .into()),
        }
    }
}

/// Spawn the event loop for `controller`, consuming provider `events`
pub fn spawn_controller(
    mut controller: MatchmakingController,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    tick_interval: Duration,
) -> (ControllerHandle, JoinHandle<()>) {
    let (status_tx, status_rx) = watch::channel(controller.status());
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<CommandEnvelope>();

    let task = tokio::spawn(async move {
        let nickname = controller.profile().name.clone();

        if controller.settings().auto_connect {
            if let Err(e) = controller
                .handle(ControllerInput::Command(ControllerCommand::Connect))
                .await
            {
                warn!("[{}] Auto-connect failed, retrying on tick: {}", nickname, e);
            }
            publish(&status_tx, &controller);
        }

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            let (input, reply) = tokio::select! {
                biased;

                event = events.recv(), if events_open => match event {
                    Some(event) => (ControllerInput::Transport(event), None),
                    None => {
                        debug!("[{}] Provider event stream closed", nickname);
                        events_open = false;
                        continue;
                    }
                },
                envelope = command_rx.recv() => match envelope {
                    Some(CommandEnvelope { command, reply }) => {
                        (ControllerInput::Command(command), Some(reply))
                    }
                    None => break,
                },
                _ = ticker.tick() => (ControllerInput::Tick, None),
            };

            let result = controller.handle(input).await;
            publish(&status_tx, &controller);

            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        warn!("[{}] Input handling failed: {}", nickname, e);
                    }
                }
            }
        }

        info!("[{}] Controller loop stopped", nickname);
    });

    (
        ControllerHandle {
            commands: command_tx,
            status: status_rx,
        },
        task,
    )
}

fn publish(status_tx: &watch::Sender<ControllerStatus>, controller: &MatchmakingController) {
    let next = controller.status();
    status_tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::machine::ControllerSettings;
    use crate::metrics::MetricsCollector;
    use crate::transport::{LoopbackBackend, MockSessionTransport};
    use crate::types::LocalProfile;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_auto_connect_reaches_lobby() {
        let backend = LoopbackBackend::default();
        let (transport, events) = backend.connect_client().unwrap();
        let settings = ControllerSettings {
            auto_join: false,
            ..ControllerSettings::default()
        };
        let controller = MatchmakingController::new(
            LocalProfile::new("alice", 2),
            settings,
            Arc::new(transport),
            Arc::new(MetricsCollector::new().unwrap()),
        );

        let (handle, task) = spawn_controller(controller, events, Duration::from_millis(10));
        let status = handle
            .wait_for_state(ControllerState::InLobby, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status.nickname, "alice");

        task.abort();
    }

    #[tokio::test]
    async fn test_failed_auto_connect_is_retried() {
        let mut mock = MockSessionTransport::new();
        let mut attempts = 0;
        mock.expect_connect().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(anyhow::anyhow!("backend unreachable"))
            } else {
                Ok(())
            }
        });
        let (_events_tx, events) = mpsc::unbounded_channel();
        let settings = ControllerSettings {
            auto_join: false,
            ..ControllerSettings::default()
        };
        let controller = MatchmakingController::new(
            LocalProfile::new("carol", 1),
            settings,
            Arc::new(mock),
            Arc::new(MetricsCollector::new().unwrap()),
        );

        let (handle, task) = spawn_controller(controller, events, Duration::from_millis(10));
        handle
            .wait_for_state(ControllerState::Waiting, Duration::from_secs(2))
            .await
            .unwrap();

        task.abort();
    }

    #[tokio::test]
    async fn test_command_errors_are_returned() {
        let backend = LoopbackBackend::default();
        let (transport, events) = backend.connect_client().unwrap();
        let settings = ControllerSettings {
            auto_connect: false,
            ..ControllerSettings::default()
        };
        let controller = MatchmakingController::new(
            LocalProfile::new("bob", 1),
            settings,
            Arc::new(transport),
            Arc::new(MetricsCollector::new().unwrap()),
        );

        let (handle, task) = spawn_controller(controller, events, Duration::from_millis(10));
        assert_eq!(handle.state(), ControllerState::Init);
        assert!(handle.execute(ControllerCommand::LeaveSession).await.is_err());

        handle
            .execute(ControllerCommand::SetKeyword("ABC".to_string()))
            .await
            .unwrap();
        assert_eq!(handle.status().policy.shared_keyword, "ABC");

        task.abort();
    }
}
