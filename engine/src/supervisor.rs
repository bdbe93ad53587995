//! Connection supervision for the engine process.
//!
//! [`EngineClient`] wraps a [`KatagoEngine`] in an owning task that restarts
//! the process when it dies, enforces a single in-flight analysis request,
//! and times out unanswered move requests so the caller's input never stays
//! locked. Spawn attempts run inline in the supervisor loop, so a reconnect
//! can never start while a connection is open or another attempt is pending.

use crate::katago::{KatagoConfig, KatagoEngine};
use crate::{EngineCommand, EngineEvent};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

const RECONNECT_INTERVAL: Duration = Duration::from_secs(3);
const MOVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Handle to a supervised engine connection.
pub struct EngineClient {
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineClient {
    /// Start the supervision task. The connection is established (and
    /// re-established) in the background; progress arrives as
    /// `Connected`/`Disconnected` events.
    pub fn connect(config: KatagoConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(64);
        tokio::spawn(run_supervisor(config, command_rx, event_tx));
        Self {
            command_tx,
            event_rx,
        }
    }

    pub async fn send_command(&self, cmd: EngineCommand) -> Result<(), String> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|e| format!("Failed to send command: {}", e))
    }

    /// Split into the raw channel pair. Used by controllers that drive the
    /// engine through plain channels (and by tests that substitute a
    /// scripted engine).
    pub fn into_channels(self) -> (mpsc::Sender<EngineCommand>, mpsc::Receiver<EngineEvent>) {
        (self.command_tx, self.event_rx)
    }

    pub async fn recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    pub fn try_recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn shutdown(self) {
        let _ = self.command_tx.send(EngineCommand::Quit).await;
    }
}

async fn run_supervisor(
    config: KatagoConfig,
    mut command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut engine: Option<KatagoEngine> = None;
    // A generate request is outstanding until its move arrives; no other
    // generate/analyze may be issued meanwhile. The protocol has no request
    // ids, so responses can only be matched by keeping one in flight.
    let mut pending_request = false;
    let mut request_deadline: Option<Instant> = None;
    let mut retry_at: Option<Instant> = None;

    loop {
        if engine.is_none() && retry_at.map_or(true, |t| Instant::now() >= t) {
            match KatagoEngine::spawn_with_config(config.clone()).await {
                Ok(e) => {
                    engine = Some(e);
                    retry_at = None;
                    let _ = event_tx.send(EngineEvent::Connected).await;
                }
                Err(e) => {
                    let first_failure = retry_at.is_none();
                    tracing::warn!("Engine connection failed: {}", e);
                    retry_at = Some(Instant::now() + RECONNECT_INTERVAL);
                    if first_failure {
                        let _ = event_tx.send(EngineEvent::Disconnected).await;
                    }
                }
            }
        }

        tokio::select! {
            biased;

            cmd = command_rx.recv() => {
                match cmd {
                    Some(EngineCommand::Quit) | None => {
                        if let Some(e) = engine.take() {
                            e.shutdown().await;
                        }
                        break;
                    }
                    Some(cmd) => {
                        let Some(e) = engine.as_ref() else {
                            tracing::warn!("Dropping command while disconnected: {:?}", cmd);
                            let _ = event_tx
                                .send(EngineEvent::Error("engine disconnected".to_string()))
                                .await;
                            continue;
                        };
                        let is_request = matches!(
                            cmd,
                            EngineCommand::GenerateMove { .. } | EngineCommand::Analyze { .. }
                        );
                        if is_request && pending_request {
                            tracing::warn!("Dropping request while one is in flight: {:?}", cmd);
                            continue;
                        }
                        // Only generate requests are answered with a move;
                        // an analyze request streams until the next command
                        // cancels it, so it never occupies the in-flight
                        // slot itself.
                        if matches!(cmd, EngineCommand::GenerateMove { .. }) {
                            pending_request = true;
                            request_deadline = Some(Instant::now() + MOVE_TIMEOUT);
                        }
                        if e.send_command(cmd).await.is_err() {
                            // Writer side is gone; the reader EOF will follow.
                            tracing::warn!("Engine command channel closed");
                        }
                    }
                }
            }

            event = next_engine_event(&mut engine) => {
                match event {
                    Some(EngineEvent::MoveGenerated(mv)) => {
                        pending_request = false;
                        request_deadline = None;
                        let _ = event_tx.send(EngineEvent::MoveGenerated(mv)).await;
                    }
                    Some(other) => {
                        let _ = event_tx.send(other).await;
                    }
                    None => {
                        // Process died: clear in-flight state, surface the
                        // status, and schedule a reconnect attempt.
                        let _ = engine.take();
                        pending_request = false;
                        request_deadline = None;
                        retry_at = Some(Instant::now() + RECONNECT_INTERVAL);
                        let _ = event_tx.send(EngineEvent::Disconnected).await;
                    }
                }
            }

            _ = sleep_until_opt(request_deadline) => {
                tracing::warn!("Move request timed out");
                pending_request = false;
                request_deadline = None;
                let _ = event_tx.send(EngineEvent::Timeout).await;
            }

            _ = sleep_until_opt(retry_at), if engine.is_none() => {
                // Fall through to the reconnect attempt at the top.
            }
        }
    }

    tracing::info!("Engine supervisor exited");
}

async fn next_engine_event(engine: &mut Option<KatagoEngine>) -> Option<EngineEvent> {
    match engine.as_mut() {
        Some(engine) => engine.recv_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Without a reachable engine binary the client must surface a
    /// disconnected status instead of failing construction.
    #[tokio::test]
    async fn test_missing_engine_reports_disconnected() {
        let config = KatagoConfig {
            executable: Some(PathBuf::from("/nonexistent/katago")),
            ..Default::default()
        };
        let mut client = EngineClient::connect(config);

        let event = tokio::time::timeout(Duration::from_secs(5), client.recv_event())
            .await
            .expect("supervisor should report a status");
        assert!(matches!(event, Some(EngineEvent::Disconnected)));

        client.shutdown().await;
    }
}
