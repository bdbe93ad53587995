//! The sparring actor: wires a [`SparringState`] to the engine's command
//! and event channels and broadcasts snapshots to subscribers.
//!
//! The engine side is just a channel pair, so tests (and a mock mode) can
//! substitute a scripted engine for the real process client.

use engine::{EngineCommand, EngineEvent};
use goban::Coord;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::Instrument;

use super::state::{SparringError, SparringEvent, SparringSnapshot, SparringState};

pub enum SparringCommand {
    PlaceProvisional {
        coord: Coord,
        reply: oneshot::Sender<Result<SparringSnapshot, SparringError>>,
    },
    ConfirmMove {
        reply: oneshot::Sender<Result<SparringSnapshot, SparringError>>,
    },
    CancelMove {
        reply: oneshot::Sender<SparringSnapshot>,
    },
    Undo {
        reply: oneshot::Sender<Result<SparringSnapshot, SparringError>>,
    },
    DismissReview {
        reply: oneshot::Sender<SparringSnapshot>,
    },
    Reset {
        reply: oneshot::Sender<SparringSnapshot>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SparringSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SparringSnapshot, broadcast::Receiver<SparringEvent>)>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to a sparring actor.
#[derive(Clone)]
pub struct SparringHandle {
    cmd_tx: mpsc::Sender<SparringCommand>,
}

impl SparringHandle {
    pub async fn place_provisional(
        &self,
        coord: Coord,
    ) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::PlaceProvisional { coord, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))?
    }

    pub async fn confirm_move(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::ConfirmMove { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))?
    }

    pub async fn cancel_move(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::CancelMove { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))
    }

    pub async fn undo(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::Undo { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))?
    }

    pub async fn dismiss_review(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::DismissReview { reply: tx })
            .await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))
    }

    pub async fn reset(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::Reset { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))
    }

    pub async fn get_snapshot(&self) -> Result<SparringSnapshot, SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(SparringSnapshot, broadcast::Receiver<SparringEvent>), SparringError> {
        let (tx, rx) = oneshot::channel();
        self.send(SparringCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SparringError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SparringCommand::Shutdown).await;
    }

    async fn send(&self, cmd: SparringCommand) -> Result<(), SparringError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SparringError::Disconnected)
    }
}

/// Spawn a sparring actor over the given engine channel pair. Returns the
/// handle for learner actions.
pub fn spawn_sparring_actor(
    state: SparringState,
    engine_tx: mpsc::Sender<EngineCommand>,
    engine_rx: mpsc::Receiver<EngineEvent>,
) -> SparringHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);
    tokio::spawn(
        run_sparring_actor(state, engine_tx, engine_rx, cmd_rx, event_tx)
            .instrument(tracing::info_span!("sparring")),
    );
    SparringHandle { cmd_tx }
}

async fn run_sparring_actor(
    mut state: SparringState,
    engine_tx: mpsc::Sender<EngineCommand>,
    mut engine_rx: mpsc::Receiver<EngineEvent>,
    mut cmd_rx: mpsc::Receiver<SparringCommand>,
    event_tx: broadcast::Sender<SparringEvent>,
) {
    tracing::info!("Sparring actor started");

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SparringCommand::Shutdown) | None => {
                        let _ = engine_tx.send(EngineCommand::Quit).await;
                        tracing::info!("Sparring actor shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut state, cmd, &engine_tx, &event_tx).await;
                    }
                }
            }

            event = engine_rx.recv() => {
                match event {
                    Some(event) => {
                        handle_engine_event(&mut state, event, &engine_tx, &event_tx).await;
                    }
                    None => {
                        // Supervisor gone; nothing left to drive.
                        tracing::warn!("Engine event channel closed");
                        state.on_disconnected();
                        let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Sparring actor exited");
}

async fn handle_command(
    state: &mut SparringState,
    cmd: SparringCommand,
    engine_tx: &mpsc::Sender<EngineCommand>,
    event_tx: &broadcast::Sender<SparringEvent>,
) {
    match cmd {
        SparringCommand::PlaceProvisional { coord, reply } => {
            let result = state.place_provisional(coord).map(|_| state.snapshot());
            let _ = reply.send(result);
        }
        SparringCommand::ConfirmMove { reply } => {
            let result = match state.confirm_move() {
                Ok(commands) => {
                    send_all(engine_tx, commands).await;
                    let snapshot = state.snapshot();
                    let _ = event_tx.send(SparringEvent::StateChanged(snapshot.clone()));
                    Ok(snapshot)
                }
                Err(e) => Err(e),
            };
            let _ = reply.send(result);
        }
        SparringCommand::CancelMove { reply } => {
            state.cancel_provisional();
            let _ = reply.send(state.snapshot());
        }
        SparringCommand::Undo { reply } => {
            let result = match state.undo() {
                Ok(commands) => {
                    send_all(engine_tx, commands).await;
                    let snapshot = state.snapshot();
                    let _ = event_tx.send(SparringEvent::StateChanged(snapshot.clone()));
                    Ok(snapshot)
                }
                Err(e) => Err(e),
            };
            let _ = reply.send(result);
        }
        SparringCommand::DismissReview { reply } => {
            state.dismiss_review();
            let snapshot = state.snapshot();
            let _ = event_tx.send(SparringEvent::StateChanged(snapshot.clone()));
            let _ = reply.send(snapshot);
        }
        SparringCommand::Reset { reply } => {
            let commands = state.reset();
            send_all(engine_tx, commands).await;
            let snapshot = state.snapshot();
            let _ = event_tx.send(SparringEvent::StateChanged(snapshot.clone()));
            let _ = reply.send(snapshot);
        }
        SparringCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SparringCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SparringCommand::Shutdown => unreachable!(),
    }
}

async fn handle_engine_event(
    state: &mut SparringState,
    event: EngineEvent,
    engine_tx: &mpsc::Sender<EngineCommand>,
    event_tx: &broadcast::Sender<SparringEvent>,
) {
    match event {
        EngineEvent::MoveGenerated(mv) => {
            for event in state.on_engine_move(mv) {
                let _ = event_tx.send(event);
            }
            let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Evaluation(eval) => {
            state.on_evaluation(eval);
            let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Timeout => {
            state.on_timeout();
            let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Connected => {
            state.on_connected();
            // Bring the fresh engine up to date with the local board.
            send_all(engine_tx, state.resync_commands()).await;
            let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Disconnected => {
            state.on_disconnected();
            let _ = event_tx.send(SparringEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Error(e) => {
            tracing::warn!("Engine error: {}", e);
            let _ = event_tx.send(SparringEvent::Error(e));
        }
        EngineEvent::Ready | EngineEvent::RawGtpMessage { .. } => {}
    }
}

async fn send_all(engine_tx: &mpsc::Sender<EngineCommand>, commands: Vec<EngineCommand>) {
    for command in commands {
        if engine_tx.send(command).await.is_err() {
            tracing::warn!("Engine command channel closed");
            break;
        }
    }
}
