//! The session actor loop.
//!
//! Owns all mutable state. Processes commands and timer ticks sequentially;
//! playback steps and lockout expiry are driven by the tick, never by
//! detached timers, so dropping the actor cancels everything with it.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::Instrument;

use super::commands::SessionCommand;
use super::events::SessionEvent;
use super::snapshot::Phase;
use super::state::TrainingState;

const TICK_INTERVAL: time::Duration = time::Duration::from_millis(50);

pub(crate) async fn run_session_actor(
    state: TrainingState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner(
    mut state: TrainingState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    let mut tick = time::interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut last_phase = state.phase();

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut state, cmd, &event_tx);
                        last_phase = broadcast_classification(&state, last_phase, &event_tx);
                    }
                }
            }

            _ = tick.tick(), if state.next_deadline().is_some() => {
                let now = Instant::now();
                if state.on_tick(now) {
                    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot(now)));
                    last_phase = broadcast_classification(&state, last_phase, &event_tx);
                }
            }
        }
    }

    tracing::info!("Session actor exited");
}

fn handle_command(
    state: &mut TrainingState,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    let now = Instant::now();
    match cmd {
        SessionCommand::AttemptMove { coord, reply } => {
            let result = state.attempt_move(coord, now).map(|_| state.snapshot(now));
            if let Ok(ref snapshot) = result {
                let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            }
            let _ = reply.send(result);
        }
        SessionCommand::StartPractice { color, reply } => {
            let result = state
                .start_practice(color, now)
                .map(|_| state.snapshot(now));
            if let Ok(ref snapshot) = result {
                let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            }
            let _ = reply.send(result);
        }
        SessionCommand::Retry { reply } => {
            let result = state.retry(now).map(|_| state.snapshot(now));
            if let Ok(ref snapshot) = result {
                let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            }
            let _ = reply.send(result);
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot(now));
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot(now);
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

/// Emit the terminal classification event once per transition into a
/// terminal phase.
fn broadcast_classification(
    state: &TrainingState,
    last_phase: Phase,
    event_tx: &broadcast::Sender<SessionEvent>,
) -> Phase {
    let phase = state.phase();
    if phase != last_phase && matches!(phase, Phase::Solved | Phase::Wrong) {
        let _ = event_tx.send(SessionEvent::ProblemClassified {
            problem_id: state.problem_id.clone(),
            solved: phase == Phase::Solved,
        });
    }
    phase
}

#[cfg(test)]
mod tests {
    use super::super::commands::SessionConfig;
    use super::super::handle::SessionHandle;
    use super::*;
    use crate::persistence::MemoryMistakeStore;
    use crate::problem::ProblemRecord;
    use goban::Coord;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            demo_interval: Duration::ZERO,
            response_delay: Duration::ZERO,
            refutation_interval: Duration::ZERO,
            solution_interval: Duration::ZERO,
            first_lockout: Duration::ZERO,
            second_lockout: Duration::ZERO,
            ..Default::default()
        }
    }

    async fn spawn_test_actor(
        record_text: &str,
    ) -> (SessionHandle, broadcast::Receiver<SessionEvent>) {
        let store = Arc::new(MemoryMistakeStore::new());
        let problem = ProblemRecord {
            id: "p1".to_string(),
            title: "test".to_string(),
            record_text: record_text.to_string(),
            display_label: None,
        };
        let state = TrainingState::new(
            "test".to_string(),
            &problem,
            fast_config(),
            store,
            Instant::now(),
        )
        .unwrap();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = broadcast::channel(100);
        tokio::spawn(run_session_actor(state, cmd_rx, event_tx));
        (SessionHandle::new(cmd_tx), event_rx)
    }

    async fn wait_for_phase(handle: &SessionHandle, phase: Phase) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = handle.get_snapshot().await.unwrap();
                if snapshot.phase == phase {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase:?}"));
    }

    #[tokio::test]
    async fn test_attempt_move_via_actor() {
        let (handle, mut events) = spawn_test_actor("(;AB[aa];B[bb];W[cc])").await;
        handle.start_practice(None).await.unwrap();
        let snapshot = handle.attempt_move(Coord::new(1, 1)).await.unwrap();
        assert_eq!(snapshot.move_count, 1);

        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::StateChanged(_)));
    }

    #[tokio::test]
    async fn test_solved_classification_broadcast() {
        let (handle, mut events) = spawn_test_actor("(;AB[aa];B[bb];W[cc])").await;
        handle.start_practice(None).await.unwrap();
        handle.attempt_move(Coord::new(1, 1)).await.unwrap();

        wait_for_phase(&handle, Phase::Solved).await;

        let mut classified = None;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::ProblemClassified { problem_id, solved } = event {
                classified = Some((problem_id, solved));
            }
        }
        assert_eq!(classified, Some(("p1".to_string(), true)));
    }

    #[tokio::test]
    async fn test_subscribe_gets_initial_snapshot() {
        let (handle, _) = spawn_test_actor("(;AB[aa];B[bb])").await;
        let (snapshot, _rx) = handle.subscribe().await.unwrap();
        assert_eq!(snapshot.problem_id, "p1");
        assert_eq!(snapshot.mistakes, 0);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (handle, _) = spawn_test_actor("(;AB[aa];B[bb])").await;
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.get_snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_demo_advances_without_input() {
        let (handle, _) = spawn_test_actor("(;AB[aa];B[bb];W[cc])").await;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = handle.get_snapshot().await.unwrap();
                if snapshot.move_count == 2 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("demo should play both recorded moves");
    }
}
