//! Commands, errors and tunables for the session actor.

use goban::{Color, Coord};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("input locked for another {0} ms")]
    Locked(u64),
    #[error("no input accepted in the {0} phase")]
    InvalidPhase(String),
    #[error("problem record failed to parse: {0}")]
    InvalidRecord(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Controller tunables. Tests shrink the durations to zero so playback and
/// lockouts can be driven synchronously.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Color the learner plays. Defaults to the record's player-to-play
    /// property, else Black.
    pub user_color: Option<Color>,
    pub demo_interval: Duration,
    pub response_delay: Duration,
    pub refutation_interval: Duration,
    /// Maximum plies of a refutation shown before rolling back.
    pub refutation_ply_cap: usize,
    pub solution_interval: Duration,
    pub first_lockout: Duration,
    pub second_lockout: Duration,
    /// Substrings of a leaf annotation that mark the line as a failure.
    pub failure_markers: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_color: None,
            demo_interval: Duration::from_millis(1000),
            response_delay: Duration::from_millis(500),
            refutation_interval: Duration::from_millis(800),
            refutation_ply_cap: 5,
            solution_interval: Duration::from_millis(800),
            first_lockout: Duration::from_secs(10),
            second_lockout: Duration::from_secs(30),
            failure_markers: vec![
                "失败".to_string(),
                "Wrong".to_string(),
                "Failure".to_string(),
            ],
        }
    }
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub enum SessionCommand {
    /// One learner action: attempt a move at the given point.
    AttemptMove {
        coord: Coord,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// Leave the demonstration (or a finished attempt) and practice,
    /// optionally switching the learner's color.
    StartPractice {
        color: Option<Color>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// Reset the board to the setup position, keeping the mistake counter.
    Retry {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
