//! Read-only session state exposed to the UI collaborator.

use goban::Color;

/// Controller phase.
///
/// `Demo` auto-advances the canonical line; once its playback is exhausted
/// the session is awaiting the learner's start. `Replaying` is the forced
/// solution playback after repeated mistakes and always ends in `Solved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Demo,
    Practicing,
    Refuting,
    Locked,
    Replaying,
    Solved,
    Wrong,
}

/// A stone for rendering. Setup stones carry no move number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoneRecord {
    pub col: u8,
    pub row: u8,
    pub color: Color,
    pub move_number: Option<u32>,
}

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub problem_id: String,
    pub title: Option<String>,
    pub phase: Phase,
    pub feedback: String,
    pub stones: Vec<StoneRecord>,
    pub last_move: Option<(u8, u8)>,
    /// The most recently rejected attempt, for the UI's wrong-move flash.
    pub rejected_move: Option<(u8, u8)>,
    pub to_play: Color,
    pub user_color: Color,
    pub mistakes: u32,
    /// Milliseconds until input unlocks; zero when not locked.
    pub lockout_remaining_ms: u64,
    /// Moves played on top of the setup stones.
    pub move_count: usize,
}
