//! Internal mutable state, owned entirely by the session actor. No locks.
//!
//! All time-dependent operations take `now` as an argument; the actor passes
//! the real clock and tests pass a fabricated one. Scheduled playback lives
//! in an explicit step queue with a single `on_tick` advance operation, so
//! replacing the problem (a new state) can never leave a stale timer behind.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use goban::{Board, Color, Coord, GameTree, NodeId, Stone};

use crate::persistence::{MistakeRecord, MistakeStore};
use crate::problem::ProblemRecord;

use super::commands::{SessionConfig, SessionError};
use super::snapshot::{Phase, SessionSnapshot, StoneRecord};

/// Restore point for refutation rollback.
#[derive(Debug, Clone)]
struct Frame {
    board: Board,
    cursor: NodeId,
    to_play: Color,
    stones_len: usize,
    last_move: Option<Coord>,
}

#[derive(Debug)]
enum PlaybackKind {
    Demo,
    /// Opponent auto-responses after a correct learner move.
    Response,
    /// Punishment line after an inferior variation; rolls back when done.
    Refutation { rollback: Frame },
    /// Forced full-solution replay; always ends `Solved`.
    Solution,
}

/// A scheduled sequence of single-step mutations.
#[derive(Debug)]
struct Playback {
    kind: PlaybackKind,
    steps: VecDeque<NodeId>,
    due: Instant,
    interval: Duration,
}

pub(crate) struct TrainingState {
    pub session_id: String,
    pub problem_id: String,
    title: Option<String>,
    config: SessionConfig,
    store: Arc<dyn MistakeStore>,

    tree: GameTree,
    cursor: NodeId,
    board: Board,
    /// Placement order: setup stones first, then moves. Captured stones stay
    /// listed but are filtered out against the board when rendering.
    stones: Vec<Stone>,
    setup_len: usize,

    user_color: Color,
    initial_to_play: Color,
    to_play: Color,
    phase: Phase,
    mistakes: u32,
    feedback: String,
    last_move: Option<Coord>,
    rejected: Option<Coord>,

    lockout_until: Option<Instant>,
    /// Lockout to apply once the current refutation finishes.
    pending_lockout: Option<Duration>,
    playback: Option<Playback>,
}

impl TrainingState {
    /// Parse the problem, place its setup stones, record the attempt in the
    /// store, and start the demonstration.
    pub fn new(
        session_id: String,
        problem: &ProblemRecord,
        config: SessionConfig,
        store: Arc<dyn MistakeStore>,
        now: Instant,
    ) -> Result<Self, SessionError> {
        let tree = goban::parse(&problem.record_text)
            .map_err(|e| SessionError::InvalidRecord(e.to_string()))?;

        let mut board = Board::default();
        let setup = tree.setup_stones();
        for stone in &setup {
            if let Err(e) = board.place_setup(*stone) {
                tracing::warn!("Skipping setup stone: {}", e);
            }
        }

        let root_props = &tree.node(tree.root()).props;
        let initial_to_play = root_props.player_to_play.unwrap_or(Color::Black);
        let user_color = config.user_color.unwrap_or(initial_to_play);
        let title = tree.title().map(|t| t.to_string());

        record_attempt(&store, &problem.id);

        let setup_len = setup.len();
        let mut state = Self {
            session_id,
            problem_id: problem.id.clone(),
            title,
            config,
            store,
            cursor: tree.root(),
            tree,
            board,
            stones: setup,
            setup_len,
            user_color,
            initial_to_play,
            to_play: initial_to_play,
            phase: Phase::Demo,
            mistakes: 0,
            feedback: format!("Demonstrating: {}", problem.title),
            last_move: None,
            rejected: None,
            lockout_until: None,
            pending_lockout: None,
            playback: None,
        };
        state.begin_demo(now);
        Ok(state)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Earliest instant at which `on_tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let playback = self.playback.as_ref().map(|p| p.due);
        match (playback, self.lockout_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance due playback and expired lockouts. Returns true if anything
    /// changed.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if self.lockout_until.is_some_and(|t| now >= t) {
            self.lockout_until = None;
            if self.phase == Phase::Locked {
                self.phase = Phase::Practicing;
                self.feedback = "Lock expired. Try again.".to_string();
            }
            changed = true;
        }

        if self.playback.as_ref().is_some_and(|p| now >= p.due) {
            self.advance_playback(now);
            changed = true;
        }

        changed
    }

    /// One learner action. Classifies the move against the current node's
    /// children, restricted to the learner's color.
    pub fn attempt_move(&mut self, coord: Coord, now: Instant) -> Result<(), SessionError> {
        self.rejected = None;
        self.refresh_lockout(now);

        if let Some(until) = self.lockout_until {
            return Err(SessionError::Locked(remaining_ms(until, now)));
        }
        if self.phase != Phase::Practicing {
            return Err(SessionError::InvalidPhase(format!("{:?}", self.phase)));
        }
        if self.playback.is_some() {
            // The opponent's response is still being played out.
            return Err(SessionError::InvalidPhase("Responding".to_string()));
        }
        if !coord.in_bounds(self.board.size()) {
            return Err(SessionError::IllegalMove(format!(
                "point ({}, {}) is outside the board",
                coord.col, coord.row
            )));
        }
        if self.board.get(coord).is_some() {
            self.feedback = "That point is occupied.".to_string();
            return Err(SessionError::IllegalMove(format!(
                "point ({}, {}) is already occupied",
                coord.col, coord.row
            )));
        }

        match self.tree.find_child_move(self.cursor, self.user_color, coord) {
            Some((child, is_main)) => self.play_recorded_move(child, is_main, coord, now),
            None => {
                // Not in the book: reject without touching the board.
                self.rejected = Some(coord);
                self.feedback = "Not a recorded move here.".to_string();
                self.register_mistake(now, true);
                Ok(())
            }
        }
    }

    fn play_recorded_move(
        &mut self,
        child: NodeId,
        is_main: bool,
        coord: Coord,
        now: Instant,
    ) -> Result<(), SessionError> {
        let stone = Stone::new(coord, self.user_color);
        // Illegal on the board (suicide) is rejected before any mutation and
        // is not a mistake; the record simply cannot be followed there.
        let next = self
            .board
            .apply_move(stone)
            .map_err(|e| SessionError::IllegalMove(e.to_string()))?;

        let frame = self.frame();
        self.board = next;
        self.stones.push(stone);
        self.cursor = child;
        self.to_play = self.user_color.opponent();
        self.last_move = Some(coord);
        if let Some(comment) = &self.tree.node(child).props.comment {
            self.feedback = comment.clone();
        }

        if self.tree.is_leaf(child) {
            self.classify_leaf(child);
            if !is_main && self.phase == Phase::Wrong {
                self.register_mistake(now, true);
            }
            return Ok(());
        }

        if is_main {
            if self.tree.node(child).props.comment.is_none() {
                self.feedback = "Correct.".to_string();
            }
            self.queue_responses(now);
        } else {
            self.register_mistake(now, false);
            if self.phase == Phase::Replaying {
                // Third mistake: solution playback already took over.
                return Ok(());
            }
            let steps = self
                .tree
                .first_child_chain(child, self.config.refutation_ply_cap, |_| true);
            if steps.is_empty() {
                // Nothing recorded to punish with; restore immediately.
                self.rollback_to(frame);
                self.resume_after_rollback(now);
            } else {
                self.phase = Phase::Refuting;
                if self.tree.node(child).props.comment.is_none() {
                    self.feedback = "Inferior move. Watch the refutation.".to_string();
                }
                self.playback = Some(Playback {
                    kind: PlaybackKind::Refutation { rollback: frame },
                    steps: steps.into(),
                    due: now + self.config.refutation_interval,
                    interval: self.config.refutation_interval,
                });
            }
        }
        Ok(())
    }

    /// Leave the demonstration (or a finished attempt) and start practicing,
    /// optionally switching sides.
    pub fn start_practice(&mut self, color: Option<Color>, now: Instant) -> Result<(), SessionError> {
        match self.phase {
            Phase::Demo | Phase::Practicing | Phase::Solved | Phase::Wrong => {}
            Phase::Refuting | Phase::Locked | Phase::Replaying => {
                return Err(SessionError::InvalidPhase(format!("{:?}", self.phase)));
            }
        }
        if let Some(color) = color {
            self.user_color = color;
        }
        self.reset_to_setup();
        self.phase = Phase::Practicing;
        self.feedback = if self.user_color == self.initial_to_play {
            "Your move.".to_string()
        } else {
            "Roles swapped: the opener will be played for you.".to_string()
        };
        self.queue_responses(now);
        Ok(())
    }

    /// Reset the board for another try at the same problem. The mistake
    /// counter is per-problem and survives retries.
    pub fn retry(&mut self, now: Instant) -> Result<(), SessionError> {
        self.refresh_lockout(now);
        if let Some(until) = self.lockout_until {
            return Err(SessionError::Locked(remaining_ms(until, now)));
        }
        match self.phase {
            Phase::Practicing | Phase::Solved | Phase::Wrong | Phase::Locked => {}
            Phase::Demo | Phase::Refuting | Phase::Replaying => {
                return Err(SessionError::InvalidPhase(format!("{:?}", self.phase)));
            }
        }
        self.reset_to_setup();
        self.phase = Phase::Practicing;
        self.feedback = "Back to the start. Try again.".to_string();
        self.queue_responses(now);
        Ok(())
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            problem_id: self.problem_id.clone(),
            title: self.title.clone(),
            phase: self.phase,
            feedback: self.feedback.clone(),
            stones: self.visible_stones(),
            last_move: self.last_move.map(|c| (c.col, c.row)),
            rejected_move: self.rejected.map(|c| (c.col, c.row)),
            to_play: self.to_play,
            user_color: self.user_color,
            mistakes: self.mistakes,
            lockout_remaining_ms: self
                .lockout_until
                .map_or(0, |until| remaining_ms(until, now)),
            move_count: self.stones.len() - self.setup_len,
        }
    }

    // ---- internals ----

    fn begin_demo(&mut self, now: Instant) {
        let steps = self.tree.main_line();
        if steps.is_empty() {
            self.feedback = "This record has no moves to demonstrate.".to_string();
            return;
        }
        self.playback = Some(Playback {
            kind: PlaybackKind::Demo,
            steps: steps.into(),
            due: now + self.config.demo_interval,
            interval: self.config.demo_interval,
        });
    }

    /// Queue the opponent's recorded answers: first children are followed
    /// while they belong to the opponent, so multi-move responses play out
    /// one scheduled step at a time.
    fn queue_responses(&mut self, now: Instant) {
        let user = self.user_color;
        let steps = self.tree.first_child_chain(self.cursor, usize::MAX, |node| {
            matches!(node.props.mv, Some((color, _)) if color != user)
        });
        if steps.is_empty() {
            return;
        }
        self.playback = Some(Playback {
            kind: PlaybackKind::Response,
            steps: steps.into(),
            due: now + self.config.response_delay,
            interval: self.config.response_delay,
        });
    }

    fn advance_playback(&mut self, now: Instant) {
        let Some(mut playback) = self.playback.take() else {
            return;
        };
        if let Some(step) = playback.steps.pop_front() {
            self.apply_node(step);
        }
        if playback.steps.is_empty() {
            self.finish_playback(playback.kind, now);
        } else {
            playback.due = now + playback.interval;
            self.playback = Some(playback);
        }
    }

    fn finish_playback(&mut self, kind: PlaybackKind, now: Instant) {
        match kind {
            PlaybackKind::Demo => {
                self.feedback = "Demonstration finished. Ready to practice?".to_string();
            }
            PlaybackKind::Response => {
                if self.tree.is_leaf(self.cursor) {
                    self.classify_leaf(self.cursor);
                } else {
                    self.feedback = "Your move.".to_string();
                }
            }
            PlaybackKind::Refutation { rollback } => {
                self.rollback_to(rollback);
                self.resume_after_rollback(now);
            }
            PlaybackKind::Solution => {
                self.phase = Phase::Solved;
                self.feedback = "Solution shown. Moving on.".to_string();
            }
        }
    }

    /// Apply one recorded node: push its stone through the board engine (a
    /// pass or annotation-only node just advances the cursor) and surface
    /// its annotation.
    fn apply_node(&mut self, id: NodeId) {
        if let Some(stone) = self.tree.move_at(id) {
            match self.board.apply_move(stone) {
                Ok(next) => {
                    self.board = next;
                    self.stones.push(stone);
                    self.last_move = Some(stone.coord);
                }
                Err(e) => {
                    // The record depends on a move the rules reject (for
                    // example a suicide). Flag it rather than corrupt state.
                    tracing::warn!(problem = %self.problem_id, "Record relies on illegal move: {}", e);
                }
            }
        }
        if let Some((color, _)) = self.tree.node(id).props.mv {
            self.to_play = color.opponent();
        }
        if let Some(comment) = &self.tree.node(id).props.comment {
            self.feedback = comment.clone();
        }
        self.cursor = id;
    }

    fn classify_leaf(&mut self, id: NodeId) {
        let comment = self.tree.node(id).props.comment.clone();
        let failed = comment
            .as_deref()
            .map(|c| {
                self.config
                    .failure_markers
                    .iter()
                    .any(|marker| c.contains(marker.as_str()))
            })
            .unwrap_or(false);
        if failed {
            self.phase = Phase::Wrong;
            self.feedback = comment.unwrap_or_else(|| "This line is recorded as a failure.".to_string());
        } else {
            self.phase = Phase::Solved;
            self.feedback = comment.unwrap_or_else(|| "Solved.".to_string());
            self.record_solved();
        }
    }

    /// Escalate one mistake: first a short lockout, second a longer one plus
    /// permanent mistake-set enrollment, third the forced solution replay.
    /// `immediate` locks right away; otherwise the lockout waits for the
    /// running refutation to finish.
    fn register_mistake(&mut self, now: Instant, immediate: bool) {
        self.mistakes += 1;
        match self.mistakes {
            1 => self.schedule_lockout(self.config.first_lockout, immediate, now),
            2 => {
                self.flag_in_mistake_set();
                self.schedule_lockout(self.config.second_lockout, immediate, now);
            }
            _ => self.begin_solution(now),
        }
    }

    fn schedule_lockout(&mut self, duration: Duration, immediate: bool, now: Instant) {
        if immediate {
            self.lock(duration, now);
        } else {
            self.pending_lockout = Some(duration);
        }
    }

    fn lock(&mut self, duration: Duration, now: Instant) {
        if duration.is_zero() {
            return;
        }
        self.lockout_until = Some(now + duration);
        if self.phase == Phase::Practicing {
            self.phase = Phase::Locked;
        }
    }

    fn refresh_lockout(&mut self, now: Instant) {
        if self.lockout_until.is_some_and(|t| now >= t) {
            self.lockout_until = None;
            if self.phase == Phase::Locked {
                self.phase = Phase::Practicing;
            }
        }
    }

    fn resume_after_rollback(&mut self, now: Instant) {
        self.phase = Phase::Practicing;
        self.feedback = "Position restored. Find the correct move.".to_string();
        if let Some(duration) = self.pending_lockout.take() {
            self.lock(duration, now);
        }
    }

    /// Third-mistake path: reset to the setup position and replay the whole
    /// canonical line, so the session always terminates.
    fn begin_solution(&mut self, now: Instant) {
        self.pending_lockout = None;
        self.lockout_until = None;
        self.reset_to_setup();
        self.phase = Phase::Replaying;
        self.feedback = "Too many mistakes. Watch the full solution.".to_string();
        let steps = self.tree.main_line();
        if steps.is_empty() {
            self.phase = Phase::Solved;
            return;
        }
        self.playback = Some(Playback {
            kind: PlaybackKind::Solution,
            steps: steps.into(),
            due: now + self.config.solution_interval,
            interval: self.config.solution_interval,
        });
    }

    fn reset_to_setup(&mut self) {
        let mut board = Board::default();
        for stone in &self.stones[..self.setup_len] {
            // Setup stones were placed once already; bounds cannot fail now.
            let _ = board.place_setup(*stone);
        }
        self.board = board;
        self.stones.truncate(self.setup_len);
        self.cursor = self.tree.root();
        self.to_play = self.initial_to_play;
        self.last_move = None;
        self.rejected = None;
        self.playback = None;
    }

    fn rollback_to(&mut self, frame: Frame) {
        self.board = frame.board;
        self.cursor = frame.cursor;
        self.to_play = frame.to_play;
        self.stones.truncate(frame.stones_len);
        self.last_move = frame.last_move;
    }

    fn frame(&self) -> Frame {
        Frame {
            board: self.board.clone(),
            cursor: self.cursor,
            to_play: self.to_play,
            stones_len: self.stones.len(),
            last_move: self.last_move,
        }
    }

    /// Stones still on the board, in placement order, numbered from the
    /// first non-setup move. Captured placements are filtered out against
    /// the current board.
    fn visible_stones(&self) -> Vec<StoneRecord> {
        let mut records: Vec<StoneRecord> = Vec::with_capacity(self.stones.len());
        for (index, stone) in self.stones.iter().enumerate() {
            if self.board.get(stone.coord) != Some(stone.color) {
                continue;
            }
            let move_number = index
                .checked_sub(self.setup_len)
                .map(|n| n as u32 + 1);
            // A recaptured point keeps only its latest placement.
            records.retain(|r| (r.col, r.row) != (stone.coord.col, stone.coord.row));
            records.push(StoneRecord {
                col: stone.coord.col,
                row: stone.coord.row,
                color: stone.color,
                move_number,
            });
        }
        records
    }

    fn record_solved(&mut self) {
        match self.store.get(&self.problem_id) {
            Ok(record) => {
                let mut record =
                    record.unwrap_or_else(|| MistakeRecord::new(self.problem_id.clone()));
                record.solved += 1;
                if let Err(e) = self.store.put(&record) {
                    tracing::warn!("Failed to record solve: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to read progress record: {}", e),
        }
    }

    fn flag_in_mistake_set(&mut self) {
        match self.store.get(&self.problem_id) {
            Ok(record) => {
                let mut record =
                    record.unwrap_or_else(|| MistakeRecord::new(self.problem_id.clone()));
                record.flagged = true;
                if let Err(e) = self.store.put(&record) {
                    tracing::warn!("Failed to flag problem: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to read progress record: {}", e),
        }
    }
}

fn record_attempt(store: &Arc<dyn MistakeStore>, problem_id: &str) {
    match store.get(problem_id) {
        Ok(record) => {
            let mut record = record.unwrap_or_else(|| MistakeRecord::new(problem_id));
            record.attempts += 1;
            if let Err(e) = store.put(&record) {
                tracing::warn!("Failed to record attempt: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to read progress record: {}", e),
    }
}

fn remaining_ms(until: Instant, now: Instant) -> u64 {
    until.saturating_duration_since(now).as_millis() as u64
}
