//! Sparring-mode state: the learner against the analysis engine.
//!
//! This core is synchronous and engine-agnostic: learner actions return the
//! protocol commands to send, and engine events are fed back in through the
//! `on_*` methods. The actor owns the channels; tests drive this directly.

use engine::advisor::{EvalTracker, MoveSignal};
use engine::{EngineCommand, Evaluation, GeneratedMove};
use goban::{Board, Color, Coord, Stone, Vertex};

use crate::session::StoneRecord;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SparringError {
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("the engine is thinking")]
    EngineThinking,
    #[error("engine disconnected")]
    Disconnected,
    #[error("finish the review first")]
    ReviewActive,
    #[error("no move pending confirmation")]
    NoProvisional,
    #[error("the game is over")]
    GameOver,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coaching overlay state after a blunder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    None,
    /// A blunder was flagged; the learner may ask for the best line.
    Alert,
    /// A best line is available for display.
    Hint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOutcome {
    pub winner: Color,
    pub reason: String,
}

/// Events surfaced to the UI collaborator.
#[derive(Debug, Clone)]
pub enum SparringEvent {
    StateChanged(SparringSnapshot),
    BlunderDetected {
        move_index: usize,
        magnitude: f64,
        score_loss: Option<f64>,
    },
    StrongMove {
        move_index: usize,
        magnitude: f64,
    },
    GameOver(GameOutcome),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct SparringSnapshot {
    pub stones: Vec<StoneRecord>,
    pub provisional: Option<(u8, u8)>,
    pub last_move: Option<(u8, u8)>,
    pub thinking: bool,
    pub connected: bool,
    pub review: ReviewStep,
    /// Engine-recommended continuation, numbered from one.
    pub best_line: Vec<StoneRecord>,
    /// Latest winrate for the learner's color.
    pub winrate: Option<f64>,
    pub score_lead: Option<f64>,
    pub move_count: usize,
    pub outcome: Option<GameOutcome>,
    pub feedback: String,
}

#[derive(Debug, Clone)]
pub struct SparringConfig {
    pub user_color: Color,
    /// Engine visit budget; doubles as the difficulty setting.
    pub visits: u32,
    pub hint_visits: u32,
}

impl Default for SparringConfig {
    fn default() -> Self {
        Self {
            user_color: Color::Black,
            visits: 50,
            hint_visits: 50,
        }
    }
}

pub struct SparringState {
    config: SparringConfig,
    board: Board,
    /// Placement order; parallel stack of board snapshots for undo.
    stones: Vec<Stone>,
    boards: Vec<Board>,
    provisional: Option<Coord>,
    thinking: bool,
    connected: bool,
    review: ReviewStep,
    best_line: Vec<Stone>,
    tracker: EvalTracker,
    /// Color the in-flight request analyzes for.
    analyzing: Color,
    /// Newest evaluation of the in-flight request; committed to the tracker
    /// when the engine's move arrives.
    pending_eval: Option<Evaluation>,
    /// A hint request is in flight; its evaluations feed the overlay, not
    /// the move history.
    awaiting_hint: bool,
    outcome: Option<GameOutcome>,
    feedback: String,
}

impl SparringState {
    pub fn new(config: SparringConfig) -> Self {
        let tracker = EvalTracker::new(config.user_color);
        let analyzing = config.user_color.opponent();
        Self {
            config,
            board: Board::default(),
            stones: Vec::new(),
            boards: Vec::new(),
            provisional: None,
            thinking: false,
            connected: false,
            review: ReviewStep::None,
            best_line: Vec::new(),
            tracker,
            analyzing,
            pending_eval: None,
            awaiting_hint: false,
            outcome: None,
            feedback: "Connecting to the engine...".to_string(),
        }
    }

    // ---- learner actions ----

    /// Stage a move for confirmation (two-step input).
    pub fn place_provisional(&mut self, coord: Coord) -> Result<(), SparringError> {
        self.check_input_allowed()?;
        if !coord.in_bounds(self.board.size()) {
            return Err(SparringError::IllegalMove(format!(
                "point ({}, {}) is outside the board",
                coord.col, coord.row
            )));
        }
        if self.board.get(coord).is_some() {
            return Err(SparringError::IllegalMove(format!(
                "point ({}, {}) is already occupied",
                coord.col, coord.row
            )));
        }
        self.provisional = Some(coord);
        Ok(())
    }

    pub fn cancel_provisional(&mut self) {
        self.provisional = None;
    }

    /// Commit the staged move: apply it locally and return the command pair
    /// to send (the move itself, then the engine's answer-and-analyze).
    pub fn confirm_move(&mut self) -> Result<Vec<EngineCommand>, SparringError> {
        self.check_input_allowed()?;
        let coord = self.provisional.take().ok_or(SparringError::NoProvisional)?;

        let stone = Stone::new(coord, self.config.user_color);
        let next = self
            .board
            .apply_move(stone)
            .map_err(|e| SparringError::IllegalMove(e.to_string()))?;
        self.push_board(next, stone);

        self.thinking = true;
        self.awaiting_hint = false;
        self.pending_eval = None;
        self.analyzing = self.config.user_color.opponent();
        self.feedback = "Engine is thinking...".to_string();

        Ok(vec![
            EngineCommand::Play {
                color: self.config.user_color,
                vertex: Vertex::Play(coord),
            },
            EngineCommand::GenerateMove {
                color: self.config.user_color.opponent(),
                visits: self.config.visits,
            },
        ])
    }

    /// Take back the last exchange (the engine's answer and the learner's
    /// move) and ask the engine for the correct line instead.
    pub fn undo(&mut self) -> Result<Vec<EngineCommand>, SparringError> {
        if !self.connected {
            return Err(SparringError::Disconnected);
        }
        if self.thinking {
            return Err(SparringError::EngineThinking);
        }
        if self.stones.is_empty() {
            return Err(SparringError::IllegalMove("nothing to undo".to_string()));
        }

        let mut undos = 0;
        // The engine's reply sits on top; take it and the learner's move.
        if self
            .stones
            .last()
            .is_some_and(|s| s.color != self.config.user_color)
        {
            self.pop_board();
            undos += 1;
        }
        if self
            .stones
            .last()
            .is_some_and(|s| s.color == self.config.user_color)
        {
            self.pop_board();
            undos += 1;
        }
        self.tracker.pop();
        self.review = ReviewStep::None;
        self.best_line.clear();
        self.outcome = None;
        self.thinking = true;
        self.awaiting_hint = true;
        self.analyzing = self.config.user_color;
        self.feedback = "Move taken back. Analyzing the correct line...".to_string();

        let mut commands = vec![EngineCommand::Undo; undos];
        commands.push(EngineCommand::Analyze {
            color: self.config.user_color,
            visits: self.config.hint_visits,
        });
        Ok(commands)
    }

    /// Clear the review overlay once the learner has seen it.
    pub fn dismiss_review(&mut self) {
        self.review = ReviewStep::None;
        self.best_line.clear();
    }

    /// Start a new game.
    pub fn reset(&mut self) -> Vec<EngineCommand> {
        self.board = Board::default();
        self.stones.clear();
        self.boards.clear();
        self.provisional = None;
        self.thinking = false;
        self.review = ReviewStep::None;
        self.best_line.clear();
        self.tracker.reset();
        self.pending_eval = None;
        self.awaiting_hint = false;
        self.outcome = None;
        self.feedback = "New game.".to_string();
        vec![
            EngineCommand::ClearBoard,
            EngineCommand::SetMaxVisits(self.config.visits),
        ]
    }

    // ---- engine events ----

    /// The engine answered a generate request.
    pub fn on_engine_move(&mut self, mv: GeneratedMove) -> Vec<SparringEvent> {
        self.thinking = false;
        let mut events = Vec::new();

        // Commit the final evaluation for the exchange that just ended.
        if let Some(eval) = self.pending_eval.take() {
            if let Some(winrate) = eval.winrate {
                match self.tracker.record(self.analyzing, winrate, eval.score_lead) {
                    Some(MoveSignal::Blunder {
                        move_index,
                        magnitude,
                        score_loss,
                    }) => {
                        self.review = ReviewStep::Alert;
                        self.feedback = format!(
                            "Blunder! Winrate dropped {:.1}%.",
                            magnitude * 100.0
                        );
                        events.push(SparringEvent::BlunderDetected {
                            move_index,
                            magnitude,
                            score_loss,
                        });
                    }
                    Some(MoveSignal::Strong {
                        move_index,
                        magnitude,
                    }) => {
                        self.feedback = "Excellent move!".to_string();
                        events.push(SparringEvent::StrongMove {
                            move_index,
                            magnitude,
                        });
                    }
                    None => {
                        if self.tracker.history().len() == 1 {
                            self.feedback = "Engine calibrated.".to_string();
                        } else {
                            self.feedback = "Game in progress.".to_string();
                        }
                    }
                }
            }
        }

        match mv {
            GeneratedMove::Resign => {
                let outcome = GameOutcome {
                    winner: self.config.user_color,
                    reason: "Engine resigned".to_string(),
                };
                self.outcome = Some(outcome.clone());
                self.feedback = "The engine resigns!".to_string();
                events.push(SparringEvent::GameOver(outcome));
            }
            GeneratedMove::Vertex(Vertex::Pass) => {
                self.feedback = "The engine passes.".to_string();
            }
            GeneratedMove::Vertex(Vertex::Play(coord)) => {
                // Trust nothing: verify the point before placing.
                if self.board.get(coord).is_some() {
                    tracing::error!("Engine played an occupied point: {:?}", coord);
                    events.push(SparringEvent::Error(
                        "Engine answered with an occupied point".to_string(),
                    ));
                } else {
                    let stone = Stone::new(coord, self.config.user_color.opponent());
                    match self.board.apply_move(stone) {
                        Ok(next) => self.push_board(next, stone),
                        Err(e) => {
                            tracing::error!("Engine move rejected: {}", e);
                            events.push(SparringEvent::Error(format!(
                                "Engine move rejected: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        events
    }

    /// One streamed evaluation sample. The newest one wins; it is committed
    /// when the move arrives, or straight to the overlay for hints.
    pub fn on_evaluation(&mut self, eval: Evaluation) {
        if !eval.pv.is_empty() {
            self.best_line = pv_stones(&eval.pv, self.analyzing);
        }
        if self.awaiting_hint {
            if self.review != ReviewStep::Hint && !self.best_line.is_empty() {
                self.review = ReviewStep::Hint;
                self.thinking = false;
                self.feedback = "Correct line ready.".to_string();
            }
            return;
        }
        if eval.winrate.is_some() {
            self.pending_eval = Some(eval);
        }
    }

    pub fn on_timeout(&mut self) {
        self.thinking = false;
        self.pending_eval = None;
        self.feedback = "Engine timed out. Please try again.".to_string();
    }

    pub fn on_connected(&mut self) {
        self.connected = true;
        self.feedback = "Engine connected.".to_string();
    }

    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.thinking = false;
        self.pending_eval = None;
        self.feedback = "Connection lost. Reconnecting...".to_string();
    }

    /// Commands that bring a freshly (re)connected engine up to date with
    /// the local board.
    pub fn resync_commands(&self) -> Vec<EngineCommand> {
        let mut commands = vec![
            EngineCommand::ClearBoard,
            EngineCommand::SetMaxVisits(self.config.visits),
        ];
        commands.extend(self.stones.iter().map(|stone| EngineCommand::Play {
            color: stone.color,
            vertex: Vertex::Play(stone.coord),
        }));
        commands
    }

    pub fn snapshot(&self) -> SparringSnapshot {
        SparringSnapshot {
            stones: self.visible_stones(),
            provisional: self.provisional.map(|c| (c.col, c.row)),
            last_move: self.stones.last().map(|s| (s.coord.col, s.coord.row)),
            thinking: self.thinking,
            connected: self.connected,
            review: self.review,
            best_line: self
                .best_line
                .iter()
                .enumerate()
                .map(|(i, stone)| StoneRecord {
                    col: stone.coord.col,
                    row: stone.coord.row,
                    color: stone.color,
                    move_number: Some(i as u32 + 1),
                })
                .collect(),
            winrate: self.tracker.latest().map(|p| p.winrate),
            score_lead: self.tracker.latest().and_then(|p| p.score_lead),
            move_count: self.stones.len(),
            outcome: self.outcome.clone(),
            feedback: self.feedback.clone(),
        }
    }

    // ---- internals ----

    fn check_input_allowed(&self) -> Result<(), SparringError> {
        if self.outcome.is_some() {
            return Err(SparringError::GameOver);
        }
        if !self.connected {
            return Err(SparringError::Disconnected);
        }
        if self.thinking {
            return Err(SparringError::EngineThinking);
        }
        if self.review != ReviewStep::None {
            return Err(SparringError::ReviewActive);
        }
        Ok(())
    }

    fn push_board(&mut self, next: Board, stone: Stone) {
        self.boards.push(std::mem::replace(&mut self.board, next));
        self.stones.push(stone);
    }

    fn pop_board(&mut self) {
        if let (Some(previous), Some(_)) = (self.boards.pop(), self.stones.pop()) {
            self.board = previous;
        }
    }

    fn visible_stones(&self) -> Vec<StoneRecord> {
        let mut records: Vec<StoneRecord> = Vec::with_capacity(self.stones.len());
        for (index, stone) in self.stones.iter().enumerate() {
            if self.board.get(stone.coord) != Some(stone.color) {
                continue;
            }
            records.retain(|r| (r.col, r.row) != (stone.coord.col, stone.coord.row));
            records.push(StoneRecord {
                col: stone.coord.col,
                row: stone.coord.row,
                color: stone.color,
                move_number: Some(index as u32 + 1),
            });
        }
        records
    }
}

/// Expand a principal variation into stones, colors alternating from the
/// analyzed color. Passes end the displayable line.
fn pv_stones(pv: &[Vertex], first_color: Color) -> Vec<Stone> {
    let mut color = first_color;
    let mut stones = Vec::with_capacity(pv.len());
    for vertex in pv {
        match vertex {
            Vertex::Play(coord) => stones.push(Stone::new(*coord, color)),
            Vertex::Pass => break,
        }
        color = color.opponent();
    }
    stones
}
