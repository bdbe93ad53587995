pub mod advisor;
pub mod gtp;
pub mod katago;
pub mod supervisor;

pub use advisor::{EvalTracker, MoveSignal};
pub use gtp::{GtpError, GtpMessage};
pub use katago::{KatagoConfig, KatagoEngine};
pub use supervisor::EngineClient;

use goban::{Color, Vertex};

/// Commands sent to the analysis engine.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    ClearBoard,
    SetBoardSize(u8),
    SetKomi(f32),
    /// Ruleset name understood by the engine, e.g. "chinese".
    SetRules(String),
    SetTimeSettings {
        main_s: u32,
        byo_yomi_s: u32,
        byo_yomi_stones: u32,
    },
    /// Difficulty: caps the engine's search visits.
    SetMaxVisits(u32),
    Play {
        color: Color,
        vertex: Vertex,
    },
    Undo,
    /// Generate a move for `color` and stream evaluation data alongside it.
    /// `visits` doubles as the difficulty setting.
    GenerateMove {
        color: Color,
        visits: u32,
    },
    /// Analyze the current position for `color` without playing.
    Analyze {
        color: Color,
        visits: u32,
    },
    Quit,
}

/// Events received from the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Ready,
    Connected,
    Disconnected,
    MoveGenerated(GeneratedMove),
    Evaluation(Evaluation),
    /// A pending move request went unanswered past the deadline.
    Timeout,
    Error(String),
    RawGtpMessage {
        direction: GtpDirection,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtpDirection {
    ToEngine,
    FromEngine,
}

/// The engine's answer to a generate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedMove {
    /// A real move or a pass.
    Vertex(Vertex),
    Resign,
}

/// One analysis sample. Winrate is from the perspective of the color under
/// analysis; the principal variation alternates colors starting from that
/// color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub mv: Option<Vertex>,
    pub visits: Option<u64>,
    pub winrate: Option<f64>,
    pub score_lead: Option<f64>,
    pub pv: Vec<Vertex>,
}
