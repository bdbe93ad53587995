pub mod config;
pub mod persistence;
pub mod problem;
pub mod session;
pub mod sparring;

pub use persistence::{
    MemoryMistakeStore, MistakeFileStore, MistakeRecord, MistakeStore, PersistenceError,
};
pub use problem::ProblemRecord;
pub use session::{
    Phase, SessionConfig, SessionError, SessionEvent, SessionHandle, SessionManager,
    SessionSnapshot, StoneRecord,
};
pub use sparring::{
    SparringConfig, SparringError, SparringEvent, SparringHandle, SparringSnapshot, SparringState,
};
