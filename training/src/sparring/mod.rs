//! Sparring mode: free play against the analysis engine with blunder
//! coaching.

pub mod actor;
pub mod state;

pub use actor::{spawn_sparring_actor, SparringCommand, SparringHandle};
pub use state::{
    GameOutcome, ReviewStep, SparringConfig, SparringError, SparringEvent, SparringSnapshot,
    SparringState,
};
