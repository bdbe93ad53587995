//! Events broadcast from the session actor to all subscribers.

use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// Terminal classification of the loaded problem. `solved` is false for
    /// a failure-annotated leaf.
    ProblemClassified { problem_id: String, solved: bool },
    /// Error notification.
    Error(String),
}
