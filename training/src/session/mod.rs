//! Actor-based training sessions.
//!
//! One actor task per loaded problem; the [`SessionManager`] spawns them and
//! hands out cloneable [`SessionHandle`]s. Loading a new problem means
//! creating a new session, which is what guarantees the full reset the
//! trainer relies on.

pub mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub mod snapshot;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::persistence::{MistakeStore, PersistenceError};
use crate::problem::ProblemRecord;

use actor::run_session_actor;
pub use commands::{SessionConfig, SessionError};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use snapshot::{Phase, SessionSnapshot, StoneRecord};
use state::TrainingState;

/// Manages all active sessions. Spawns an actor task per session.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    store: Arc<dyn MistakeStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn MistakeStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Load a problem into a fresh session. A malformed record fails only
    /// this problem; the manager and other sessions are unaffected.
    pub async fn create_session(
        &self,
        problem: &ProblemRecord,
        config: SessionConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        let session_id = Uuid::new_v4().to_string();
        let state = TrainingState::new(
            session_id.clone(),
            problem,
            config,
            self.store.clone(),
            Instant::now(),
        )?;
        let initial_snapshot = state.snapshot(Instant::now());

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(100);
        tokio::spawn(run_session_actor(state, cmd_rx, event_tx));

        let handle = SessionHandle::new(cmd_tx);
        self.sessions.write().await.insert(session_id, handle);

        Ok(initial_snapshot)
    }

    pub async fn get_handle(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::Internal(format!("Session not found: {}", session_id)))
    }

    pub async fn close_session(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::Internal(format!("Session not found: {}", session_id)))?;
        handle.shutdown().await;
        Ok(())
    }

    /// Problem ids currently enrolled in the learner's mistake set.
    pub fn mistake_set(&self) -> Result<Vec<String>, PersistenceError> {
        self.store.flagged_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryMistakeStore;
    use goban::Coord;
    use std::time::Duration;

    fn test_problem(id: &str) -> ProblemRecord {
        ProblemRecord {
            id: id.to_string(),
            title: "corner pattern".to_string(),
            record_text: "(;AB[aa](;B[bb];W[cc])(;B[cb];W[db]))".to_string(),
            display_label: None,
        }
    }

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

    #[tokio::test]
    async fn test_create_and_close_session() {
        let manager = SessionManager::new(Arc::new(MemoryMistakeStore::new()));
        let snapshot = manager
            .create_session(&test_problem("p1"), fast_config())
            .await
            .unwrap();
        let session_id = snapshot.session_id.clone();

        let handle = manager.get_handle(&session_id).await.unwrap();
        assert_eq!(handle.get_snapshot().await.unwrap().problem_id, "p1");

        manager.close_session(&session_id).await.unwrap();
        assert!(manager.get_handle(&session_id).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_record_fails_only_that_problem() {
        let manager = SessionManager::new(Arc::new(MemoryMistakeStore::new()));
        let bad = ProblemRecord {
            id: "bad".to_string(),
            title: "broken".to_string(),
            record_text: "(;B[aa".to_string(),
            display_label: None,
        };
        let err = manager.create_session(&bad, fast_config()).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidRecord(_)));

        // The manager still loads well-formed problems afterwards.
        assert!(manager
            .create_session(&test_problem("ok"), fast_config())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_new_session_resets_everything() {
        let store = Arc::new(MemoryMistakeStore::new());
        let manager = SessionManager::new(store.clone());

        let first = manager
            .create_session(&test_problem("p1"), fast_config())
            .await
            .unwrap();
        let handle = manager.get_handle(&first.session_id).await.unwrap();
        handle.start_practice(None).await.unwrap();
        let snapshot = handle.attempt_move(Coord::new(2, 1)).await.unwrap();
        assert_eq!(snapshot.mistakes, 1);

        // Loading the problem again starts from zero mistakes and setup.
        let second = manager
            .create_session(&test_problem("p1"), fast_config())
            .await
            .unwrap();
        assert_eq!(second.mistakes, 0);
        assert_eq!(second.move_count, 0);
        assert_eq!(store.get("p1").unwrap().unwrap().attempts, 2);
    }
}
