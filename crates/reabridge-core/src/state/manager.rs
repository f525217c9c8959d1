//! State manager for thread-safe state access.
//!
//! The [`StateManager`] provides synchronized access to the live
//! [`ReaperState`]. It uses an RwLock so snapshot reads never wait on
//! each other, only on the short merge of a single inbound message.

use std::sync::{Arc, PoisonError, RwLock};

use rosc::OscMessage;

use super::model::ReaperState;

/// Thread-safe owner of the live snapshot.
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<ReaperState>>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a new state manager with default state.
    pub fn new() -> Self {
        Self::with_state(ReaperState::new())
    }

    /// Create a state manager with a specific initial state.
    pub fn with_state(state: ReaperState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Read the state with a closure.
    pub fn with_state_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ReaperState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Independent copy of the current state.
    pub fn snapshot(&self) -> ReaperState {
        self.with_state_read(|s| s.clone())
    }

    /// Merge one inbound message. On change, returns a copy of the new state
    /// taken before the write lock is released.
    pub fn apply(&self, msg: &OscMessage) -> Option<ReaperState> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.apply(msg).then(|| state.clone())
    }

    pub fn tempo(&self) -> f64 {
        self.with_state_read(|s| s.tempo)
    }

    pub fn timestamp(&self) -> u64 {
        self.with_state_read(|s| s.timestamp)
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("timestamp", &self.timestamp())
            .finish_non_exhaustive()
    }
}
