//! DAW state mirror.
//!
//! - [`ReaperState`] - the snapshot, plus the merge rules for inbound feedback
//! - [`StateManager`] - thread-safe state access

mod manager;
mod model;

pub use manager::StateManager;
pub use model::{now_millis, LoopState, LoopTrack, ReaperState, DEFAULT_TEMPO};
