//! reabridge core - REAPER control over OSC and a searchable knowledge base.
//!
//! This crate provides the building blocks of the bridge:
//!
//! - **OSC** - Wire codec and the closed set of outbound [`Command`]s
//! - **State** - [`ReaperState`] snapshot and the merge rules for DAW feedback
//! - **Engine** - [`ControlEngine`]: socket lifecycle, commands, state fan-out
//! - **Knowledge** - Immutable [`KnowledgeBase`] and the ranked [`SearchEngine`]
//! - **Config** - Layered configuration (defaults, TOML file, environment)
//!
//! # Architecture
//!
//! The [`ControlEngine`] owns the only mutable state. Every inbound datagram
//! is decoded, merged into the snapshot and, if anything changed, handed to
//! each subscriber as an independent copy. The knowledge side is read-only:
//! the document is loaded once and shared by reference.

pub mod config;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod osc;
pub mod state;

pub use config::{Config, ConfigUpdate, ControlConfig};
pub use engine::{ControlEngine, ControlEngineBuilder, DatagramSink, SendPolicy, Subscription};
pub use error::{Error, Result};
pub use knowledge::{KnowledgeBase, Node, SearchEngine, SearchResult};
pub use osc::Command;
pub use state::{LoopState, LoopTrack, ReaperState};
