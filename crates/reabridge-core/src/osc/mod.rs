//! OSC (Open Sound Control) layer for REAPER communication.
//!
//! - [`codec`] - encode/decode of single messages and bundles
//! - [`Command`] - the closed set of outbound control operations

pub mod codec;
mod command;

pub use command::{
    looper_note, Command, LOOPER_CLEAR_ALL_NOTE, LOOPER_FIRST_NOTE, LOOPER_STOP_ALL_NOTE,
    LOOPER_TRACKS, MAX_TEMPO, MIN_TEMPO, NOTE_VELOCITY,
};
pub use rosc::{OscMessage, OscType};
