//! State model types for the bridge.
//!
//! [`ReaperState`] mirrors what REAPER reports over its OSC feedback channel.
//! Mutation goes through [`ReaperState::apply`], which only touches a field
//! when the incoming value actually differs from the held one.

use crate::osc::codec::{arg_as_bool, arg_as_f64};
use crate::osc::LOOPER_TRACKS;
use rosc::OscMessage;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Tempo reported before REAPER has sent any feedback.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// State of one looper slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    #[default]
    Empty,
    Recording,
    Playing,
    Stopped,
}

/// One of the eight looper slots. The id never changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopTrack {
    pub id: u32,
    pub state: LoopState,
    pub has_content: bool,
}

impl LoopTrack {
    fn empty(id: u32) -> Self {
        Self {
            id,
            state: LoopState::Empty,
            has_content: false,
        }
    }
}

/// Snapshot of DAW state as seen through OSC feedback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaperState {
    /// Tempo in BPM, rounded to one decimal place.
    pub tempo: f64,
    pub is_playing: bool,
    pub is_recording: bool,
    pub repeat_enabled: bool,
    /// Always exactly [`LOOPER_TRACKS`] entries, ids 1..=8 in order.
    pub looper_tracks: Vec<LoopTrack>,
    /// Milliseconds since the Unix epoch of the last change.
    pub timestamp: u64,
}

impl Default for ReaperState {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Track number from a `/track/<n>/<attr>` address, if it names a looper slot.
fn track_address(addr: &str) -> Option<(u32, &str)> {
    let rest = addr.strip_prefix("/track/")?;
    let (n, attr) = rest.split_once('/')?;
    let n: u32 = n.parse().ok()?;
    (1..=LOOPER_TRACKS).contains(&n).then_some((n, attr))
}

impl ReaperState {
    pub fn new() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            is_playing: false,
            is_recording: false,
            repeat_enabled: false,
            looper_tracks: (1..=LOOPER_TRACKS).map(LoopTrack::empty).collect(),
            timestamp: now_millis(),
        }
    }

    /// Looper slot by 1-based id.
    pub fn track(&self, id: u32) -> Option<&LoopTrack> {
        self.looper_tracks.iter().find(|t| t.id == id)
    }

    /// Merge an inbound message into the snapshot, stamping with the wall clock.
    pub fn apply(&mut self, msg: &OscMessage) -> bool {
        self.apply_at(msg, now_millis())
    }

    /// Merge an inbound message, using `now_ms` as the change time.
    ///
    /// Returns `true` only if a tracked field changed. Unknown addresses and
    /// messages without a usable first argument are ignored.
    pub fn apply_at(&mut self, msg: &OscMessage, now_ms: u64) -> bool {
        let changed = self.merge(msg);
        if changed {
            self.timestamp = now_ms.max(self.timestamp + 1);
        }
        changed
    }

    fn merge(&mut self, msg: &OscMessage) -> bool {
        let first = msg.args.first();
        match msg.addr.as_str() {
            "/play" => first
                .and_then(arg_as_bool)
                .is_some_and(|v| set(&mut self.is_playing, v)),
            "/record" => first
                .and_then(arg_as_bool)
                .is_some_and(|v| set(&mut self.is_recording, v)),
            "/repeat" => first
                .and_then(arg_as_bool)
                .is_some_and(|v| set(&mut self.repeat_enabled, v)),
            "/tempo" | "/tempo/raw" => first
                .and_then(arg_as_f64)
                .filter(|v| v.is_finite())
                .is_some_and(|v| set(&mut self.tempo, round_tenth(v))),
            addr => match track_address(addr) {
                Some((n, "recarm")) => first
                    .and_then(arg_as_bool)
                    .is_some_and(|armed| self.record_armed(n, armed)),
                _ => false,
            },
        }
    }

    /// Arming an empty slot is taken to mean a loop recording has started.
    /// REAPER has no dedicated event for that, so this is an approximation.
    fn record_armed(&mut self, id: u32, armed: bool) -> bool {
        let Some(track) = self.looper_tracks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if armed && track.state == LoopState::Empty {
            track.state = LoopState::Recording;
            track.has_content = true;
            return true;
        }
        false
    }
}

fn set<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        false
    } else {
        *field = value;
        true
    }
}
