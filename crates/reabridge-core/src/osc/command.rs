//! Outbound command set.
//!
//! Every control operation is one [`Command`] variant; [`Command::to_message`]
//! is the only place OSC addresses for outbound traffic are built.
//!
//! Looper control goes through REAPER's virtual MIDI keyboard: tracks 1-8 of
//! the Super8 looper listen on the chromatic run C2..G2 (notes 36-43), with
//! G#2 (44) stopping and A#2 (46) clearing all loops.

use crate::error::{Error, Result};
use rosc::{OscMessage, OscType};

use super::codec::message;

/// Number of looper tracks.
pub const LOOPER_TRACKS: u32 = 8;
/// MIDI note triggering looper track 1 (C2).
pub const LOOPER_FIRST_NOTE: u8 = 36;
/// MIDI note stopping all loops (G#2).
pub const LOOPER_STOP_ALL_NOTE: u8 = 44;
/// MIDI note clearing all loops (A#2).
pub const LOOPER_CLEAR_ALL_NOTE: u8 = 46;
/// Velocity of synthesized note-on messages.
pub const NOTE_VELOCITY: u8 = 127;

/// Accepted tempo range in BPM.
pub const MIN_TEMPO: f32 = 20.0;
pub const MAX_TEMPO: f32 = 400.0;

/// A control operation addressed to the DAW.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Stop,
    Pause,
    Record,
    ToggleRepeat,
    ToggleMetronome,
    GoToStart,
    Rewind,
    Forward,
    GoToMarker(u32),
    SetTempo(f32),
    TriggerAction(u32),
    TrackVolume { track: u32, volume: f32 },
    TrackPan { track: u32, pan: f32 },
    TrackMute { track: u32, muted: bool },
    TrackSolo { track: u32, soloed: bool },
    TrackRecordArm { track: u32, armed: bool },
    TrackSelect { track: u32, selected: bool },
    LoopTrack(u32),
    LoopStopAll,
    LoopClearAll,
}

/// MIDI note assigned to looper track `track` (1-based).
pub fn looper_note(track: u32) -> Result<u8> {
    check_track(track)?;
    Ok(LOOPER_FIRST_NOTE + (track - 1) as u8)
}

fn check_track(track: u32) -> Result<()> {
    if (1..=LOOPER_TRACKS).contains(&track) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "track must be 1-{}, got {}",
            LOOPER_TRACKS, track
        )))
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

fn trigger() -> Vec<OscType> {
    vec![OscType::Int(1)]
}

fn flag(on: bool) -> Vec<OscType> {
    vec![OscType::Int(on as i32)]
}

fn midi_note(note: u8) -> OscMessage {
    message(&format!("/vkb_midi/0/{}/{}", note, NOTE_VELOCITY), vec![])
}

/// Marker numbers travel as OSC int32 and start at 1.
fn marker_arg(marker: u32) -> Result<i32> {
    match i32::try_from(marker) {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::Validation(format!(
            "marker must be 1-{}, got {}",
            i32::MAX,
            marker
        ))),
    }
}

impl Command {
    /// Short name for logs and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "play",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Record => "record",
            Command::ToggleRepeat => "repeat",
            Command::ToggleMetronome => "metronome",
            Command::GoToStart => "go-to-start",
            Command::Rewind => "rewind",
            Command::Forward => "forward",
            Command::GoToMarker(_) => "marker",
            Command::SetTempo(_) => "tempo",
            Command::TriggerAction(_) => "action",
            Command::TrackVolume { .. } => "track-volume",
            Command::TrackPan { .. } => "track-pan",
            Command::TrackMute { .. } => "track-mute",
            Command::TrackSolo { .. } => "track-solo",
            Command::TrackRecordArm { .. } => "track-arm",
            Command::TrackSelect { .. } => "track-select",
            Command::LoopTrack(_) => "loop-track",
            Command::LoopStopAll => "loop-stop-all",
            Command::LoopClearAll => "loop-clear-all",
        }
    }

    /// Check the command's own domain constraints.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::GoToMarker(marker) => marker_arg(*marker).map(|_| ()),
            Command::SetTempo(bpm) => check_range("tempo", *bpm, MIN_TEMPO, MAX_TEMPO),
            Command::TriggerAction(id) => {
                if *id == 0 {
                    return Err(Error::Validation("action id must be 1 or greater".to_string()));
                }
                Ok(())
            }
            Command::TrackVolume { track, volume } => {
                check_track(*track)?;
                check_range("volume", *volume, 0.0, 1.0)
            }
            Command::TrackPan { track, pan } => {
                check_track(*track)?;
                check_range("pan", *pan, -1.0, 1.0)
            }
            Command::TrackMute { track, .. }
            | Command::TrackSolo { track, .. }
            | Command::TrackRecordArm { track, .. }
            | Command::TrackSelect { track, .. }
            | Command::LoopTrack(track) => check_track(*track),
            _ => Ok(()),
        }
    }

    /// Validate and build the OSC message for this command.
    pub fn to_message(&self) -> Result<OscMessage> {
        self.validate()?;
        let msg = match self {
            Command::Play => message("/play", trigger()),
            Command::Stop => message("/stop", trigger()),
            Command::Pause => message("/pause", trigger()),
            Command::Record => message("/record", trigger()),
            Command::ToggleRepeat => message("/repeat", trigger()),
            Command::ToggleMetronome => message("/click", trigger()),
            Command::GoToStart => message("/time", vec![OscType::Float(0.0)]),
            Command::Rewind => message("/rewind", trigger()),
            Command::Forward => message("/forward", trigger()),
            Command::GoToMarker(marker) => message("/marker", vec![OscType::Int(marker_arg(*marker)?)]),
            Command::SetTempo(bpm) => message("/tempo/raw", vec![OscType::Float(*bpm)]),
            Command::TriggerAction(id) => message(&format!("/action/{}", id), trigger()),
            Command::TrackVolume { track, volume } => message(
                &format!("/track/{}/volume", track),
                vec![OscType::Float(*volume)],
            ),
            Command::TrackPan { track, pan } => {
                message(&format!("/track/{}/pan", track), vec![OscType::Float(*pan)])
            }
            Command::TrackMute { track, muted } => {
                message(&format!("/track/{}/mute", track), flag(*muted))
            }
            Command::TrackSolo { track, soloed } => {
                message(&format!("/track/{}/solo", track), flag(*soloed))
            }
            Command::TrackRecordArm { track, armed } => {
                message(&format!("/track/{}/recarm", track), flag(*armed))
            }
            Command::TrackSelect { track, selected } => {
                message(&format!("/track/{}/select", track), flag(*selected))
            }
            Command::LoopTrack(track) => midi_note(looper_note(*track)?),
            Command::LoopStopAll => midi_note(LOOPER_STOP_ALL_NOTE),
            Command::LoopClearAll => midi_note(LOOPER_CLEAR_ALL_NOTE),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_addresses() {
        let cases = [
            (Command::Play, "/play"),
            (Command::Stop, "/stop"),
            (Command::Pause, "/pause"),
            (Command::Record, "/record"),
            (Command::ToggleRepeat, "/repeat"),
            (Command::ToggleMetronome, "/click"),
            (Command::Rewind, "/rewind"),
            (Command::Forward, "/forward"),
        ];
        for (cmd, addr) in cases {
            let msg = cmd.to_message().unwrap();
            assert_eq!(msg.addr, addr);
            assert_eq!(msg.args, vec![OscType::Int(1)]);
        }
    }

    #[test]
    fn test_go_to_start_sends_time_zero() {
        let msg = Command::GoToStart.to_message().unwrap();
        assert_eq!(msg.addr, "/time");
        assert_eq!(msg.args, vec![OscType::Float(0.0)]);
    }

    #[test]
    fn test_tempo_range() {
        let msg = Command::SetTempo(128.5).to_message().unwrap();
        assert_eq!(msg.addr, "/tempo/raw");
        assert_eq!(msg.args, vec![OscType::Float(128.5)]);

        for bad in [19.9, 400.1, f32::NAN, f32::INFINITY] {
            assert!(Command::SetTempo(bad).to_message().unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_action_and_marker() {
        let msg = Command::TriggerAction(40157).to_message().unwrap();
        assert_eq!(msg.addr, "/action/40157");
        assert_eq!(msg.args, vec![OscType::Int(1)]);
        assert!(Command::TriggerAction(0).validate().is_err());

        let msg = Command::GoToMarker(3).to_message().unwrap();
        assert_eq!(msg.addr, "/marker");
        assert_eq!(msg.args, vec![OscType::Int(3)]);
        assert!(Command::GoToMarker(0).validate().is_err());
    }

    #[test]
    fn test_marker_beyond_int_range_rejected() {
        let max = i32::MAX as u32;
        let msg = Command::GoToMarker(max).to_message().unwrap();
        assert_eq!(msg.args, vec![OscType::Int(i32::MAX)]);

        let err = Command::GoToMarker(max + 1).to_message().unwrap_err();
        assert!(err.is_validation());
        assert!(Command::GoToMarker(u32::MAX).validate().is_err());
    }

    #[test]
    fn test_track_controls() {
        let msg = Command::TrackVolume { track: 3, volume: 0.7 }.to_message().unwrap();
        assert_eq!(msg.addr, "/track/3/volume");
        assert_eq!(msg.args, vec![OscType::Float(0.7)]);

        let msg = Command::TrackRecordArm { track: 2, armed: false }.to_message().unwrap();
        assert_eq!(msg.addr, "/track/2/recarm");
        assert_eq!(msg.args, vec![OscType::Int(0)]);

        let msg = Command::TrackSelect { track: 8, selected: true }.to_message().unwrap();
        assert_eq!(msg.addr, "/track/8/select");

        assert!(Command::TrackPan { track: 1, pan: -1.5 }.validate().is_err());
        assert!(Command::TrackVolume { track: 1, volume: 1.2 }.validate().is_err());
    }

    #[test]
    fn test_track_number_bounds() {
        for track in [0, 9, 100] {
            let cmds = [
                Command::LoopTrack(track),
                Command::TrackRecordArm { track, armed: true },
                Command::TrackMute { track, muted: true },
                Command::TrackSolo { track, soloed: true },
                Command::TrackVolume { track, volume: 0.5 },
            ];
            for cmd in cmds {
                let err = cmd.to_message().unwrap_err();
                assert!(err.is_validation(), "{:?} should be rejected", cmd);
                assert!(err.to_string().contains("track must be 1-8"));
            }
        }
    }

    #[test]
    fn test_looper_notes_are_chromatic() {
        for track in 1..=8 {
            assert_eq!(looper_note(track).unwrap(), 35 + track as u8);
        }
        let msg = Command::LoopTrack(5).to_message().unwrap();
        assert_eq!(msg.addr, "/vkb_midi/0/40/127");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_looper_stop_and_clear_notes() {
        assert_eq!(Command::LoopStopAll.to_message().unwrap().addr, "/vkb_midi/0/44/127");
        assert_eq!(Command::LoopClearAll.to_message().unwrap().addr, "/vkb_midi/0/46/127");
    }
}
