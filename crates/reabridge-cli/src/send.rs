//! `reabridge send` argument parsing.

use clap::{Subcommand, ValueEnum};
use reabridge_core::Command;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

/// One control command for REAPER.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SendCommand {
    Play,
    Stop,
    Pause,
    Record,
    /// Toggle repeat
    Repeat,
    /// Toggle the metronome
    Metronome,
    /// Move the edit cursor to the project start
    GotoStart,
    Rewind,
    Forward,
    /// Jump to marker N
    Marker { marker: u32 },
    /// Set tempo in BPM (20-400)
    Tempo { bpm: f32 },
    /// Trigger an action by command id
    Action { id: u32 },
    /// Track volume (0.0-1.0)
    Volume { track: u32, volume: f32 },
    /// Track pan (-1.0 to 1.0)
    Pan {
        track: u32,
        #[arg(allow_hyphen_values = true)]
        pan: f32,
    },
    Mute { track: u32, state: Switch },
    Solo { track: u32, state: Switch },
    /// Record-arm a track
    Arm { track: u32, state: Switch },
    Select { track: u32, state: Switch },
    /// Trigger looper track 1-8
    Loop { track: u32 },
    /// Stop all looper tracks
    LoopStopAll,
    /// Clear all looper tracks
    LoopClearAll,
}

impl From<SendCommand> for Command {
    fn from(cmd: SendCommand) -> Self {
        match cmd {
            SendCommand::Play => Command::Play,
            SendCommand::Stop => Command::Stop,
            SendCommand::Pause => Command::Pause,
            SendCommand::Record => Command::Record,
            SendCommand::Repeat => Command::ToggleRepeat,
            SendCommand::Metronome => Command::ToggleMetronome,
            SendCommand::GotoStart => Command::GoToStart,
            SendCommand::Rewind => Command::Rewind,
            SendCommand::Forward => Command::Forward,
            SendCommand::Marker { marker } => Command::GoToMarker(marker),
            SendCommand::Tempo { bpm } => Command::SetTempo(bpm),
            SendCommand::Action { id } => Command::TriggerAction(id),
            SendCommand::Volume { track, volume } => Command::TrackVolume { track, volume },
            SendCommand::Pan { track, pan } => Command::TrackPan { track, pan },
            SendCommand::Mute { track, state } => Command::TrackMute {
                track,
                muted: state.is_on(),
            },
            SendCommand::Solo { track, state } => Command::TrackSolo {
                track,
                soloed: state.is_on(),
            },
            SendCommand::Arm { track, state } => Command::TrackRecordArm {
                track,
                armed: state.is_on(),
            },
            SendCommand::Select { track, state } => Command::TrackSelect {
                track,
                selected: state.is_on(),
            },
            SendCommand::Loop { track } => Command::LoopTrack(track),
            SendCommand::LoopStopAll => Command::LoopStopAll,
            SendCommand::LoopClearAll => Command::LoopClearAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(subcommand)]
        cmd: SendCommand,
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["send"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).unwrap().cmd.into()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["play"]), Command::Play);
        assert_eq!(parse(&["goto-start"]), Command::GoToStart);
        assert_eq!(parse(&["tempo", "128.5"]), Command::SetTempo(128.5));
        assert_eq!(parse(&["loop", "5"]), Command::LoopTrack(5));
        assert_eq!(parse(&["loop-clear-all"]), Command::LoopClearAll);
        assert_eq!(
            parse(&["arm", "3", "on"]),
            Command::TrackRecordArm { track: 3, armed: true }
        );
        assert_eq!(
            parse(&["pan", "2", "-0.5"]),
            Command::TrackPan { track: 2, pan: -0.5 }
        );
    }

    #[test]
    fn test_range_checks_happen_in_core() {
        // Parsing accepts any number; the engine rejects it.
        let cmd = parse(&["loop", "12"]);
        assert!(cmd.validate().unwrap_err().is_validation());
    }
}
