//! Control endpoint handlers: transport, tempo, actions, tracks, looper.
//!
//! Every handler builds one [`Command`] and sends it through the engine.
//! Out-of-range arguments come back as 400 with the engine's reason.

use axum::{
    extract::{Path, State},
    Json,
};
use reabridge_core::Command;
use std::sync::Arc;

use crate::{
    models::{
        bad_request, engine_error, not_found, ApiResult, ArmRequest, CommandResponse,
        MuteRequest, PanRequest, SelectRequest, SoloRequest, TempoRequest, VolumeRequest,
    },
    AppState,
};

const TRANSPORT_ACTIONS: [&str; 9] = [
    "play",
    "stop",
    "pause",
    "record",
    "repeat",
    "metronome",
    "goto-start",
    "rewind",
    "forward",
];

fn transport_command(action: &str) -> Option<Command> {
    let command = match action {
        "play" => Command::Play,
        "stop" => Command::Stop,
        "pause" => Command::Pause,
        "record" => Command::Record,
        "repeat" => Command::ToggleRepeat,
        "metronome" => Command::ToggleMetronome,
        "goto-start" => Command::GoToStart,
        "rewind" => Command::Rewind,
        "forward" => Command::Forward,
        _ => return None,
    };
    Some(command)
}

fn send(state: &AppState, command: Command) -> ApiResult<CommandResponse> {
    state.engine.send(&command).map_err(|e| {
        log::debug!("{} rejected: {}", command.name(), e);
        engine_error(e)
    })?;
    Ok(Json(CommandResponse {
        success: true,
        action: command.name().to_string(),
    }))
}

/// POST /api/transport/:action
pub async fn transport(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> ApiResult<CommandResponse> {
    let command = transport_command(&action).ok_or_else(|| {
        not_found(
            format!("Unknown transport action '{}'", action),
            TRANSPORT_ACTIONS.iter().map(|s| s.to_string()).collect(),
        )
    })?;
    send(&state, command)
}

/// POST /api/marker/:marker
pub async fn marker(
    State(state): State<Arc<AppState>>,
    Path(marker): Path<u32>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::GoToMarker(marker))
}

/// POST /api/tempo - Body `{"bpm": 120}`
pub async fn tempo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TempoRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::SetTempo(req.bpm))
}

/// POST /api/action/:id
pub async fn action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<CommandResponse> {
    let id: u32 = id
        .trim()
        .parse()
        .map_err(|_| bad_request("Invalid action ID"))?;
    send(&state, Command::TriggerAction(id))
}

/// POST /api/track/:num/volume - Body `{"volume": 0.8}`
pub async fn track_volume(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackVolume { track, volume: req.volume })
}

/// POST /api/track/:num/pan - Body `{"pan": -0.5}`
pub async fn track_pan(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<PanRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackPan { track, pan: req.pan })
}

pub async fn track_mute(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<MuteRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackMute { track, muted: req.muted })
}

pub async fn track_solo(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<SoloRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackSolo { track, soloed: req.soloed })
}

pub async fn track_arm(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<ArmRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackRecordArm { track, armed: req.armed })
}

pub async fn track_select(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::TrackSelect { track, selected: req.selected })
}

/// POST /api/looper/track/:num - Trigger looper track 1-8
pub async fn loop_track(
    State(state): State<Arc<AppState>>,
    Path(track): Path<u32>,
) -> ApiResult<CommandResponse> {
    send(&state, Command::LoopTrack(track))
}

/// POST /api/looper/stop-all
pub async fn loop_stop_all(State(state): State<Arc<AppState>>) -> ApiResult<CommandResponse> {
    send(&state, Command::LoopStopAll)
}

/// POST /api/looper/clear-all
pub async fn loop_clear_all(State(state): State<Arc<AppState>>) -> ApiResult<CommandResponse> {
    send(&state, Command::LoopClearAll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use reabridge_core::osc::codec::decode;
    use reabridge_core::{ControlConfig, ControlEngine, KnowledgeBase, SearchEngine};
    use std::net::UdpSocket;
    use std::time::Duration;

    /// App state whose engine targets a local socket standing in for REAPER.
    fn state_with_daw() -> (Arc<AppState>, UdpSocket) {
        let daw = UdpSocket::bind("127.0.0.1:0").unwrap();
        daw.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let config = ControlConfig {
            host: "127.0.0.1".to_string(),
            port: daw.local_addr().unwrap().port(),
            listen_port: 0,
        };
        let engine = ControlEngine::new(config).unwrap();
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let state = AppState::new(engine, Arc::new(SearchEngine::new(kb)), Duration::from_secs(2));
        (state, daw)
    }

    fn recv_addr(daw: &UdpSocket) -> String {
        let mut buf = [0u8; 1024];
        let (n, _) = daw.recv_from(&mut buf).unwrap();
        decode(&buf[..n]).unwrap().remove(0).addr
    }

    #[test]
    fn test_transport_action_names() {
        for action in TRANSPORT_ACTIONS {
            assert!(transport_command(action).is_some(), "{}", action);
        }
        assert!(transport_command("explode").is_none());
    }

    #[tokio::test]
    async fn test_loop_track_sends_note() {
        let (state, daw) = state_with_daw();
        let Json(resp) = loop_track(State(state), Path(5)).await.unwrap();
        assert_eq!(resp.action, "loop-track");
        assert_eq!(recv_addr(&daw), "/vkb_midi/0/40/127");
    }

    #[tokio::test]
    async fn test_out_of_range_is_bad_request() {
        let (state, _daw) = state_with_daw();
        let err = loop_track(State(state.clone()), Path(9)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1 .0.error.contains("track must be 1-8"));

        let err = tempo(State(state.clone()), Json(TempoRequest { bpm: 500.0 }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = action(State(state), Path("abc".to_string())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_transport_action() {
        let (state, _daw) = state_with_daw();
        let err = transport(State(state), Path("explode".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_track_arm_and_transport_reach_daw() {
        let (state, daw) = state_with_daw();
        transport(State(state.clone()), Path("goto-start".to_string()))
            .await
            .unwrap();
        assert_eq!(recv_addr(&daw), "/time");

        track_arm(State(state), Path(2), Json(ArmRequest { armed: true }))
            .await
            .unwrap();
        assert_eq!(recv_addr(&daw), "/track/2/recarm");
    }
}
