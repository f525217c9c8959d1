//! Connection, config and state endpoint handlers.

use axum::{extract::State, Json};
use reabridge_core::ReaperState;
use std::sync::Arc;

use crate::{
    models::{
        engine_error, ApiResult, ConfigResponse, ConnectionResponse, HealthResponse, OscConfig,
        OscConfigUpdate,
    },
    AppState,
};

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        osc: state.engine.config().into(),
        connected: state.engine.is_connected(),
    })
}

/// GET /api/osc/config
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<OscConfig> {
    Json(state.engine.config().into())
}

/// POST /api/osc/config - Merge a partial update; closes a live connection
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<OscConfigUpdate>,
) -> ApiResult<ConfigResponse> {
    let config = state
        .engine
        .update_config(update.into())
        .map_err(engine_error)?;
    Ok(Json(ConfigResponse {
        success: true,
        config: config.into(),
        connected: state.engine.is_connected(),
    }))
}

/// POST /api/osc/connect
pub async fn connect(State(state): State<Arc<AppState>>) -> ApiResult<ConnectionResponse> {
    let engine = state.engine.clone();
    let timeout = state.connect_timeout;
    let local = tokio::task::spawn_blocking(move || engine.connect(timeout))
        .await
        .map_err(|e| engine_error(reabridge_core::Error::Transport(e.to_string())))?
        .map_err(engine_error)?;
    Ok(Json(ConnectionResponse {
        connected: true,
        local_addr: Some(local.to_string()),
    }))
}

/// POST /api/osc/disconnect
pub async fn disconnect(State(state): State<Arc<AppState>>) -> Json<ConnectionResponse> {
    state.engine.disconnect();
    Json(ConnectionResponse {
        connected: false,
        local_addr: None,
    })
}

/// GET /api/state - Current snapshot
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<ReaperState> {
    Json(state.engine.get_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use reabridge_core::{ControlConfig, ControlEngine, KnowledgeBase, SearchEngine};
    use std::time::Duration;

    fn state() -> Arc<AppState> {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let config = ControlConfig {
            listen_port: 0,
            ..Default::default()
        };
        let engine = ControlEngine::new(config).unwrap();
        AppState::new(engine, Arc::new(SearchEngine::new(kb)), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_update_config_validates() {
        let state = state();
        let Json(resp) = update_config(
            State(state.clone()),
            Json(OscConfigUpdate {
                port: Some(8100),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.config.port, 8100);
        assert_eq!(resp.config.host, "127.0.0.1");

        let err = update_config(
            State(state.clone()),
            Json(OscConfigUpdate {
                host: Some(String::new()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let Json(config) = get_config(State(state)).await;
        assert_eq!(config.port, 8100);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let state = state();
        let Json(resp) = connect(State(state.clone())).await.unwrap();
        assert!(resp.connected);
        assert!(resp.local_addr.is_some());

        let Json(health) = health(State(state.clone())).await;
        assert!(health.connected);

        let Json(resp) = disconnect(State(state.clone())).await;
        assert!(!resp.connected);
        assert!(!state.engine.is_connected());
    }

    #[tokio::test]
    async fn test_state_snapshot() {
        let Json(snapshot) = get_state(State(state())).await;
        assert_eq!(snapshot.looper_tracks.len(), 8);
        assert!(!snapshot.is_playing);
    }
}
