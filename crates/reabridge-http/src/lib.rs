//! HTTP REST API server for the REAPER bridge.
//!
//! Exposes the knowledge query surface and the control surface of
//! [`reabridge_core`] over REST, plus a WebSocket endpoint that relays
//! state changes pushed by the [`ControlEngine`].
//!
//! # Usage
//!
//! ```ignore
//! use reabridge_http::start_server;
//!
//! let engine = ControlEngine::new(config.osc.control.clone())?;
//! let search = Arc::new(SearchEngine::from_settings(kb, &config.search));
//! start_server(engine, search, 3001, Duration::from_secs(2)).await?;
//! ```

mod models;
mod routes;
mod websocket;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use reabridge_core::{ControlEngine, SearchEngine, Subscription};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use models::*;
pub use websocket::WebSocketEvent;

/// Shared application state for HTTP handlers.
pub struct AppState {
    /// Control engine for commands and state.
    pub engine: ControlEngine,
    /// Knowledge search with result cache.
    pub search: Arc<SearchEngine>,
    /// Broadcast channel for WebSocket events.
    pub ws_tx: broadcast::Sender<WebSocketEvent>,
    /// Limit for `POST /api/osc/connect`.
    pub connect_timeout: Duration,
    /// Engine listener feeding `ws_tx`.
    state_feed: Subscription,
}

impl AppState {
    /// Build the shared state and start relaying engine state changes to
    /// WebSocket clients.
    pub fn new(engine: ControlEngine, search: Arc<SearchEngine>, connect_timeout: Duration) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel::<WebSocketEvent>(1024);
        let state_feed = websocket::forward_state_changes(&engine, ws_tx.clone());
        Arc::new(Self {
            engine,
            search,
            ws_tx,
            connect_timeout,
            state_feed,
        })
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.state_feed.unsubscribe();
    }
}

/// All routes, with CORS open to any origin.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::osc::health))
        // Knowledge
        .route("/api/search", get(routes::knowledge::search))
        .route("/api/lookup", get(routes::knowledge::lookup))
        .route("/api/knowledge", get(routes::knowledge::sections))
        .route("/api/knowledge/:section", get(routes::knowledge::section))
        .route(
            "/api/knowledge/plugins/:name",
            get(routes::knowledge::plugin),
        )
        .route(
            "/api/knowledge/extensions/:name",
            get(routes::knowledge::extension),
        )
        .route(
            "/api/knowledge/actions/search/:query",
            get(routes::knowledge::actions),
        )
        .route(
            "/api/knowledge/shortcuts/:category",
            get(routes::knowledge::shortcuts),
        )
        .route(
            "/api/knowledge/workflows/:kind",
            get(routes::knowledge::workflow),
        )
        .route(
            "/api/knowledge/troubleshooting/:issue",
            get(routes::knowledge::troubleshooting),
        )
        // OSC connection
        .route(
            "/api/osc/config",
            get(routes::osc::get_config).post(routes::osc::update_config),
        )
        .route("/api/osc/connect", post(routes::osc::connect))
        .route("/api/osc/disconnect", post(routes::osc::disconnect))
        .route("/api/state", get(routes::osc::get_state))
        // Transport
        .route("/api/transport/:action", post(routes::control::transport))
        .route("/api/marker/:marker", post(routes::control::marker))
        .route("/api/tempo", post(routes::control::tempo))
        .route("/api/action/:id", post(routes::control::action))
        // Tracks
        .route("/api/track/:num/volume", post(routes::control::track_volume))
        .route("/api/track/:num/pan", post(routes::control::track_pan))
        .route("/api/track/:num/mute", post(routes::control::track_mute))
        .route("/api/track/:num/solo", post(routes::control::track_solo))
        .route("/api/track/:num/arm", post(routes::control::track_arm))
        .route("/api/track/:num/select", post(routes::control::track_select))
        // Looper
        .route("/api/looper/track/:num", post(routes::control::loop_track))
        .route("/api/looper/stop-all", post(routes::control::loop_stop_all))
        .route("/api/looper/clear-all", post(routes::control::loop_clear_all))
        // WebSocket
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve the API on `0.0.0.0:port` until the process exits.
pub async fn start_server(
    engine: ControlEngine,
    search: Arc<SearchEngine>,
    port: u16,
    connect_timeout: Duration,
) -> anyhow::Result<()> {
    let state = AppState::new(engine, search, connect_timeout);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!(
        "HTTP API server starting on http://{}:{}",
        addr.ip(),
        addr.port()
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind HTTP port {}", port))?;
    axum::serve(listener, app)
        .await
        .context("HTTP server stopped")?;
    Ok(())
}
