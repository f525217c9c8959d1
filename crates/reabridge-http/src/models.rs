//! Request and response bodies for the REST API.

use axum::{http::StatusCode, Json};
use reabridge_core::{ConfigUpdate, ControlConfig, Error, SearchResult};
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Valid alternatives, for not-found lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            available: None,
        }
    }

    pub fn not_found(message: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            error: message.into(),
            available: Some(available),
        }
    }
}

/// Failure half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Handler result.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub fn not_found(message: impl Into<String>, available: Vec<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::not_found(message, available)),
    )
}

/// Map a core error onto an HTTP status.
pub fn engine_error(err: Error) -> ApiError {
    let status = match &err {
        Error::Validation(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// OSC endpoint settings as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscConfig {
    pub host: String,
    pub port: u16,
    pub listen_port: u16,
}

impl From<ControlConfig> for OscConfig {
    fn from(c: ControlConfig) -> Self {
        Self {
            host: c.host,
            port: c.port,
            listen_port: c.listen_port,
        }
    }
}

/// Partial OSC config update; absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscConfigUpdate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub listen_port: Option<u16>,
}

impl From<OscConfigUpdate> for ConfigUpdate {
    fn from(u: OscConfigUpdate) -> Self {
        ConfigUpdate {
            host: u.host,
            port: u.port,
            listen_port: u.listen_port,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub config: OscConfig,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub osc: OscConfig,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<String>,
}

/// Acknowledgement of a sent command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TempoRequest {
    pub bpm: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeRequest {
    pub volume: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanRequest {
    pub pan: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoloRequest {
    pub soloed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArmRequest {
    pub armed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    pub selected: bool,
}
