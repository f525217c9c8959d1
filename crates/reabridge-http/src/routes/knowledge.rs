//! Knowledge endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use reabridge_core::Node;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    models::{bad_request, not_found, ApiResult, SearchResponse},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    path: String,
}

/// Short URL names for sections whose document keys are camelCase.
fn section_key(name: &str) -> &str {
    match name {
        "super8" => "super8Looper",
        "live-looping" => "liveLooping",
        "linux" => "linuxSetup",
        other => other,
    }
}

fn parent_path(path: &str) -> &str {
    match path.rfind(['.', '[']) {
        Some(i) => &path[..i],
        None => "",
    }
}

/// GET /api/search?q= - Ranked free-text search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("Query parameter \"q\" is required"));
    }
    let results = state.search.search(&query);
    log::debug!("search {:?}: {} results", query, results.len());
    Ok(Json(SearchResponse { results }))
}

/// GET /api/lookup?path= - Direct retrieval by dotted path
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> ApiResult<serde_json::Value> {
    match state.search.lookup(&params.path) {
        Some(node) => Ok(Json(node.to_json())),
        None => Err(not_found(
            format!("Path '{}' not found", params.path),
            state.search.knowledge().section_keys(parent_path(&params.path)),
        )),
    }
}

/// GET /api/knowledge - Top-level section names
pub async fn sections(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.search.knowledge().section_keys(""))
}

/// GET /api/knowledge/:section - One top-level section
pub async fn section(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.root()
        .get(section_key(&name))
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Section not found", kb.section_keys("")))
}

/// GET /api/knowledge/plugins/:name
pub async fn plugin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.find_plugin(&name)
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Plugin not found", kb.plugin_names()))
}

/// GET /api/knowledge/extensions/:name
pub async fn extension(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.find_extension(&name)
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Extension not found", kb.section_keys("extensions")))
}

/// GET /api/knowledge/actions/search/:query - Actions by id or name
pub async fn actions(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Json<Vec<serde_json::Value>> {
    let found = state.search.knowledge().find_action(&query);
    Json(found.into_iter().map(Node::to_json).collect())
}

/// GET /api/knowledge/shortcuts/:category
pub async fn shortcuts(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.root()
        .get("shortcuts")
        .and_then(|s| s.get("essential"))
        .and_then(|s| s.get(&category))
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Category not found", kb.section_keys("shortcuts.essential")))
}

/// GET /api/knowledge/workflows/:kind
pub async fn workflow(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.root()
        .get("workflows")
        .and_then(|w| w.get(&kind))
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Workflow not found", kb.section_keys("workflows")))
}

/// GET /api/knowledge/troubleshooting/:issue
pub async fn troubleshooting(
    State(state): State<Arc<AppState>>,
    Path(issue): Path<String>,
) -> ApiResult<serde_json::Value> {
    let kb = state.search.knowledge();
    kb.troubleshooting(Some(&issue))
        .map(|node| Json(node.to_json()))
        .ok_or_else(|| not_found("Issue not found", kb.troubleshooting_issues()))
}
