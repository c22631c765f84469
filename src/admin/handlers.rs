use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::routing::Mapping;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub cached: bool,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct RouteStatus {
    pub name: String,
    pub target: String,
    pub executor: Option<String>,
    pub ambiguous: bool,
    pub mapping: Mapping,
}

#[derive(Serialize)]
pub struct CacheEntry {
    pub position: usize,
    pub name: String,
    pub hits: u64,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub enabled: bool,
    pub compute_rate: u32,
    pub padded: bool,
    pub order: Vec<CacheEntry>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: state.registry.len(),
        cached: state.registry.is_cached(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteStatus>> {
    let ambiguous = state.registry.ambiguous_routes();
    let routes = state
        .registry
        .routes()
        .into_iter()
        .map(|route| RouteStatus {
            name: route.name().to_string(),
            target: route.handler().clone(),
            executor: route.executor().map(str::to_string),
            ambiguous: ambiguous.iter().any(|name| name == route.name()),
            mapping: route.mapping().clone(),
        })
        .collect();
    Json(routes)
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStatus> {
    let config = state.config.load();
    let order = state
        .registry
        .cache_order()
        .into_iter()
        .enumerate()
        .map(|(position, (route, hits))| CacheEntry {
            position,
            name: route.name().to_string(),
            hits,
        })
        .collect();
    Json(CacheStatus {
        enabled: state.registry.is_cached(),
        compute_rate: config.cache.compute_rate,
        padded: config.cache.padded,
        order,
    })
}
