//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use route_matcher::config::{CacheConfig, MatcherConfig};
use route_matcher::http::{AppState, MatchServer};
use route_matcher::lifecycle::Shutdown;
use route_matcher::routing::{Mapping, Registry, RequestView, Route};
use tokio::net::TcpListener;

pub fn cache(enabled: bool, compute_rate: u32, padded: bool) -> CacheConfig {
    CacheConfig {
        enabled,
        compute_rate,
        padded,
        ..CacheConfig::default()
    }
}

pub fn route(name: &str, mapping: Mapping) -> Arc<Route<String>> {
    Arc::new(Route::new(name, mapping, format!("{}-target", name)))
}

pub fn get(path: &str) -> RequestView {
    RequestView::new(Method::GET, path)
}

/// Name of the route a request resolves to, if any.
pub fn resolve(registry: &Registry<String>, req: &RequestView) -> Option<String> {
    registry.route(req).map(|r| r.name().to_string())
}

/// Serve `config` on `addr` until the returned coordinator is triggered.
pub async fn start_server(addr: SocketAddr, config: MatcherConfig) -> Shutdown {
    let registry = Arc::new(
        route_matcher::lifecycle::startup::build_registry(&config).expect("config routes compile"),
    );
    let state = AppState::new(registry, config);
    let listener = TcpListener::bind(addr).await.expect("bind test listener");
    let shutdown = Shutdown::new();
    let server = MatchServer::new(state);
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown
}
