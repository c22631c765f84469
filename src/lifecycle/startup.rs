//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from validated configuration
//! - Apply reloaded configurations to a running registry

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigUpdate;
use crate::config::MatcherConfig;
use crate::error::RouteResult;
use crate::observability::metrics;
use crate::routing::{Registry, SyncReport};

/// Create a registry and register every configured route in order.
pub fn build_registry(config: &MatcherConfig) -> RouteResult<Registry<String>> {
    let registry = Registry::new(&config.cache);
    for route in &config.routes {
        registry.register(route.to_route())?;
    }
    tracing::info!(
        routes = registry.len(),
        cached = registry.is_cached(),
        "Registry ready"
    );
    Ok(registry)
}

/// Reconcile the registry with a reloaded config and publish the config.
pub fn apply_config(
    registry: &Registry<String>,
    current: &ArcSwap<MatcherConfig>,
    config: MatcherConfig,
) -> SyncReport {
    let desired = config.routes.iter().map(|r| r.to_route()).collect();
    let report = registry.sync_routes(desired);
    if config.cache != current.load().cache {
        tracing::warn!("Cache settings changed; they take effect on restart");
    }
    current.store(Arc::new(config));
    report
}

/// Apply reload attempts from the watcher until the channel closes.
///
/// A rejected file leaves the running configuration untouched.
pub async fn run_reload_loop(
    registry: Arc<Registry<String>>,
    current: Arc<ArcSwap<MatcherConfig>>,
    mut updates: mpsc::UnboundedReceiver<ConfigUpdate>,
) {
    while let Some(update) = updates.recv().await {
        let config = match update {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Config reload rejected, keeping current configuration"
                );
                metrics::record_config_reload("rejected");
                continue;
            }
        };

        let report = apply_config(&registry, &current, config);
        for (route, error) in &report.failed {
            tracing::warn!(route = %route, error = %error, "Route not registered on reload");
        }
        tracing::info!(
            added = report.added.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "Configuration reloaded"
        );
        let outcome = if report.failed.is_empty() { "applied" } else { "partial" };
        metrics::record_config_reload(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::routing::RequestView;
    use axum::http::Method;

    const INITIAL: &str = r#"
        [[routes]]
        name = "users"
        paths = ["/users/**"]
        target = "users-v1"

        [[routes]]
        name = "orders"
        paths = ["/orders"]
        target = "orders"
    "#;

    const RELOADED: &str = r#"
        [[routes]]
        name = "users"
        paths = ["/users/**"]
        target = "users-v2"

        [[routes]]
        name = "health"
        paths = ["/health"]
        target = "self"
    "#;

    #[test]
    fn test_build_then_reload() {
        let config = parse_config(INITIAL).unwrap();
        let registry = build_registry(&config).unwrap();
        let current = ArcSwap::from_pointee(config);
        assert_eq!(registry.len(), 2);

        let report = apply_config(&registry, &current, parse_config(RELOADED).unwrap());
        assert_eq!(report.removed, ["users", "orders"]);
        assert_eq!(report.added, ["users", "health"]);

        let users = registry
            .route(&RequestView::new(Method::GET, "/users/7"))
            .unwrap();
        assert_eq!(users.handler(), "users-v2");
        assert!(registry.route(&RequestView::new(Method::GET, "/orders")).is_none());
        assert_eq!(current.load().routes.len(), 2);
    }
}
