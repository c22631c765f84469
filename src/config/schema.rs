//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the matcher.
//! All types derive Serde traits for deserialization from config files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::mapping::Mapping;
use crate::routing::route::Route;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MatcherConfig {
    /// Adaptive route cache settings.
    pub cache: CacheConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Adaptive cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the cached router. When false, lookups scan in registration order.
    pub enabled: bool,

    /// Per-mille chance that a hit triggers a re-rank (0..=1000).
    pub compute_rate: u32,

    /// Keep the hot cache fields on separate cache lines.
    pub padded: bool,

    /// Keep routes flagged as ambiguous in registration order.
    pub preserve_ambiguous_order: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compute_rate: 3,
            padded: false,
            preserve_ambiguous_order: true,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// One route: matching criteria plus the target it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier; unique within a config.
    pub name: String,

    /// Path patterns (`?`, `*`, `**`). Empty matches any path.
    #[serde(default)]
    pub paths: Vec<String>,

    /// HTTP methods. Empty matches any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Query parameter expressions (`name`, `!name`, `name=value`, `name!=value`).
    #[serde(default)]
    pub params: Vec<String>,

    /// Header expressions, same grammar as `params`.
    #[serde(default)]
    pub headers: Vec<String>,

    /// Accepted request body media types.
    #[serde(default)]
    pub consumes: Vec<String>,

    /// Producible response media types.
    #[serde(default)]
    pub produces: Vec<String>,

    /// Opaque target the route resolves to (service name, upstream, ...).
    pub target: String,

    /// Optional executor label handed back with the match.
    #[serde(default)]
    pub executor: Option<String>,
}

impl RouteConfig {
    pub fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        for path in &self.paths {
            mapping = mapping.path(path.as_str());
        }
        for method in &self.methods {
            mapping = mapping.method_name(method.as_str());
        }
        for param in &self.params {
            mapping = mapping.param(param.as_str());
        }
        for header in &self.headers {
            mapping = mapping.header(header.as_str());
        }
        for media_type in &self.consumes {
            mapping = mapping.consumes(media_type.as_str());
        }
        for media_type in &self.produces {
            mapping = mapping.produces(media_type.as_str());
        }
        mapping
    }

    /// Build a registrable route whose handler is the target name.
    pub fn to_route(&self) -> Arc<Route<String>> {
        let mut route = Route::new(self.name.clone(), self.to_mapping(), self.target.clone());
        if let Some(executor) = &self.executor {
            route = route.with_executor(executor.clone());
        }
        Arc::new(route)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: MatcherConfig = toml::from_str(
            r#"
            [[routes]]
            name = "users"
            paths = ["/users/**"]
            target = "users-service"
            "#,
        )
        .unwrap();

        assert!(config.cache.enabled);
        assert_eq!(config.cache.compute_rate, 3);
        assert!(!config.cache.padded);
        assert!(config.cache.preserve_ambiguous_order);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.routes.len(), 1);
        assert!(config.routes[0].methods.is_empty());
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_route_config_builds_mapping() {
        let config: RouteConfig = toml::from_str(
            r#"
            name = "report"
            paths = ["/report", "/report/*"]
            methods = ["get"]
            params = ["format"]
            headers = ["X-Env=prod"]
            produces = ["text/csv"]
            target = "reports"
            executor = "blocking"
            "#,
        )
        .unwrap();

        let route = config.to_route();
        assert_eq!(route.name(), "report");
        assert_eq!(route.handler(), "reports");
        assert_eq!(route.executor(), Some("blocking"));
        let mapping = route.mapping();
        assert_eq!(mapping.paths(), ["/report", "/report/*"]);
        assert_eq!(mapping.methods(), ["GET"]);
        assert_eq!(mapping.params(), ["format"]);
        assert_eq!(mapping.headers(), ["X-Env=prod"]);
        assert_eq!(mapping.produces_types(), ["text/csv"]);
        assert!(mapping.consumes_types().is_empty());
    }
}
