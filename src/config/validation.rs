//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (compute rate, addresses)
//! - Check route names are present and unique
//! - Compile every route mapping so bad patterns fail before reload
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MatcherConfig;
use crate::error::RouteError;
use crate::routing::cache::MAX_COMPUTE_RATE;
use crate::routing::predicate::RoutePredicate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cache.compute_rate must be at most 1000, got {0}")]
    ComputeRateOutOfRange(u32),

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("route #{index} has an empty name")]
    EmptyRouteName { index: usize },

    #[error("duplicate route name: {0}")]
    DuplicateRouteName(String),

    #[error("route {0} has an empty target")]
    EmptyTarget(String),

    #[error("route {route}: {source}")]
    InvalidRoute { route: String, source: RouteError },
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

pub fn validate_config(config: &MatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cache.compute_rate > MAX_COMPUTE_RATE {
        errors.push(ValidationError::ComputeRateOutOfRange(config.cache.compute_rate));
    }

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.admin.enabled {
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        } else if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }
        if route.target.trim().is_empty() {
            errors.push(ValidationError::EmptyTarget(route.name.clone()));
        }
        if let Err(source) = RoutePredicate::compile(&route.to_mapping()) {
            errors.push(ValidationError::InvalidRoute {
                route: route.name.clone(),
                source,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
