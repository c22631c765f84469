//! Registration-time error definitions.
//!
//! Matching itself never fails: a request that matches nothing is reported
//! through [`crate::routing::NoMatch`]. Everything here is raised while a
//! route's criteria are compiled or while it is handed to a registry.

use thiserror::Error;

/// Errors raised while compiling or registering a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A path pattern could not be parsed.
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    /// A parameter or header expression could not be parsed.
    #[error("invalid expression {expression:?}: {reason}")]
    InvalidExpression {
        expression: String,
        reason: &'static str,
    },

    /// A consumes/produces media type could not be parsed.
    #[error("invalid media type {media_type:?}: {reason}")]
    InvalidMediaType {
        media_type: String,
        reason: &'static str,
    },

    /// An HTTP method token was not valid.
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    /// The same route instance was registered twice.
    #[error("route {0:?} is already registered")]
    AlreadyRegistered(String),
}

/// Result alias for registration-time operations.
pub type RouteResult<T> = Result<T, RouteError>;
