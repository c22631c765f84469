//! Request-to-route matching library.
//!
//! Routes are described declaratively ([`routing::Mapping`]), compiled once on
//! registration and looked up lock-free, optionally through a cache that
//! reorders itself by observed traffic.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::MatcherConfig;
pub use error::{RouteError, RouteResult};
pub use http::MatchServer;
pub use lifecycle::Shutdown;
pub use routing::{Mapping, Registry, RequestView, Route};
