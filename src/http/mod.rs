//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing layer)
//!     → RequestView (method, normalized path, query + form params, headers)
//!     → Registry lookup
//!     → 200 JSON { route, target, produces } or 404/405/406/415
//! ```

pub mod server;

pub use server::{AppState, MatchServer};
