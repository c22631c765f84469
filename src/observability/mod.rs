//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing, config, http, admin produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (atomic increments behind the `metrics` facade)
//! - Nothing is recorded unless an exporter is installed
//! - No per-candidate events on the lookup path

pub mod logging;
pub mod metrics;
