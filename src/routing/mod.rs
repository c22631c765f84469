//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     Route { name, Mapping, handler }
//!     → predicate.rs (compile Mapping into typed stages; bad input rejected here)
//!     → registry.rs (ambiguity warning, append to list, add to cache)
//!
//! Incoming Request:
//!     RequestView (method, normalized path, params, headers)
//!     → router.rs (SimpleRouter: registration order | CachedRouter: cache order)
//!     → predicate.rs (pattern → method → params → headers → consumes → produces)
//!     → Return: Matched { route, produces } or NoMatch { last_mismatch }
//!
//! On a cached match:
//!     cache.rs (hit count; sampled re-rank by hits, published by CAS)
//! ```
//!
//! # Design Decisions
//! - Predicates compiled once at registration, immutable afterwards
//! - No regex in the hot path (glob segments and literal comparisons only)
//! - No lock on the lookup path; snapshots are swapped atomically
//! - First match in scan order wins; among routes that may be ambiguous the
//!   cache keeps registration order unless configured otherwise

pub mod cache;
pub mod expression;
pub mod mapping;
pub mod matcher;
pub mod media_type;
pub mod pattern;
pub mod predicate;
pub mod registry;
pub mod request;
pub mod route;
pub mod router;

pub use cache::{AdaptiveCache, CompactCache, PaddedCache, RouteCache};
pub use mapping::Mapping;
pub use matcher::{Matcher, MismatchReason, Outcome};
pub use media_type::MediaType;
pub use pattern::PathPattern;
pub use predicate::RoutePredicate;
pub use registry::{Registry, SyncReport};
pub use request::RequestView;
pub use route::{CountedRoute, Route, RouteWrap};
pub use router::{CachedRouter, Matched, NoMatch, Router, SimpleRouter};
