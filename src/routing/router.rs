//! Route lookup.
//!
//! # Responsibilities
//! - Scan candidate routes for the first whose predicate holds
//! - Return the matched route or an explicit no-match carrying the last
//!   mismatch reason
//!
//! # Design Decisions
//! - [`SimpleRouter`] scans in registration order
//! - [`CachedRouter`] scans the adaptive cache snapshot and reports hits
//! - Both only load a snapshot; no lock is taken on the lookup path
//! - The reported reason is the one of the last candidate tried

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::StatusCode;

use crate::observability::metrics;
use crate::routing::cache::RouteCache;
use crate::routing::matcher::MismatchReason;
use crate::routing::media_type::MediaType;
use crate::routing::request::RequestView;
use crate::routing::route::{Route, RouteWrap};

/// Registration-ordered list of compiled routes, shared with the registry.
pub type RouteList<H> = Arc<ArcSwap<Vec<Arc<RouteWrap<H>>>>>;

/// A successful lookup.
pub struct Matched<H> {
    pub route: Arc<Route<H>>,
    /// Negotiated response type, when the route declares producible types.
    pub produces: Option<MediaType>,
}

impl<H> fmt::Debug for Matched<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matched")
            .field("route", &self.route.name())
            .field("produces", &self.produces)
            .finish()
    }
}

/// No route accepted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoMatch {
    /// Reason reported by the last candidate; `None` when nothing is registered.
    pub last_mismatch: Option<MismatchReason>,
}

impl NoMatch {
    pub fn status_code(&self) -> StatusCode {
        self.last_mismatch
            .map(|reason| reason.status_code())
            .unwrap_or(StatusCode::NOT_FOUND)
    }
}

/// Trait for looking up the route that serves a request.
pub trait Router<H>: Send + Sync {
    fn route_request(&self, req: &RequestView) -> Result<Matched<H>, NoMatch>;

    /// Convenience lookup that drops the mismatch side channel.
    fn route(&self, req: &RequestView) -> Option<Arc<Route<H>>> {
        self.route_request(req).ok().map(|m| m.route)
    }
}

/// Linear scan in registration order.
pub struct SimpleRouter<H> {
    routes: RouteList<H>,
}

impl<H> SimpleRouter<H> {
    pub fn new(routes: RouteList<H>) -> Self {
        Self { routes }
    }
}

impl<H: Send + Sync> Router<H> for SimpleRouter<H> {
    fn route_request(&self, req: &RequestView) -> Result<Matched<H>, NoMatch> {
        let routes = self.routes.load();
        let mut last_mismatch = None;
        for wrap in routes.iter() {
            match wrap.predicate().evaluate(req) {
                Ok(produces) => {
                    metrics::record_match();
                    return Ok(Matched {
                        route: wrap.route().clone(),
                        produces,
                    });
                }
                Err(reason) => last_mismatch = Some(reason),
            }
        }
        metrics::record_no_match(last_mismatch);
        Err(NoMatch { last_mismatch })
    }
}

/// Scan over the adaptive cache, most-hit routes first.
pub struct CachedRouter<H> {
    cache: Arc<dyn RouteCache<H>>,
}

impl<H> CachedRouter<H> {
    pub fn new(cache: Arc<dyn RouteCache<H>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<dyn RouteCache<H>> {
        &self.cache
    }
}

impl<H: Send + Sync> Router<H> for CachedRouter<H> {
    fn route_request(&self, req: &RequestView) -> Result<Matched<H>, NoMatch> {
        let snapshot = self.cache.lookup();
        let mut last_mismatch = None;
        for counted in snapshot.iter() {
            match counted.wrap().predicate().evaluate(req) {
                Ok(produces) => {
                    self.cache.hit(counted);
                    metrics::record_match();
                    return Ok(Matched {
                        route: counted.wrap().route().clone(),
                        produces,
                    });
                }
                Err(reason) => last_mismatch = Some(reason),
            }
        }
        metrics::record_no_match(last_mismatch);
        Err(NoMatch { last_mismatch })
    }
}
