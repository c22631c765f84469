//! Route registry.
//!
//! # Responsibilities
//! - Own the registration-ordered list of compiled routes
//! - Keep the adaptive cache (when enabled) in step with that list
//! - Warn about routes that may be ambiguous with earlier ones
//! - Reconcile against a new route set on config reload
//!
//! # Design Decisions
//! - Writers are serialized by a mutex that lookups never touch
//! - The list and the cache are both updated before a write returns, so a
//!   lookup that starts afterwards sees the change
//! - Ambiguity is reported, never refused; both routes are pinned so the cache
//!   keeps them in registration order when configured to

use std::fmt;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::config::schema::CacheConfig;
use crate::error::{RouteError, RouteResult};
use crate::observability::metrics;
use crate::routing::cache::{CompactCache, PaddedCache, RouteCache};
use crate::routing::request::RequestView;
use crate::routing::route::{Route, RouteWrap};
use crate::routing::router::{CachedRouter, Matched, NoMatch, RouteList, Router, SimpleRouter};

/// Outcome of [`Registry::sync_routes`].
#[derive(Debug, Default)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<(String, RouteError)>,
}

/// Authoritative set of registered routes plus the router reading it.
pub struct Registry<H> {
    routes: RouteList<H>,
    cache: Option<Arc<dyn RouteCache<H>>>,
    router: Box<dyn Router<H>>,
    /// Serializes writers; holds the next registration sequence number.
    writer: Mutex<u64>,
}

impl<H: Send + Sync + 'static> Registry<H> {
    pub fn new(config: &CacheConfig) -> Self {
        let routes: RouteList<H> = Arc::new(ArcSwap::from_pointee(Vec::new()));
        let cache: Option<Arc<dyn RouteCache<H>>> = match (config.enabled, config.padded) {
            (false, _) => None,
            (true, true) => Some(Arc::new(PaddedCache::new(config))),
            (true, false) => Some(Arc::new(CompactCache::new(config))),
        };
        let router: Box<dyn Router<H>> = match &cache {
            Some(cache) => Box::new(CachedRouter::new(cache.clone())),
            None => Box::new(SimpleRouter::new(routes.clone())),
        };
        tracing::debug!(
            cached = config.enabled,
            padded = config.padded,
            compute_rate = config.compute_rate,
            "Route registry created"
        );
        Self {
            routes,
            cache,
            router,
            writer: Mutex::new(0),
        }
    }

    /// Compile and add a route. It takes part in lookups once this returns.
    pub fn register(&self, route: Arc<Route<H>>) -> RouteResult<()> {
        let mut next_sequence = self.writer.lock().expect("registry writer mutex poisoned");
        self.register_locked(&mut next_sequence, route)
    }

    fn register_locked(&self, next_sequence: &mut u64, route: Arc<Route<H>>) -> RouteResult<()> {
        let current = self.routes.load_full();
        if current.iter().any(|w| w.is(&route)) {
            return Err(RouteError::AlreadyRegistered(route.name().to_string()));
        }

        let wrap = Arc::new(RouteWrap::compile(route, *next_sequence)?);
        *next_sequence += 1;

        for existing in current.iter() {
            if existing.predicate().may_ambiguous_with(wrap.predicate()) {
                tracing::warn!(
                    route = wrap.route().name(),
                    existing = existing.route().name(),
                    "Route may be ambiguous with an already registered route"
                );
                existing.pin();
                wrap.pin();
            }
        }

        let mut next = (*current).clone();
        next.push(wrap.clone());
        let count = next.len();
        self.routes.store(Arc::new(next));
        if let Some(cache) = &self.cache {
            cache.add(wrap.clone());
        }

        metrics::set_registered_routes(count);
        tracing::info!(
            route = wrap.route().name(),
            sequence = wrap.sequence(),
            "Route registered"
        );
        Ok(())
    }

    /// Remove a route. Returns false if it was not registered.
    pub fn deregister(&self, route: &Arc<Route<H>>) -> bool {
        let _writer = self.writer.lock().expect("registry writer mutex poisoned");
        self.deregister_locked(route)
    }

    fn deregister_locked(&self, route: &Arc<Route<H>>) -> bool {
        let current = self.routes.load_full();
        if !current.iter().any(|w| w.is(route)) {
            return false;
        }

        let next: Vec<Arc<RouteWrap<H>>> = current
            .iter()
            .filter(|w| !w.is(route))
            .cloned()
            .collect();
        let count = next.len();
        self.routes.store(Arc::new(next));
        if let Some(cache) = &self.cache {
            cache.remove(route);
        }

        metrics::set_registered_routes(count);
        tracing::info!(route = route.name(), "Route deregistered");
        true
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> Vec<Arc<Route<H>>> {
        self.routes.load().iter().map(|w| w.route().clone()).collect()
    }

    /// First registered route with this name.
    pub fn find(&self, name: &str) -> Option<Arc<Route<H>>> {
        self.routes
            .load()
            .iter()
            .find(|w| w.route().name() == name)
            .map(|w| w.route().clone())
    }

    /// Names of routes flagged as possibly ambiguous.
    pub fn ambiguous_routes(&self) -> Vec<String> {
        self.routes
            .load()
            .iter()
            .filter(|w| w.is_pinned())
            .map(|w| w.route().name().to_string())
            .collect()
    }

    pub fn route(&self, req: &RequestView) -> Option<Arc<Route<H>>> {
        self.router.route(req)
    }

    /// Lookup with the last mismatch reason on failure.
    pub fn route_request(&self, req: &RequestView) -> Result<Matched<H>, NoMatch> {
        self.router.route_request(req)
    }

    /// Scan order with hit counts. Without a cache this is registration
    /// order and every count is zero.
    pub fn cache_order(&self) -> Vec<(Arc<Route<H>>, u64)> {
        match &self.cache {
            Some(cache) => cache.ranking(),
            None => self.routes().into_iter().map(|r| (r, 0)).collect(),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> Registry<H>
where
    H: PartialEq + Send + Sync + 'static,
{
    /// Reconcile with `desired` by route name.
    ///
    /// Routes whose name is gone, or whose mapping, handler or executor
    /// changed, are removed; new and changed routes are registered after the
    /// kept ones. Unchanged routes keep their position and hit counts.
    pub fn sync_routes(&self, desired: Vec<Arc<Route<H>>>) -> SyncReport {
        let mut next_sequence = self.writer.lock().expect("registry writer mutex poisoned");
        let mut report = SyncReport::default();

        let current = self.routes.load_full();
        for wrap in current.iter() {
            let existing = wrap.route();
            let kept = desired.iter().any(|d| {
                d.name() == existing.name()
                    && d.mapping() == existing.mapping()
                    && d.handler() == existing.handler()
                    && d.executor() == existing.executor()
            });
            if kept {
                report.unchanged.push(existing.name().to_string());
            } else if self.deregister_locked(existing) {
                report.removed.push(existing.name().to_string());
            }
        }

        for route in desired {
            if report.unchanged.iter().any(|name| name == route.name()) {
                continue;
            }
            let name = route.name().to_string();
            match self.register_locked(&mut next_sequence, route) {
                Ok(()) => report.added.push(name),
                Err(e) => {
                    tracing::error!(route = %name, error = %e, "Route rejected during sync");
                    report.failed.push((name, e));
                }
            }
        }

        tracing::info!(
            added = report.added.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "Routes synchronized"
        );
        report
    }
}

impl<H> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("routes", &self.routes.load().len())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
