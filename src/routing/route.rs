//! Route values and their compiled wrappers.
//!
//! A [`Route`] is created by the caller and handed to a registry inside an
//! `Arc`; that `Arc` is the route's identity for the rest of its life.
//! Registration wraps it into a [`RouteWrap`] (route + compiled predicate),
//! and the adaptive cache wraps that again into a [`CountedRoute`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::RouteResult;
use crate::routing::mapping::Mapping;
use crate::routing::predicate::RoutePredicate;

/// A handler binding: criteria plus an opaque handler.
pub struct Route<H> {
    name: String,
    mapping: Mapping,
    handler: H,
    executor: Option<String>,
}

impl<H> Route<H> {
    pub fn new(name: impl Into<String>, mapping: Mapping, handler: H) -> Self {
        Self {
            name: name.into(),
            mapping,
            handler,
            executor: None,
        }
    }

    /// Label of the executor that should run the handler. Not interpreted
    /// by the matcher.
    pub fn with_executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = Some(executor.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }
}

impl<H> fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("mapping", &self.mapping)
            .field("executor", &self.executor)
            .finish()
    }
}

/// A registered route with its compiled predicate.
pub struct RouteWrap<H> {
    route: Arc<Route<H>>,
    predicate: RoutePredicate,
    sequence: u64,
    /// Set once the route is found ambiguous with another registered route.
    pinned: AtomicBool,
}

impl<H> RouteWrap<H> {
    /// Compile the route's mapping. `sequence` is its registration order.
    pub fn compile(route: Arc<Route<H>>, sequence: u64) -> RouteResult<Self> {
        let predicate = RoutePredicate::compile(route.mapping())?;
        Ok(Self {
            route,
            predicate,
            sequence,
            pinned: AtomicBool::new(false),
        })
    }

    pub fn route(&self) -> &Arc<Route<H>> {
        &self.route
    }

    pub fn predicate(&self) -> &RoutePredicate {
        &self.predicate
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// True if this wrap holds exactly `route` (pointer identity).
    pub fn is(&self, route: &Arc<Route<H>>) -> bool {
        Arc::ptr_eq(&self.route, route)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.load(Ordering::Acquire)
    }

    pub(crate) fn pin(&self) {
        self.pinned.store(true, Ordering::Release);
    }
}

impl<H> fmt::Debug for RouteWrap<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteWrap")
            .field("route", &self.route.name)
            .field("sequence", &self.sequence)
            .field("pinned", &self.is_pinned())
            .finish()
    }
}

/// A registered route together with its hit counter.
pub struct CountedRoute<H> {
    wrap: Arc<RouteWrap<H>>,
    hits: AtomicU64,
}

impl<H> CountedRoute<H> {
    pub fn new(wrap: Arc<RouteWrap<H>>) -> Self {
        Self {
            wrap,
            hits: AtomicU64::new(0),
        }
    }

    pub fn wrap(&self) -> &Arc<RouteWrap<H>> {
        &self.wrap
    }

    /// Increment and return the new count.
    pub fn hit(&self) -> u64 {
        self.hits.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

impl<H> fmt::Debug for CountedRoute<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedRoute")
            .field("route", &self.wrap.route.name)
            .field("hits", &self.hits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_wrap_identity_and_counter() {
        let route = Arc::new(Route::new("users", Mapping::new().path("/users"), ()));
        let twin = Arc::new(Route::new("users", Mapping::new().path("/users"), ()));
        let wrap = Arc::new(RouteWrap::compile(route.clone(), 7).unwrap());

        assert!(wrap.is(&route));
        assert!(!wrap.is(&twin));
        assert_eq!(wrap.sequence(), 7);
        assert!(!wrap.is_pinned());
        wrap.pin();
        assert!(wrap.is_pinned());

        let counted = CountedRoute::new(wrap);
        assert_eq!(counted.hit(), 1);
        assert_eq!(counted.hit(), 2);
        assert_eq!(counted.hits(), 2);
    }

    #[test]
    fn test_compile_error_keeps_route_out() {
        let route = Arc::new(Route::new(
            "broken",
            Mapping::new().path("/ok").method(Method::GET).produces("nope"),
            (),
        ));
        assert!(RouteWrap::compile(route, 0).is_err());
    }

    #[test]
    fn test_executor_label() {
        let route = Route::new("r", Mapping::new(), 5u8).with_executor("blocking");
        assert_eq!(route.executor(), Some("blocking"));
        assert_eq!(*route.handler(), 5);
    }
}
