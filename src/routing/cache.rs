//! Adaptive route cache.
//!
//! # Responsibilities
//! - Hold a snapshot of every registered route, most-hit first
//! - Count hits and, on a sampled fraction of them, re-rank the snapshot
//! - Apply registrations and removals synchronously
//!
//! # Concurrency
//! ```text
//! readers:   load snapshot ──▶ scan ──▶ hit(route): fetch_add
//!                                          │ sampled (compute_rate / 1000)
//!                                          ▼
//!            gate CAS idle→busy ── fail ──▶ done (no retry, no wait)
//!                  │ ok
//!                  ▼
//!            sort copy by hits ──▶ CAS snapshot (lost to add/remove? discard)
//!                  ──▶ gate busy→idle
//! writers:   rcu(copy ± route) ──▶ swap (retried until it lands)
//! ```
//!
//! # Design Decisions
//! - Snapshots are never mutated in place; every change publishes a new `Arc`
//! - A recomputation only publishes over the exact snapshot it sorted, so it
//!   can never resurrect a removed route or drop an added one
//! - All state is per instance; independent registries never interfere
//! - The padded layout keeps the snapshot pointer and the gate on separate
//!   cache lines; the compact layout is the default

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::config::schema::CacheConfig;
use crate::observability::metrics;
use crate::routing::route::{CountedRoute, Route, RouteWrap};

/// Upper bound of `compute_rate` (per mille).
pub const MAX_COMPUTE_RATE: u32 = 1000;

/// The ordered routes the cached router scans.
pub type Snapshot<H> = Vec<Arc<CountedRoute<H>>>;

/// Operations a cached router needs from its cache.
pub trait RouteCache<H>: Send + Sync {
    /// Current snapshot; stays valid while held even if a newer one is
    /// published.
    fn lookup(&self) -> Guard<Arc<Snapshot<H>>>;

    /// Append a newly registered route.
    fn add(&self, wrap: Arc<RouteWrap<H>>);

    /// Drop a route. Returns false if it was not cached.
    fn remove(&self, route: &Arc<Route<H>>) -> bool;

    /// Record a match and maybe re-rank.
    fn hit(&self, counted: &CountedRoute<H>);

    /// Routes with their hit counts, in scan order.
    fn ranking(&self) -> Vec<(Arc<Route<H>>, u64)> {
        self.lookup()
            .iter()
            .map(|c| (c.wrap().route().clone(), c.hits()))
            .collect()
    }
}

/// Storage for the two independently written hot fields.
pub trait CacheSlots<H>: Send + Sync {
    fn new(initial: Snapshot<H>) -> Self;
    fn snapshot(&self) -> &ArcSwap<Snapshot<H>>;
    fn gate(&self) -> &AtomicBool;
}

/// Hot fields side by side.
pub struct CompactSlots<H> {
    snapshot: ArcSwap<Snapshot<H>>,
    computing: AtomicBool,
}

impl<H: Send + Sync> CacheSlots<H> for CompactSlots<H> {
    fn new(initial: Snapshot<H>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(initial),
            computing: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> &ArcSwap<Snapshot<H>> {
        &self.snapshot
    }

    fn gate(&self) -> &AtomicBool {
        &self.computing
    }
}

/// Aligns (and so pads) its content to a 64-byte cache line.
#[repr(align(64))]
pub struct CachePadded<T>(T);

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Hot fields on separate cache lines.
pub struct PaddedSlots<H> {
    snapshot: CachePadded<ArcSwap<Snapshot<H>>>,
    computing: CachePadded<AtomicBool>,
}

impl<H: Send + Sync> CacheSlots<H> for PaddedSlots<H> {
    fn new(initial: Snapshot<H>) -> Self {
        Self {
            snapshot: CachePadded(ArcSwap::from_pointee(initial)),
            computing: CachePadded(AtomicBool::new(false)),
        }
    }

    fn snapshot(&self) -> &ArcSwap<Snapshot<H>> {
        &self.snapshot
    }

    fn gate(&self) -> &AtomicBool {
        &self.computing
    }
}

/// Releases the recomputation gate even if sorting panics.
struct GateGuard<'a>(&'a AtomicBool);

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Self-reordering route snapshot.
pub struct AdaptiveCache<H, S = CompactSlots<H>> {
    slots: S,
    compute_rate: u32,
    preserve_ambiguous_order: bool,
    _routes: PhantomData<fn() -> H>,
}

pub type CompactCache<H> = AdaptiveCache<H, CompactSlots<H>>;
pub type PaddedCache<H> = AdaptiveCache<H, PaddedSlots<H>>;

impl<H, S> AdaptiveCache<H, S>
where
    H: Send + Sync + 'static,
    S: CacheSlots<H>,
{
    pub fn new(config: &CacheConfig) -> Self {
        let compute_rate = if config.compute_rate > MAX_COMPUTE_RATE {
            tracing::warn!(
                compute_rate = config.compute_rate,
                max = MAX_COMPUTE_RATE,
                "Cache compute rate out of range, clamping"
            );
            MAX_COMPUTE_RATE
        } else {
            config.compute_rate
        };
        Self {
            slots: S::new(Vec::new()),
            compute_rate,
            preserve_ambiguous_order: config.preserve_ambiguous_order,
            _routes: PhantomData,
        }
    }

    pub fn compute_rate(&self) -> u32 {
        self.compute_rate
    }

    pub fn len(&self) -> usize {
        self.slots.snapshot().load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sampled(&self) -> bool {
        match self.compute_rate {
            0 => false,
            MAX_COMPUTE_RATE => true,
            rate => fastrand::u32(0..MAX_COMPUTE_RATE) < rate,
        }
    }

    /// Rebuild the snapshot by descending hit count and try to publish it.
    ///
    /// Returns true if a new order was published.
    fn recompute(&self) -> bool {
        let current = self.slots.snapshot().load_full();

        // Freeze counts first; live counters would break the sort's ordering.
        let mut ranked: Vec<(u64, Arc<CountedRoute<H>>)> =
            current.iter().map(|c| (c.hits(), c.clone())).collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        let mut next: Snapshot<H> = ranked.into_iter().map(|(_, c)| c).collect();

        if self.preserve_ambiguous_order {
            restore_pinned_order(&mut next);
        }

        if next.iter().zip(current.iter()).all(|(a, b)| Arc::ptr_eq(a, b)) {
            return false;
        }

        let previous = self
            .slots
            .snapshot()
            .compare_and_swap(&current, Arc::new(next));
        let published = Arc::ptr_eq(&*previous, &current);
        if published {
            tracing::debug!(routes = current.len(), "Route cache re-ranked");
        } else {
            tracing::debug!("Route cache re-rank discarded after concurrent update");
        }
        metrics::record_cache_recompute(published);
        published
    }
}

/// Give the slots occupied by pinned routes back to those routes in
/// registration order, leaving every other route where sorting put it.
fn restore_pinned_order<H>(routes: &mut Snapshot<H>) {
    let slots: Vec<usize> = routes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.wrap().is_pinned())
        .map(|(i, _)| i)
        .collect();
    if slots.len() < 2 {
        return;
    }
    let mut pinned: Vec<Arc<CountedRoute<H>>> = slots.iter().map(|&i| routes[i].clone()).collect();
    pinned.sort_by_key(|c| c.wrap().sequence());
    for (slot, counted) in slots.into_iter().zip(pinned) {
        routes[slot] = counted;
    }
}

impl<H, S> RouteCache<H> for AdaptiveCache<H, S>
where
    H: Send + Sync + 'static,
    S: CacheSlots<H>,
{
    fn lookup(&self) -> Guard<Arc<Snapshot<H>>> {
        self.slots.snapshot().load()
    }

    fn add(&self, wrap: Arc<RouteWrap<H>>) {
        let counted = Arc::new(CountedRoute::new(wrap));
        self.slots.snapshot().rcu(|current| {
            let mut next = (**current).clone();
            next.push(counted.clone());
            next
        });
    }

    fn remove(&self, route: &Arc<Route<H>>) -> bool {
        let previous = self.slots.snapshot().rcu(|current| {
            current
                .iter()
                .filter(|c| !c.wrap().is(route))
                .cloned()
                .collect::<Snapshot<H>>()
        });
        previous.iter().any(|c| c.wrap().is(route))
    }

    fn hit(&self, counted: &CountedRoute<H>) {
        counted.hit();
        if !self.sampled() {
            return;
        }
        let gate = self.slots.gate();
        if gate
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let _release = GateGuard(gate);
        self.recompute();
    }
}

impl<H, S> fmt::Debug for AdaptiveCache<H, S>
where
    H: Send + Sync + 'static,
    S: CacheSlots<H>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveCache")
            .field("routes", &self.len())
            .field("compute_rate", &self.compute_rate)
            .field("preserve_ambiguous_order", &self.preserve_ambiguous_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::mapping::Mapping;

    fn config(compute_rate: u32, preserve_ambiguous_order: bool) -> CacheConfig {
        CacheConfig {
            compute_rate,
            preserve_ambiguous_order,
            ..CacheConfig::default()
        }
    }

    fn wrap(name: &str, sequence: u64) -> Arc<RouteWrap<()>> {
        let route = Arc::new(Route::new(name, Mapping::new().path(format!("/{}", name)), ()));
        Arc::new(RouteWrap::compile(route, sequence).unwrap())
    }

    fn names<S: CacheSlots<()>>(cache: &AdaptiveCache<(), S>) -> Vec<String> {
        cache
            .lookup()
            .iter()
            .map(|c| c.wrap().route().name().to_string())
            .collect()
    }

    fn hit_n<S: CacheSlots<()>>(cache: &AdaptiveCache<(), S>, name: &str, n: usize) {
        for _ in 0..n {
            let snapshot = cache.lookup();
            let counted = snapshot
                .iter()
                .find(|c| c.wrap().route().name() == name)
                .unwrap()
                .clone();
            cache.hit(&counted);
        }
    }

    #[test]
    fn test_add_remove_keep_insertion_order() {
        let cache = CompactCache::new(&config(0, true));
        let a = wrap("a", 0);
        let b = wrap("b", 1);
        let c = wrap("c", 2);
        cache.add(a.clone());
        cache.add(b.clone());
        cache.add(c);
        assert_eq!(names(&cache), ["a", "b", "c"]);

        assert!(cache.remove(b.route()));
        assert!(!cache.remove(b.route()));
        assert_eq!(names(&cache), ["a", "c"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_held_snapshot_is_unaffected_by_writes() {
        let cache = CompactCache::new(&config(0, true));
        cache.add(wrap("a", 0));
        let held = cache.lookup();
        cache.add(wrap("b", 1));
        assert_eq!(held.len(), 1);
        assert_eq!(cache.lookup().len(), 2);
    }

    #[test]
    fn test_hits_reorder_when_always_sampled() {
        let cache = CompactCache::new(&config(MAX_COMPUTE_RATE, true));
        cache.add(wrap("a", 0));
        cache.add(wrap("b", 1));
        cache.add(wrap("c", 2));

        hit_n(&cache, "c", 3);
        hit_n(&cache, "b", 1);
        assert_eq!(names(&cache), ["c", "b", "a"]);

        let ranking = cache.ranking();
        assert_eq!(ranking[0].1, 3);
        assert_eq!(ranking[2].1, 0);
    }

    #[test]
    fn test_zero_rate_never_reorders() {
        let cache = CompactCache::new(&config(0, true));
        cache.add(wrap("a", 0));
        cache.add(wrap("b", 1));
        hit_n(&cache, "b", 50);
        assert_eq!(names(&cache), ["a", "b"]);
        assert_eq!(cache.ranking()[1].1, 50);
    }

    #[test]
    fn test_busy_gate_skips_recompute_but_counts() {
        let cache = CompactCache::new(&config(MAX_COMPUTE_RATE, true));
        cache.add(wrap("a", 0));
        cache.add(wrap("b", 1));
        cache.slots.gate().store(true, Ordering::Release);

        hit_n(&cache, "b", 5);
        assert_eq!(names(&cache), ["a", "b"]);
        assert_eq!(cache.ranking()[1].1, 5);

        cache.slots.gate().store(false, Ordering::Release);
        hit_n(&cache, "b", 1);
        assert_eq!(names(&cache), ["b", "a"]);
        assert!(!cache.slots.gate().load(Ordering::Acquire));
    }

    #[test]
    fn test_pinned_routes_keep_registration_order() {
        let cache = CompactCache::new(&config(MAX_COMPUTE_RATE, true));
        let first = wrap("first", 0);
        let other = wrap("other", 1);
        let second = wrap("second", 2);
        first.pin();
        second.pin();
        cache.add(first);
        cache.add(other);
        cache.add(second);

        hit_n(&cache, "second", 10);
        hit_n(&cache, "other", 5);
        // `second` earned the front slot, but that slot goes to `first`.
        assert_eq!(names(&cache), ["first", "other", "second"]);
    }

    #[test]
    fn test_pinned_routes_float_when_not_preserved() {
        let cache = CompactCache::new(&config(MAX_COMPUTE_RATE, false));
        let first = wrap("first", 0);
        let second = wrap("second", 1);
        first.pin();
        second.pin();
        cache.add(first);
        cache.add(second);

        hit_n(&cache, "second", 3);
        assert_eq!(names(&cache), ["second", "first"]);
    }

    #[test]
    fn test_compute_rate_is_clamped() {
        let cache = CompactCache::<()>::new(&config(5000, true));
        assert_eq!(cache.compute_rate(), MAX_COMPUTE_RATE);
    }

    #[test]
    fn test_padded_layout_separates_hot_fields() {
        assert!(std::mem::align_of::<PaddedSlots<()>>() >= 64);
        let snapshot = std::mem::offset_of!(PaddedSlots<()>, snapshot);
        let computing = std::mem::offset_of!(PaddedSlots<()>, computing);
        assert!(snapshot.abs_diff(computing) >= 64);

        let cache = PaddedCache::new(&config(MAX_COMPUTE_RATE, true));
        cache.add(wrap("a", 0));
        cache.add(wrap("b", 1));
        hit_n(&cache, "b", 2);
        assert_eq!(names(&cache), ["b", "a"]);
    }
}
