//! Cache behaviour under skewed traffic.

use std::sync::Arc;
use std::thread;

use axum::http::{Method, StatusCode};
use route_matcher::config::CacheConfig;
use route_matcher::routing::{Mapping, MismatchReason, Registry, RequestView};

mod common;

fn names(registry: &Registry<String>) -> Vec<String> {
    registry
        .cache_order()
        .into_iter()
        .map(|(r, _)| r.name().to_string())
        .collect()
}

#[test]
fn test_hot_route_moves_to_front() {
    let registry = Registry::new(&common::cache(true, 1000, false));
    for name in ["a", "b", "c", "d"] {
        registry
            .register(common::route(name, Mapping::new().path(format!("/{}", name))))
            .unwrap();
    }

    for _ in 0..30 {
        registry.route(&common::get("/d")).unwrap();
    }
    for _ in 0..10 {
        registry.route(&common::get("/c")).unwrap();
    }
    assert_eq!(names(&registry), ["d", "c", "a", "b"]);

    let hits: Vec<u64> = registry.cache_order().into_iter().map(|(_, h)| h).collect();
    assert_eq!(hits, [30, 10, 0, 0]);
}

#[test]
fn test_low_rate_eventually_reorders() {
    let registry = Registry::new(&CacheConfig::default());
    registry.register(common::route("cold", Mapping::new().path("/cold"))).unwrap();
    registry.register(common::route("hot", Mapping::new().path("/hot"))).unwrap();

    // 3 per mille: 20k hits makes a miss astronomically unlikely
    for _ in 0..20_000 {
        registry.route(&common::get("/hot")).unwrap();
    }
    assert_eq!(names(&registry)[0], "hot");
}

#[test]
fn test_skewed_parallel_load_keeps_answers_correct() {
    let registry = Arc::new(Registry::new(&common::cache(true, 1000, true)));
    for i in 0..10 {
        registry
            .register(common::route(
                &format!("r{}", i),
                Mapping::new().path(format!("/r{}/*", i)).method(Method::GET),
            ))
            .unwrap();
    }

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for n in 0..2_000usize {
                    let i = if n % 10 == 0 { n / 10 % 10 } else { 9 };
                    let req = common::get(&format!("/r{}/x", i));
                    assert_eq!(
                        common::resolve(&registry, &req),
                        Some(format!("r{}", i))
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(names(&registry)[0], "r9");
    let total: u64 = registry.cache_order().into_iter().map(|(_, h)| h).sum();
    assert_eq!(total, 6 * 2_000);
}

#[test]
fn test_cached_and_simple_agree_on_ambiguous_routes() {
    let mappings = [
        ("exact", Mapping::new().path("/files/readme").method(Method::GET)),
        ("glob", Mapping::new().path("/files/*").method(Method::GET)),
        ("deep", Mapping::new().path("/files/**")),
    ];
    let cached = Registry::new(&common::cache(true, 1000, false));
    let pinned = Registry::new(&common::cache(true, 1000, true));
    let simple = Registry::new(&common::cache(false, 0, false));
    for registry in [&cached, &pinned, &simple] {
        for (name, mapping) in mappings.iter() {
            registry.register(common::route(name, mapping.clone())).unwrap();
        }
        assert_eq!(registry.ambiguous_routes(), ["exact", "glob", "deep"]);
        // drive traffic to the broadest route
        for _ in 0..50 {
            registry
                .route(&RequestView::new(Method::DELETE, "/files/a/b"))
                .unwrap();
        }
    }

    let probe = common::get("/files/readme");
    assert_eq!(common::resolve(&simple, &probe).as_deref(), Some("exact"));
    assert_eq!(common::resolve(&pinned, &probe).as_deref(), Some("exact"));
    // unpinned order follows traffic and lets the hot route shadow the others
    assert_eq!(common::resolve(&cached, &probe).as_deref(), Some("deep"));
}

#[test]
fn test_status_selection_from_last_reason() {
    let registry = Registry::new(&CacheConfig::default());
    registry
        .register(common::route(
            "upload",
            Mapping::new()
                .path("/upload")
                .method(Method::POST)
                .consumes("application/json")
                .produces("application/json"),
        ))
        .unwrap();

    let cases = [
        (
            RequestView::new(Method::GET, "/upload"),
            MismatchReason::MethodMismatch,
            StatusCode::METHOD_NOT_ALLOWED,
        ),
        (
            RequestView::new(Method::POST, "/upload").with_header("Content-Type", "text/plain"),
            MismatchReason::ConsumesMismatch,
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ),
        (
            RequestView::new(Method::POST, "/upload")
                .with_header("Content-Type", "application/json")
                .with_header("Accept", "text/html"),
            MismatchReason::ProducesMismatch,
            StatusCode::NOT_ACCEPTABLE,
        ),
        (
            RequestView::new(Method::POST, "/download"),
            MismatchReason::PatternMismatch,
            StatusCode::NOT_FOUND,
        ),
    ];

    for (req, reason, status) in cases {
        let miss = registry.route_request(&req).unwrap_err();
        assert_eq!(miss.last_mismatch, Some(reason));
        assert_eq!(miss.status_code(), status);
    }
}
