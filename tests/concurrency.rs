//! Register/deregister racing against many lookup threads.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use route_matcher::config::CacheConfig;
use route_matcher::routing::{Mapping, Registry};

mod common;

const READERS: usize = 8;
const STABLE: usize = 5;
const CHURN_ROUNDS: usize = 300;

fn churn_against_readers(config: CacheConfig) {
    let registry = Arc::new(Registry::new(&config));
    for i in 0..STABLE {
        registry
            .register(common::route(
                &format!("stable-{}", i),
                Mapping::new().path(format!("/stable/{}/**", i)),
            ))
            .unwrap();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let lookups = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..READERS)
        .map(|reader| {
            let registry = registry.clone();
            let stop = stop.clone();
            let lookups = lookups.clone();
            thread::spawn(move || {
                let mut n = reader;
                while !stop.load(Ordering::Relaxed) {
                    // skew traffic toward the last stable route
                    let i = if n % 4 == 0 { n % STABLE } else { STABLE - 1 };
                    let req = common::get(&format!("/stable/{}/item", i));
                    assert_eq!(
                        common::resolve(&registry, &req).as_deref(),
                        Some(format!("stable-{}", i).as_str())
                    );
                    // churn routes may or may not be visible, but never wrong
                    if let Some(name) = common::resolve(&registry, &common::get("/churn")) {
                        assert!(name.starts_with("churn-"));
                    }
                    lookups.fetch_add(2, Ordering::Relaxed);
                    n += 1;
                }
            })
        })
        .collect();

    let writer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for round in 0..CHURN_ROUNDS {
                let churn =
                    common::route(&format!("churn-{}", round), Mapping::new().path("/churn"));
                registry.register(churn.clone()).unwrap();
                assert!(common::resolve(&registry, &common::get("/churn")).is_some());
                assert!(registry.deregister(&churn));
                assert!(common::resolve(&registry, &common::get("/churn")).is_none());
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(lookups.load(Ordering::Relaxed) > 0);
    assert_eq!(registry.len(), STABLE);

    let registered: HashSet<String> = registry
        .routes()
        .iter()
        .map(|r| r.name().to_string())
        .collect();
    let cached: Vec<String> = registry
        .cache_order()
        .into_iter()
        .map(|(r, _)| r.name().to_string())
        .collect();
    assert_eq!(cached.len(), STABLE);
    assert_eq!(cached.into_iter().collect::<HashSet<_>>(), registered);
}

#[test]
fn test_compact_cache_survives_churn() {
    churn_against_readers(common::cache(true, 1000, false));
}

#[test]
fn test_padded_cache_survives_churn() {
    churn_against_readers(common::cache(true, 1000, true));
}

#[test]
fn test_default_sampling_survives_churn() {
    churn_against_readers(CacheConfig::default());
}

#[test]
fn test_simple_router_survives_churn() {
    churn_against_readers(common::cache(false, 0, false));
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let registry = Arc::new(Registry::new(&common::cache(true, 1000, false)));
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let name = format!("w{}-{}", w, i);
                    let path = format!("/w{}/{}", w, i);
                    registry
                        .register(common::route(&name, Mapping::new().path(path.as_str())))
                        .unwrap();
                    assert_eq!(
                        common::resolve(&registry, &common::get(&path)).as_deref(),
                        Some(name.as_str())
                    );
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(registry.len(), 200);
    assert_eq!(registry.cache_order().len(), 200);
}
