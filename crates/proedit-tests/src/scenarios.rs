//! End-to-end cache scenarios: concurrency guarantees and eviction timing.

use proedit_cache::{
    CacheConfig, CacheKey, EntryState, FetchMode, LogicalClock, Resource, ResourceCache,
};
use proedit_core::{LogicalTime, ProEditError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

struct Built {
    id: usize,
    destroyed: Arc<AtomicUsize>,
}

impl Resource for Built {
    fn destroy(&self) -> proedit_core::Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn new_cache(config: CacheConfig) -> (ResourceCache<Built>, LogicalClock) {
    let clock = LogicalClock::new();
    (ResourceCache::new("Scenario", config, clock.clone()), clock)
}

fn wait_until(mut ready: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !ready() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Generator that sleeps, then hands out the next id from `counter`.
fn slow_generator(
    counter: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
    delay: Duration,
) -> impl FnOnce() -> Result<Built, ProEditError> + Send + 'static {
    move || {
        thread::sleep(delay);
        let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Built { id, destroyed })
    }
}

#[test]
fn two_sync_callers_share_one_build() {
    let (cache, _) = new_cache(CacheConfig::default());
    let key = CacheKey::custom("scenario", "A");
    let counter = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let (cache, key) = (cache.clone(), key.clone());
            let (counter, destroyed, start) =
                (Arc::clone(&counter), Arc::clone(&destroyed), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                cache
                    .get(
                        key,
                        Duration::from_millis(5000),
                        FetchMode::Sync,
                        slow_generator(counter, destroyed, Duration::from_millis(50)),
                    )
                    .map(|r| r.id)
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids, vec![Some(1), Some(1)]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn many_mixed_callers_build_exactly_once() {
    let (cache, _) = new_cache(CacheConfig::default());
    let key = CacheKey::custom("scenario", "stampede");
    let counter = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let threads = 16;
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let (cache, key) = (cache.clone(), key.clone());
            let (counter, destroyed, start) =
                (Arc::clone(&counter), Arc::clone(&destroyed), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                let mode = if i % 2 == 0 { FetchMode::Sync } else { FetchMode::Async };
                cache.get(
                    key,
                    Duration::from_secs(5),
                    mode,
                    slow_generator(counter, destroyed, Duration::from_millis(20)),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    wait_until(|| !cache.is_building(&key));

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let stored = cache.lookup(&key).and_then(|e| e.into_resource()).unwrap();
    for resource in results.into_iter().flatten() {
        assert!(Arc::ptr_eq(&resource, &stored));
    }
}

#[test]
fn async_get_returns_immediately_and_builds_in_background() {
    let (cache, _) = new_cache(CacheConfig::default());
    let key = CacheKey::custom("scenario", "B");
    let counter = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));

    let started = Instant::now();
    let first = cache.get(
        key.clone(),
        Duration::from_millis(5000),
        FetchMode::Async,
        slow_generator(Arc::clone(&counter), Arc::clone(&destroyed), Duration::from_millis(200)),
    );
    assert!(first.is_none());
    assert!(started.elapsed() < Duration::from_millis(150));

    wait_until(|| cache.state(&key) == EntryState::Ready);

    let second = cache.get(
        key,
        Duration::from_millis(5000),
        FetchMode::Async,
        slow_generator(Arc::clone(&counter), destroyed, Duration::ZERO),
    );
    assert_eq!(second.map(|r| r.id), Some(1));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn sync_get_never_returns_before_entry_is_stored() {
    let (cache, _) = new_cache(CacheConfig::default());
    let key = CacheKey::custom("scenario", "sync");
    let counter = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));

    cache.get(
        key.clone(),
        Duration::from_secs(5),
        FetchMode::Async,
        slow_generator(Arc::clone(&counter), Arc::clone(&destroyed), Duration::from_millis(60)),
    );
    let resource = cache.get(
        key.clone(),
        Duration::from_secs(5),
        FetchMode::Sync,
        slow_generator(Arc::clone(&counter), destroyed, Duration::ZERO),
    );

    assert!(resource.is_some());
    assert!(cache.contains(&key));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn sweep_respects_timeout() {
    // A 100 ms timeout only takes effect with the floor at or below it.
    let config = CacheConfig::default().with_min_timeout(Duration::from_millis(100));
    let (cache, _) = new_cache(config);
    let key = CacheKey::custom("scenario", "C");
    let destroyed = Arc::new(AtomicUsize::new(0));

    cache.insert(
        key.clone(),
        Some(Built {
            id: 1,
            destroyed: Arc::clone(&destroyed),
        }),
        Duration::from_millis(100),
    );
    assert_eq!(cache.lookup(&key).unwrap().last_used(), LogicalTime::ZERO);

    assert_eq!(cache.sweep(LogicalTime::from_millis(50)), 0);
    assert!(cache.contains(&key));

    assert_eq!(cache.sweep(LogicalTime::from_millis(250)), 1);
    assert!(!cache.contains(&key));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    assert_eq!(cache.sweep(LogicalTime::from_millis(500)), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn default_floor_keeps_short_timeouts_alive() {
    let (cache, _) = new_cache(CacheConfig::default());
    let key = CacheKey::custom("scenario", "floor");
    cache.insert(
        key.clone(),
        Some(Built {
            id: 1,
            destroyed: Arc::new(AtomicUsize::new(0)),
        }),
        Duration::from_millis(100),
    );

    assert_eq!(cache.sweep(LogicalTime::from_millis(250)), 0);
    assert_eq!(cache.sweep(LogicalTime::from_millis(301)), 1);
}

#[test]
fn lookup_hit_postpones_eviction() {
    let config = CacheConfig::default().with_min_timeout(Duration::ZERO);
    let (cache, clock) = new_cache(config);
    let key = CacheKey::custom("scenario", "touch");
    cache.insert(
        key.clone(),
        Some(Built {
            id: 1,
            destroyed: Arc::new(AtomicUsize::new(0)),
        }),
        Duration::from_millis(100),
    );

    clock.advance_to(LogicalTime::from_millis(90));
    assert!(cache.lookup(&key).is_some());

    assert_eq!(cache.sweep(LogicalTime::from_millis(180)), 0);
    assert_eq!(cache.sweep(LogicalTime::from_millis(191)), 1);
}

#[test]
fn failed_build_is_retried_only_after_eviction() {
    let config = CacheConfig::default().with_min_timeout(Duration::ZERO);
    let (cache, clock) = new_cache(config);
    let key = CacheKey::custom("scenario", "flaky");
    let attempts = Arc::new(AtomicUsize::new(0));

    let attempt = |attempts: &Arc<AtomicUsize>| {
        let attempts = Arc::clone(attempts);
        move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<Built, _>(ProEditError::Decoder("truncated stream".into()))
        }
    };

    for tick in 0..10u64 {
        clock.advance_to(LogicalTime::from_millis(tick * 5));
        assert!(cache
            .get(key.clone(), Duration::from_millis(20), FetchMode::Sync, attempt(&attempts))
            .is_none());
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // The failure is refreshed by every request, so it ages out only once
    // requests stop.
    assert_eq!(cache.sweep(LogicalTime::from_millis(100)), 1);
    cache.get(key, Duration::from_millis(20), FetchMode::Sync, attempt(&attempts));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn sweep_evicts_exactly_when_idle_exceeds_effective_timeout(
            timeout in 0u64..1_000,
            floor in 0u64..600,
            touched in 0u64..1_000,
            idle in 0u64..2_000,
        ) {
            let config = CacheConfig::default().with_min_timeout(Duration::from_millis(floor));
            let (cache, clock) = new_cache(config);
            let key = CacheKey::custom("property", "idle");
            let destroyed = Arc::new(AtomicUsize::new(0));
            cache.insert(
                key.clone(),
                Some(Built { id: 0, destroyed: Arc::clone(&destroyed) }),
                Duration::from_millis(timeout),
            );

            clock.advance_to(LogicalTime::from_millis(touched));
            prop_assert!(cache.lookup(&key).is_some());

            let evicted = cache.sweep(LogicalTime::from_millis(touched + idle));
            let expected = idle > timeout.max(floor);
            prop_assert_eq!(evicted == 1, expected);
            prop_assert_eq!(destroyed.load(Ordering::SeqCst), usize::from(expected));
        }
    }
}
