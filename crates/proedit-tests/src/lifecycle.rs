//! Cache sections working together: shared clock, sweeps, clears and
//! deferred destruction.

use proedit_cache::{
    CacheConfig, CacheKey, CacheSet, Deferred, DestroyFlag, DestroyQueue, EntryState, FetchMode,
    LogicalClock, Resource, ResourceCache,
};
use proedit_color::{Lut3D, LutCache};
use proedit_core::{FrameRate, LogicalTime, ProEditError};
use proedit_media::{FrameContainer, ImageCache, SyntheticSource, VideoFrameCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(mut ready: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !ready() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

struct Handle {
    freed: DestroyFlag,
    destroy_calls: Arc<AtomicUsize>,
}

impl Resource for Handle {
    fn destroy(&self) -> proedit_core::Result<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.freed.mark();
        Ok(())
    }
}

#[test]
fn cache_set_sweeps_video_and_lut_sections_on_one_clock() {
    let clock = LogicalClock::new();
    let config = CacheConfig::default()
        .with_min_timeout(Duration::ZERO)
        .with_default_timeout(Duration::from_millis(200));
    let videos = VideoFrameCache::new(config.clone(), clock.clone());
    let luts = LutCache::new(config, clock.clone());
    let set = CacheSet::new(clock.clone());
    set.register(Arc::new(videos.cache().clone()));
    set.register(Arc::new(luts.cache().clone()));

    let source = Arc::new(SyntheticSource::new("clip", 16, 16, FrameRate::FPS_24, 64));
    let stream = videos.stream(source, 1);
    assert!(videos.get_frame_sync(&stream, 0).is_some());
    luts.cache().insert(
        CacheKey::lut("/grades/identity.cube"),
        Some(proedit_color::LutResource::new(Lut3D::identity(2).unwrap())),
        Duration::from_millis(1_000),
    );
    assert_eq!(set.total_entries(), 2);

    assert_eq!(set.tick(LogicalTime::from_millis(100)), 0);
    assert_eq!(set.tick(LogicalTime::from_millis(300)), 1);
    assert_eq!(videos.cache().len(), 0);
    assert_eq!(set.tick(LogicalTime::from_millis(1_200)), 1);
    assert_eq!(set.total_entries(), 0);
    assert_eq!(clock.now(), LogicalTime::from_millis(1_200));
}

#[test]
fn evicted_container_stops_serving_frames() {
    let clock = LogicalClock::new();
    let videos = VideoFrameCache::new(
        CacheConfig::default().with_min_timeout(Duration::ZERO),
        clock.clone(),
    );
    let source = Arc::new(SyntheticSource::new("clip", 16, 16, FrameRate::FPS_24, 32));
    let stream = videos.stream(source, 1).with_timeout(Duration::from_millis(50));

    let key = proedit_cache::ContainerSource::container_key(&stream, 0);
    videos.get_frame_sync(&stream, 3);
    let held: Arc<FrameContainer> = videos.cache().lookup(&key).and_then(|e| e.into_resource()).unwrap();

    assert_eq!(videos.cache().sweep(LogicalTime::from_millis(100)), 1);
    assert!(held.is_destroyed());
    assert!(proedit_cache::FrameSequence::frame(&*held, 3).is_none());
}

#[test]
fn clear_is_idempotent_and_destroys_once() {
    let cache: ResourceCache<Handle> =
        ResourceCache::new("Handles", CacheConfig::default(), LogicalClock::new());
    let calls = Arc::new(AtomicUsize::new(0));
    for i in 0..3 {
        cache.insert(
            CacheKey::custom("handle", "h").with_param(i as i64),
            Some(Handle {
                freed: DestroyFlag::new(),
                destroy_calls: Arc::clone(&calls),
            }),
            Duration::from_secs(1),
        );
    }

    assert_eq!(cache.clear(), 3);
    assert_eq!(cache.clear(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn clear_during_build_keeps_the_claim_and_stores_result() {
    let cache: ResourceCache<Handle> = ResourceCache::new(
        "Handles",
        CacheConfig::default().with_min_timeout(Duration::ZERO),
        LogicalClock::new(),
    );
    let key = CacheKey::custom("handle", "in-flight");
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Barrier::new(2));

    let (worker_gate, worker_calls) = (Arc::clone(&gate), Arc::clone(&calls));
    assert!(cache
        .get(key.clone(), Duration::from_millis(10), FetchMode::Async, move || {
            worker_gate.wait();
            Ok::<_, ProEditError>(Handle {
                freed: DestroyFlag::new(),
                destroy_calls: worker_calls,
            })
        })
        .is_none());

    assert_eq!(cache.clear(), 0);
    assert_eq!(cache.state(&key), EntryState::Building);
    gate.wait();

    wait_until(|| cache.state(&key) == EntryState::Ready);
    assert_eq!(cache.sweep(LogicalTime::from_millis(50)), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn thread_affine_resources_are_destroyed_on_drain() {
    let queue = DestroyQueue::new();
    let clock = LogicalClock::new();
    let cache: ResourceCache<Deferred<Handle>> = ResourceCache::new(
        "Textures",
        CacheConfig::default().with_min_timeout(Duration::ZERO),
        clock.clone(),
    );
    let set = CacheSet::new(clock);
    set.register(Arc::new(cache.clone()));

    let calls = Arc::new(AtomicUsize::new(0));
    let handle = queue.handle();
    let worker_calls = Arc::clone(&calls);
    let texture = cache
        .get(
            CacheKey::custom("texture", "thumb"),
            Duration::from_millis(10),
            FetchMode::Sync,
            move || {
                Ok::<_, ProEditError>(Deferred::new(
                    Handle {
                        freed: DestroyFlag::new(),
                        destroy_calls: worker_calls,
                    },
                    "thumb",
                    handle,
                ))
            },
        )
        .unwrap();

    let sweeper = thread::spawn({
        let set = Arc::new(set);
        move || set.tick(LogicalTime::from_millis(100))
    });
    assert_eq!(sweeper.join().unwrap(), 1);

    assert!(!texture.freed.is_destroyed());
    assert_eq!(queue.drain(), 1);
    assert!(texture.freed.is_destroyed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_still_image_is_never_cached() {
    let images = ImageCache::new(CacheConfig::default(), LogicalClock::new());
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let path = dir.path().join("later.png");

    assert!(images.get_image(&path, Duration::from_secs(1), FetchMode::Sync).is_none());
    assert!(images.cache().is_empty());

    image::RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 255]))
        .save(&path)
        .expect("failed to write png");
    let loaded = images.get_image(&path, Duration::from_secs(1), FetchMode::Sync).unwrap();
    assert_eq!(loaded.dimensions(), (3, 3));
}
