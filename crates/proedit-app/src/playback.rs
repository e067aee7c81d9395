//! Headless playback: drives the caches the way the editor's render loop
//! does, one tick per frame.

use proedit_cache::{CacheConfig, CacheSet, CacheStatsSnapshot, DestroyQueue, FetchMode, LogicalClock};
use proedit_color::LutCache;
use proedit_core::LogicalTime;
use proedit_media::{FrameSource, IconCache, ImageCache, VideoFrameCache, VideoStream};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What to play.
#[derive(Debug, Clone)]
pub struct PlaybackPlan {
    pub start_frame: i64,
    pub ticks: usize,
    /// Frames advanced per tick; negative plays backwards.
    pub speed: f64,
    pub looping: bool,
    /// Resolution divisor for decoding.
    pub scale: u32,
    pub lut: Option<PathBuf>,
    /// Sleep one frame duration per tick, giving background builds time
    /// to finish as they would during real playback.
    pub realtime: bool,
}

impl Default for PlaybackPlan {
    fn default() -> Self {
        Self {
            start_frame: 0,
            ticks: 240,
            speed: 1.0,
            looping: false,
            scale: 1,
            lut: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaybackReport {
    pub ticks: usize,
    pub shown: usize,
    /// Ticks whose frame was not decoded in time.
    pub missing: usize,
    pub graded: usize,
    pub evicted: usize,
    pub videos: CacheStatsSnapshot,
}

/// Every cache section of one editor session, sharing a clock.
pub struct Session {
    clock: LogicalClock,
    caches: CacheSet,
    videos: VideoFrameCache,
    images: ImageCache,
    icons: IconCache,
    luts: LutCache,
    destroy_queue: DestroyQueue,
}

impl Session {
    pub fn new(config: CacheConfig, icon_root: impl Into<PathBuf>) -> Self {
        let clock = LogicalClock::new();
        let destroy_queue = DestroyQueue::new();
        let videos = VideoFrameCache::new(config.clone(), clock.clone());
        let images = ImageCache::new(config.clone(), clock.clone());
        let icons = IconCache::new(icon_root, config.clone(), clock.clone(), destroy_queue.handle());
        let luts = LutCache::new(config, clock.clone());

        let caches = CacheSet::new(clock.clone());
        caches.register(Arc::new(videos.cache().clone()));
        caches.register(Arc::new(images.cache().clone()));
        caches.register(Arc::new(icons.cache().clone()));
        caches.register(Arc::new(luts.cache().clone()));
        info!(sections = ?caches.section_names(), "Cache sections ready");

        Self {
            clock,
            caches,
            videos,
            images,
            icons,
            luts,
            destroy_queue,
        }
    }

    pub fn videos(&self) -> &VideoFrameCache {
        &self.videos
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn caches(&self) -> &CacheSet {
        &self.caches
    }

    /// Play `source` according to `plan`.
    pub fn play<S: FrameSource>(&self, source: Arc<S>, plan: &PlaybackPlan) -> PlaybackReport {
        let rate = source.frame_rate();
        let tick = Duration::from_secs_f64(rate.frame_duration().to_seconds_f64());
        let stream: VideoStream<S> = self.videos.stream(source, plan.scale);

        let mut report = PlaybackReport {
            ticks: plan.ticks,
            ..Default::default()
        };
        let mut playhead = plan.start_frame as f64;
        let mut now = self.clock.now();

        for _ in 0..plan.ticks {
            report.evicted += self.caches.tick(now);
            self.destroy_queue.drain();

            // The transport bar needs its icon every frame.
            let _play_icon = self.icons.get_icon("play.png", FetchMode::Async);

            let frame_index = self.wrap(&stream, playhead, plan.looping);
            match self
                .videos
                .get_frame(&stream, frame_index, plan.speed, plan.looping)
            {
                Some(frame) => {
                    report.shown += 1;
                    if self.grade(&frame, plan) {
                        report.graded += 1;
                    }
                }
                None => {
                    debug!(frame = frame_index, "Frame not ready");
                    report.missing += 1;
                }
            }

            playhead += plan.speed;
            now = now.saturating_add(tick);
            if plan.realtime {
                std::thread::sleep(tick);
            }
        }

        report.videos = self.videos.cache().stats();
        report
    }

    fn wrap<S: FrameSource>(&self, stream: &VideoStream<S>, playhead: f64, looping: bool) -> i64 {
        use proedit_cache::ContainerSource;

        let index = playhead.floor() as i64;
        match stream.frame_count() {
            Some(count) if looping && count > 0 => index.rem_euclid(count as i64),
            _ => index,
        }
    }

    fn grade(&self, frame: &proedit_core::SharedFrameBuffer, plan: &PlaybackPlan) -> bool {
        let Some(path) = &plan.lut else {
            return false;
        };
        let Some(lut) = self.luts.get_lut(path, Duration::from_secs(10), FetchMode::Async) else {
            return false;
        };
        let mut graded = (**frame).clone();
        lut.lut().apply_to_frame(&mut graded).is_ok()
    }

    /// Release everything, e.g. when the project closes.
    pub fn close(&self) -> usize {
        let cleared = self.caches.clear_all();
        let released = self.destroy_queue.drain();
        debug!(cleared, released, "Session closed");
        cleared
    }

    /// Releases queued by sweeps and waiting for the render thread.
    pub fn pending_releases(&self) -> usize {
        self.destroy_queue.pending()
    }

    pub fn now(&self) -> LogicalTime {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proedit_core::FrameRate;
    use proedit_media::SyntheticSource;

    fn session() -> Session {
        Session::new(CacheConfig::default(), "/nonexistent/icons")
    }

    #[test]
    fn test_realtime_playback_shows_most_frames() {
        let session = session();
        let source = Arc::new(SyntheticSource::new("bars", 32, 32, FrameRate::FPS_60, 120));
        let plan = PlaybackPlan {
            ticks: 60,
            ..Default::default()
        };

        let report = session.play(source, &plan);
        assert_eq!(report.shown + report.missing, 60);
        assert!(report.shown > 0);
        // Containers are built once each: frames 0..60 span four of them.
        assert!(report.videos.builds <= 5);
    }

    #[test]
    fn test_idle_containers_are_evicted() {
        let session = Session::new(
            CacheConfig::default()
                .with_min_timeout(Duration::ZERO)
                .with_default_timeout(Duration::from_millis(100)),
            "/nonexistent/icons",
        );
        let source = Arc::new(SyntheticSource::new("bars", 16, 16, FrameRate::FPS_60, 600));
        let plan = PlaybackPlan {
            ticks: 120,
            ..Default::default()
        };

        let report = session.play(source, &plan);
        assert!(report.evicted > 0);
        assert!(session.now() >= LogicalTime::from_millis(1_800));
    }

    #[test]
    fn test_close_clears_every_section() {
        let session = session();
        let source = Arc::new(SyntheticSource::new("bars", 16, 16, FrameRate::FPS_24, 48));
        let stream = session.videos().stream(source, 1);
        session.videos().get_frame_sync(&stream, 0);
        session.icons.get_icon("play.png", FetchMode::Sync);
        assert_eq!(session.caches().total_entries(), 2);

        assert_eq!(session.close(), 2);
        assert_eq!(session.caches().total_entries(), 0);
        assert_eq!(session.pending_releases(), 0);
    }

    #[test]
    fn test_icon_release_waits_for_next_tick() {
        let session = session();
        session.icons.get_icon("play.png", FetchMode::Sync);

        assert_eq!(session.caches().clear_all(), 1);
        assert_eq!(session.pending_releases(), 1);

        let source = Arc::new(SyntheticSource::new("bars", 16, 16, FrameRate::FPS_24, 48));
        let plan = PlaybackPlan {
            ticks: 1,
            realtime: false,
            ..Default::default()
        };
        session.play(source, &plan);
        assert_eq!(session.pending_releases(), 0);
    }
}
