//! ProEdit - headless playback through the resource caches
//!
//! Plays a video file (or a synthetic test pattern) tick by tick, the way the
//! editor's render loop would, and prints a JSON report of what the caches
//! did.
//!
//! Usage: proedit [VIDEO] [--config cache.json] [--speed 1.0] [--loop]
//!                [--ticks N] [--start N] [--scale N] [--lut FILE]
//!                [--image FILE] [--icons DIR] [--fps N] [--fast]

mod playback;

use anyhow::{bail, Context, Result};
use playback::{PlaybackPlan, Session};
use proedit_cache::{CacheConfig, FetchMode};
use proedit_core::FrameRate;
use proedit_media::{FfmpegSource, SyntheticSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    video: Option<PathBuf>,
    config: Option<PathBuf>,
    image: Option<PathBuf>,
    icons: Option<PathBuf>,
    fps: Option<u32>,
    plan: PlaybackPlan,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .with_context(|| format!("{name} expects a value"))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(value("--config")?.into()),
                "--speed" => parsed.plan.speed = value("--speed")?.parse()?,
                "--ticks" => parsed.plan.ticks = value("--ticks")?.parse()?,
                "--start" => parsed.plan.start_frame = value("--start")?.parse()?,
                "--scale" => parsed.plan.scale = value("--scale")?.parse()?,
                "--lut" => parsed.plan.lut = Some(value("--lut")?.into()),
                "--image" => parsed.image = Some(value("--image")?.into()),
                "--icons" => parsed.icons = Some(value("--icons")?.into()),
                "--fps" => parsed.fps = Some(value("--fps")?.parse()?),
                "--loop" => parsed.plan.looping = true,
                "--fast" => parsed.plan.realtime = false,
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                path => {
                    if parsed.video.is_some() {
                        bail!("only one video may be given");
                    }
                    parsed.video = Some(path.into());
                }
            }
        }
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    info!("ProEdit playback starting...");
    proedit_media::init();

    let config = match &args.config {
        Some(path) => CacheConfig::from_path(path)
            .with_context(|| format!("failed to load cache config {}", path.display()))?,
        None => CacheConfig::default(),
    };
    let icons = args.icons.clone().unwrap_or_else(|| PathBuf::from("assets/icons"));
    let session = Session::new(config, icons);

    if let Some(path) = &args.image {
        match session.images().get_image(path, Duration::from_secs(30), FetchMode::Sync) {
            Some(image) => info!(path = %path.display(), size = ?image.dimensions(), "Poster loaded"),
            None => warn!(path = %path.display(), "Poster image unavailable"),
        }
    }

    let rate = args.fps.map_or(FrameRate::FPS_24, |fps| FrameRate::new(fps, 1));
    let report = match &args.video {
        Some(path) => {
            let source = FfmpegSource::open(path, rate)
                .with_context(|| format!("failed to open {}", path.display()))?;
            session.play(Arc::new(source), &args.plan)
        }
        None => {
            info!("No video given, playing a synthetic test pattern");
            let source = SyntheticSource::new("synthetic://bars", 1280, 720, rate, 10 * 24);
            session.play(Arc::new(source), &args.plan)
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    let cleared = session.close();
    info!(cleared, "ProEdit playback finished");
    Ok(())
}
