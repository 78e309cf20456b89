mod sources;
mod tracker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use veneer_engine::compositor::{CompositorConfig, CompositorSources};
use veneer_engine::core::CompositorLoop;
use veneer_engine::device::GpuInit;
use veneer_engine::logging::{init_logging, LoggingConfig};
use veneer_engine::source::frame_slot;
use veneer_engine::window::{Runtime, RuntimeConfig};

const CAMERA_SIZE: (u32, u32) = (640, 480);
const VIDEO_SIZE: (u32, u32) = (320, 180);

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    // `--portrait` mimics a sensor mounted at 270 degrees.
    let config = if std::env::args().any(|a| a == "--portrait") {
        CompositorConfig::portrait_sensor()
    } else {
        CompositorConfig::default()
    };

    let (camera_tx, camera_rx) = frame_slot(Some(CAMERA_SIZE));
    let (video_tx, video_rx) = frame_slot(Some(VIDEO_SIZE));

    let render_loop = CompositorLoop::new(config, CompositorSources::new(camera_rx, video_rx));
    let handle = render_loop.handle();

    let camera = sources::spawn_producer("camera", camera_tx, |t| {
        sources::camera_frame(CAMERA_SIZE.0, CAMERA_SIZE.1, t)
    })
    .context("failed to spawn camera producer")?;
    let video = sources::spawn_producer("video", video_tx, |t| {
        sources::video_frame(VIDEO_SIZE.0, VIDEO_SIZE.1, t)
    })
    .context("failed to spawn video producer")?;

    let stop = Arc::new(AtomicBool::new(false));
    let tracker = tracker::spawn_tracker(handle, Arc::clone(&stop)).context("failed to spawn tracker")?;

    let result = Runtime::run(
        RuntimeConfig {
            title: "veneer demo".to_string(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        render_loop,
    );

    // The render loop, and with it both slot consumers, is gone by now;
    // producers observe `Closed` on their next submit.
    stop.store(true, Ordering::Relaxed);
    for (name, worker) in [("camera", camera), ("video", video), ("tracker", tracker)] {
        if worker.join().is_err() {
            log::warn!("{name} thread panicked");
        }
    }

    result
}
