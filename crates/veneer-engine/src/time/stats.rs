use std::time::{Duration, Instant};

use super::FrameTime;

/// Rolling frame-rate counter that logs once per reporting window.
#[derive(Debug, Clone)]
pub struct FrameStats {
    label: &'static str,
    every: Duration,
    window_start: Option<Instant>,
    frames_in_window: u32,
    total_frames: u64,
    last_fps: Option<f32>,
}

impl FrameStats {
    pub fn new(label: &'static str, every: Duration) -> Self {
        Self {
            label,
            every,
            window_start: None,
            frames_in_window: 0,
            total_frames: 0,
            last_fps: None,
        }
    }

    /// Counts one frame; returns the frame rate when a window closes.
    pub fn record(&mut self, time: &FrameTime) -> Option<f32> {
        self.total_frames += 1;

        let Some(start) = self.window_start else {
            self.window_start = Some(time.now);
            return None;
        };
        self.frames_in_window += 1;

        let elapsed = time.now.saturating_duration_since(start);
        if elapsed < self.every {
            return None;
        }

        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        log::info!("{}: {fps:.1} fps ({} frames total)", self.label, self.total_frames);

        self.window_start = Some(time.now);
        self.frames_in_window = 0;
        self.last_fps = Some(fps);
        Some(fps)
    }

    pub fn last_fps(&self) -> Option<f32> {
        self.last_fps
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new("render", Duration::from_secs(5))
    }
}
