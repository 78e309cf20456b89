use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use veneer_engine::compositor::CompositorHandle;

/// Image-space corners (TL, TR, BR, BL) of a quad orbiting the image center.
pub fn orbit_corners(step: u32) -> [f32; 8] {
    let phase = step as f32 * 0.02;
    let (cx, cy) = (0.5 + 0.2 * phase.cos(), 0.5 + 0.2 * phase.sin());
    let half = 0.15;
    #[rustfmt::skip]
    let corners = [
        cx - half, cy - half,
        cx + half, cy - half,
        cx + half, cy + half,
        cx - half, cy + half,
    ];
    corners
}

/// Stand-in for a marker tracker: moves the foreground quad and slowly spins
/// the foreground texture.
pub fn spawn_tracker(handle: CompositorHandle, stop: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("tracker".into()).spawn(move || {
        let mut step = 0u32;
        while !stop.load(Ordering::Relaxed) {
            handle.set_image_corners(&orbit_corners(step));
            handle.set_foreground_rotation((step % 360) as f32);
            step = step.wrapping_add(1);
            thread::sleep(Duration::from_millis(16));
        }
        log::debug!("tracker stopped after {step} updates");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_stays_inside_the_image() {
        for step in (0..400).step_by(7) {
            for v in orbit_corners(step) {
                assert!((0.0..=1.0).contains(&v), "corner {v} at step {step}");
            }
        }
    }
}
