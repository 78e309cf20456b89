use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::coords::{GeometryError, Quad};
use crate::geometry::{BufferingMode, GeometryStore};

use super::CompositorConfig;

#[derive(Debug)]
struct Angles {
    background: AtomicU32,
    foreground: AtomicU32,
}

/// Thread-safe control surface of a compositor.
///
/// Clones share state. Setters never touch the GPU and block only for the
/// short geometry copy, so they are safe to call from tracker or UI threads.
#[derive(Debug, Clone)]
pub struct CompositorHandle {
    geometry: Arc<GeometryStore>,
    angles: Arc<Angles>,
}

impl CompositorHandle {
    pub fn new(mode: BufferingMode, initial: Quad, background_angle: f32, foreground_angle: f32) -> Self {
        Self {
            geometry: Arc::new(GeometryStore::new(mode, initial)),
            angles: Arc::new(Angles {
                background: AtomicU32::new(background_angle.to_bits()),
                foreground: AtomicU32::new(foreground_angle.to_bits()),
            }),
        }
    }

    pub fn from_config(config: &CompositorConfig) -> Self {
        Self::new(
            config.buffering,
            config.initial_quad,
            config.background_angle,
            config.foreground_angle,
        )
    }

    /// Replaces the foreground quad with 12 NDC floats (strip order TL, TR, BL, BR).
    pub fn set_coordinates(&self, coords: &[f32]) -> Result<(), GeometryError> {
        self.geometry.set_coordinates(coords).map(|_| ())
    }

    /// Replaces the foreground quad from normalized image-space corners
    /// (TL, TR, BR, BL; origin top-left, y down).
    pub fn set_image_corners(&self, corners: &[f32; 8]) {
        self.geometry.set_quad(Quad::from_image_corners(corners));
    }

    pub fn current_coordinates(&self) -> Quad {
        self.geometry.current_buffer()
    }

    pub fn set_background_rotation(&self, degrees: f32) {
        self.angles.background.store(degrees.to_bits(), Ordering::Relaxed);
    }

    pub fn set_foreground_rotation(&self, degrees: f32) {
        self.angles.foreground.store(degrees.to_bits(), Ordering::Relaxed);
    }

    /// (background, foreground) angles in degrees.
    pub fn rotations(&self) -> (f32, f32) {
        (
            f32::from_bits(self.angles.background.load(Ordering::Relaxed)),
            f32::from_bits(self.angles.foreground.load(Ordering::Relaxed)),
        )
    }

    pub(crate) fn geometry(&self) -> &Arc<GeometryStore> {
        &self.geometry
    }
}
