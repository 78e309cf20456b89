//! External streaming surfaces: a texture fed by a [`FrameSource`].
//!
//! The compositor owns two of them (camera background, video foreground) through
//! a [`SurfaceManager`]. Each surface pulls at most one frame per draw pass.

mod external;

use std::fmt;

use crate::gfx::{GpuError, GraphicsApi};
use crate::source::{FrameSource, SourceError};

pub use external::{AcquireOutcome, ExternalSurface, StreamState};

/// Which pass a surface feeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Background,
    Foreground,
}

impl SurfaceRole {
    pub fn label(self) -> &'static str {
        match self {
            SurfaceRole::Background => "background",
            SurfaceRole::Foreground => "foreground",
        }
    }
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-surface settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Allocation size used when the source does not report one.
    pub default_size: (u32, u32),
    /// Sample the texture upside down (image rows stored bottom-up).
    pub flip_vertically: bool,
}

impl SurfaceConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            default_size: (width, height),
            flip_vertically: false,
        }
    }

    pub fn flipped(mut self, flip: bool) -> Self {
        self.flip_vertically = flip;
        self
    }
}

/// Failure to bring a surface's texture up to date.
///
/// Recoverable: the pass for that surface is skipped this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireError {
    NotInitialized,
    Source(SourceError),
    Upload(GpuError),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::NotInitialized => f.write_str("surface has no texture"),
            AcquireError::Source(e) => write!(f, "stream unusable: {e}"),
            AcquireError::Upload(e) => write!(f, "texture update rejected: {e}"),
        }
    }
}

impl std::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcquireError::NotInitialized => None,
            AcquireError::Source(e) => Some(e),
            AcquireError::Upload(e) => Some(e),
        }
    }
}

/// The background and foreground surfaces.
pub struct SurfaceManager {
    background: ExternalSurface,
    foreground: ExternalSurface,
}

impl SurfaceManager {
    pub fn new(
        background: Box<dyn FrameSource>,
        background_config: SurfaceConfig,
        foreground: Box<dyn FrameSource>,
        foreground_config: SurfaceConfig,
    ) -> Self {
        Self {
            background: ExternalSurface::new(SurfaceRole::Background, background, background_config),
            foreground: ExternalSurface::new(SurfaceRole::Foreground, foreground, foreground_config),
        }
    }

    /// Allocates both textures and hooks up frame listeners.
    ///
    /// On failure nothing stays allocated.
    pub fn initialize(&mut self, api: &mut dyn GraphicsApi) -> Result<(), GpuError> {
        self.background.initialize(api)?;
        if let Err(e) = self.foreground.initialize(api) {
            self.background.release(api);
            return Err(e);
        }
        Ok(())
    }

    pub fn surface(&self, role: SurfaceRole) -> &ExternalSurface {
        match role {
            SurfaceRole::Background => &self.background,
            SurfaceRole::Foreground => &self.foreground,
        }
    }

    pub fn surface_mut(&mut self, role: SurfaceRole) -> &mut ExternalSurface {
        match role {
            SurfaceRole::Background => &mut self.background,
            SurfaceRole::Foreground => &mut self.foreground,
        }
    }

    pub fn acquire_latest(
        &mut self,
        role: SurfaceRole,
        api: &mut dyn GraphicsApi,
        frame_index: u64,
    ) -> Result<AcquireOutcome, AcquireError> {
        self.surface_mut(role).acquire_latest(api, frame_index)
    }

    /// Deletes both textures.
    pub fn release(&mut self, api: &mut dyn GraphicsApi) {
        self.background.release(api);
        self.foreground.release(api);
    }
}
