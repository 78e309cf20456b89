use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::gfx::{GpuError, GraphicsApi, TextureDesc, TextureId};
use crate::source::FrameSource;

use super::{AcquireError, SurfaceConfig, SurfaceRole};

/// Whether a surface has ever received a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Texture holds its initial (blank) contents.
    NotStarted,
    /// At least one frame has been uploaded.
    Streaming { frames: u64 },
}

/// Result of a successful `acquire_latest`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new frame was uploaded.
    Updated,
    /// Nothing new; the previous frame stays bound.
    Unchanged,
    /// Nothing delivered yet; the blank texture stays bound.
    NoFrameYet,
    /// Already acquired for this frame index.
    AlreadyAcquired,
}

/// A texture kept in sync with a streaming source.
pub struct ExternalSurface {
    role: SurfaceRole,
    source: Box<dyn FrameSource>,
    config: SurfaceConfig,
    texture: Option<TextureId>,
    frame_available: Arc<AtomicBool>,
    state: StreamState,
    last_acquired: Option<u64>,
}

impl ExternalSurface {
    pub fn new(role: SurfaceRole, source: Box<dyn FrameSource>, config: SurfaceConfig) -> Self {
        Self {
            role,
            source,
            config,
            texture: None,
            frame_available: Arc::new(AtomicBool::new(false)),
            state: StreamState::NotStarted,
            last_acquired: None,
        }
    }

    pub fn role(&self) -> SurfaceRole {
        self.role
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn flip_vertically(&self) -> bool {
        self.config.flip_vertically
    }

    /// Raised by the source's listener, cleared by `acquire_latest`.
    pub fn frame_available(&self) -> bool {
        self.frame_available.load(Ordering::Acquire)
    }

    /// Size the texture was first allocated with.
    pub fn default_buffer_size(&self) -> (u32, u32) {
        self.source
            .default_buffer_size()
            .unwrap_or(self.config.default_size)
    }

    pub(super) fn initialize(&mut self, api: &mut dyn GraphicsApi) -> Result<(), GpuError> {
        if self.texture.is_some() {
            return Ok(());
        }

        let (w, h) = self.default_buffer_size();
        let texture = api.create_texture(&TextureDesc::external_stream(self.role.label(), w, h))?;

        let flag = Arc::clone(&self.frame_available);
        self.source
            .set_frame_listener(Arc::new(move || flag.store(true, Ordering::Release)));

        log::debug!("{} surface: texture {} ({w}x{h})", self.role, texture.raw());
        self.texture = Some(texture);
        self.state = StreamState::NotStarted;
        self.last_acquired = None;
        Ok(())
    }

    /// Pulls the newest frame into the texture, at most once per `frame_index`.
    pub fn acquire_latest(
        &mut self,
        api: &mut dyn GraphicsApi,
        frame_index: u64,
    ) -> Result<AcquireOutcome, AcquireError> {
        let texture = self.texture.ok_or(AcquireError::NotInitialized)?;

        if self.last_acquired == Some(frame_index) {
            return Ok(AcquireOutcome::AlreadyAcquired);
        }
        self.last_acquired = Some(frame_index);
        self.frame_available.store(false, Ordering::Release);

        let Some(frame) = self.source.acquire().map_err(AcquireError::Source)? else {
            return Ok(match self.state {
                StreamState::NotStarted => AcquireOutcome::NoFrameYet,
                StreamState::Streaming { .. } => AcquireOutcome::Unchanged,
            });
        };

        frame.validate().map_err(AcquireError::Source)?;
        api.upload_frame(texture, &frame).map_err(AcquireError::Upload)?;

        self.state = match self.state {
            StreamState::NotStarted => {
                log::debug!("{} surface: first frame {:?}", self.role, frame.size());
                StreamState::Streaming { frames: 1 }
            }
            StreamState::Streaming { frames } => StreamState::Streaming { frames: frames + 1 },
        };
        Ok(AcquireOutcome::Updated)
    }

    pub(super) fn release(&mut self, api: &mut dyn GraphicsApi) {
        if let Some(texture) = self.texture.take() {
            api.delete_texture(texture);
            log::debug!("{} surface: released texture {}", self.role, texture.raw());
        }
        self.state = StreamState::NotStarted;
        self.last_acquired = None;
    }
}
