use crate::coords::{ColorRgba, Quad};
use crate::geometry::BufferingMode;
use crate::shader::{ShaderBindings, ShaderSources};
use crate::surface::SurfaceConfig;

/// Compositor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    pub buffering: BufferingMode,

    /// Rotation of the background pass about Z, in degrees.
    pub background_angle: f32,
    /// Rotation of the foreground pass about Z, in degrees.
    pub foreground_angle: f32,

    pub clear_color: ColorRgba,

    pub background_shader: ShaderSources,
    pub foreground_shader: ShaderSources,
    pub bindings: ShaderBindings,

    pub background_surface: SurfaceConfig,
    pub foreground_surface: SurfaceConfig,

    /// Foreground quad before the first coordinate update.
    pub initial_quad: Quad,

    /// A pass that keeps failing is logged on the first frame and then every N frames.
    pub warn_every_frames: u64,
    /// Upper bound on error codes drained per frame.
    pub max_errors_per_frame: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            buffering: BufferingMode::Double,
            background_angle: 0.0,
            foreground_angle: 0.0,
            clear_color: ColorRgba::black(),
            background_shader: ShaderSources::textured(),
            foreground_shader: ShaderSources::textured(),
            bindings: ShaderBindings::default(),
            background_surface: SurfaceConfig::new(1920, 1080),
            foreground_surface: SurfaceConfig::new(1280, 720),
            initial_quad: Quad::FULL_SCREEN,
            warn_every_frames: 120,
            max_errors_per_frame: 16,
        }
    }
}

impl CompositorConfig {
    /// Portrait device with a landscape-mounted sensor: camera rotated 270°,
    /// video 90°, camera rows stored bottom-up.
    pub fn portrait_sensor() -> Self {
        let defaults = Self::default();
        Self {
            background_angle: 270.0,
            foreground_angle: 90.0,
            background_surface: defaults.background_surface.flipped(true),
            ..defaults
        }
    }

    pub fn with_buffering(mut self, buffering: BufferingMode) -> Self {
        self.buffering = buffering;
        self
    }

    pub fn with_angles(mut self, background: f32, foreground: f32) -> Self {
        self.background_angle = background;
        self.foreground_angle = foreground;
        self
    }
}
