use crate::coords::{ColorRgba, Mat4, Viewport};
use crate::shader::LinkedProgram;
use crate::source::Frame;

use super::{GpuError, GpuErrorCode};

/// Texture name issued by a [`GraphicsApi`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureId(u32);

impl TextureId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Program name issued by a [`GraphicsApi`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId(u32);

impl ProgramId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Vertex attribute slot of a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

/// Uniform (resource binding) slot of a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    TriangleStrip,
    TriangleList,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Texture allocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl TextureDesc {
    /// Streaming target: linear filtering, clamped at the edges.
    pub fn external_stream(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
        }
    }
}

/// Immediate-mode GPU context handed to the compositor.
///
/// Semantics follow the classic GL state machine:
/// - `use_program`, `bind_texture`, attribute arrays and uniforms are sticky
///   state consulted by `draw_arrays`
/// - misuse (drawing without a program, an enabled attribute without data,
///   unknown handles) does not fail the call; it queues an error code that
///   `get_error` later reports, oldest first
///
/// All calls are made from the render thread that owns the context.
pub trait GraphicsApi {
    /// Allocates a texture and applies its sampling parameters.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError>;

    /// Replaces the contents of `texture` with `frame`, reallocating on size/format change.
    fn upload_frame(&mut self, texture: TextureId, frame: &Frame) -> Result<(), GpuError>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Creates a program from an already compiled and linked description.
    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId, GpuError>;

    fn delete_program(&mut self, program: ProgramId);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears the color target at the start of the frame.
    ///
    /// Color only: the compositing passes are flat quads drawn in order, so
    /// targets carry no depth buffer to clear.
    fn clear(&mut self, color: ColorRgba);

    fn use_program(&mut self, program: Option<ProgramId>);

    /// Binds `texture` to texture `unit`.
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Points a sampler uniform at a texture unit.
    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32);

    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4);

    fn enable_attrib_array(&mut self, location: AttribLocation);

    fn disable_attrib_array(&mut self, location: AttribLocation);

    /// Supplies tightly packed client-side data for an attribute.
    fn attrib_pointer(&mut self, location: AttribLocation, components: u8, data: &[f32]);

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Pops the oldest queued error code, or `None` when the queue is empty.
    fn get_error(&mut self) -> Option<GpuErrorCode>;
}
