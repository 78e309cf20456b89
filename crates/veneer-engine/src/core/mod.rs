//! Render-loop contract between the window runtime and what it drives.
//!
//! The runtime calls [`RenderLoop::on_surface_created`] once a GPU surface
//! exists, [`RenderLoop::on_surface_changed`] on every size change, and
//! [`RenderLoop::on_draw_frame`] once per display refresh.

mod compositor_loop;
mod ctx;

pub use compositor_loop::CompositorLoop;
pub use ctx::FrameCtx;

use crate::device::Gpu;

/// Directive returned from per-frame callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Callbacks driven by [`crate::window::Runtime`].
pub trait RenderLoop {
    /// A surface (and its device) now exists. May be called again after the
    /// surface is recreated; previous GPU objects are gone by then.
    fn on_surface_created(&mut self, gpu: &Gpu<'_>) -> anyhow::Result<()>;

    /// Drawable size changed (physical pixels).
    fn on_surface_changed(&mut self, width: u32, height: u32);

    fn on_draw_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> LoopControl;

    /// The surface is about to go away.
    fn on_surface_destroyed(&mut self) {}
}
