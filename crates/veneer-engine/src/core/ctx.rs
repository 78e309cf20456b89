use winit::window::Window;

use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;

use super::LoopControl;

/// Per-frame context passed to [`super::RenderLoop::on_draw_frame`].
///
/// `'a` is the callback; `'w` is the window borrow carried by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
}

impl FrameCtx<'_, '_> {
    /// Acquires the next surface image, lets `draw` record into it, then presents.
    ///
    /// `draw` is not called when no image could be acquired; surface errors are
    /// resolved here and only a fatal one ends the loop.
    pub fn render<F>(&mut self, draw: F) -> LoopControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface lost for good; stopping");
                        LoopControl::Exit
                    }
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        LoopControl::Continue
                    }
                };
            }
        };

        {
            let rctx = self.gpu.render_ctx();
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view, frame.size);
            draw(&rctx, &mut target);
        }

        self.window.pre_present_notify();
        self.gpu.submit(frame);
        LoopControl::Continue
    }
}
