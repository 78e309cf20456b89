use std::time::Duration;

use anyhow::Context;

use crate::compositor::{Compositor, CompositorConfig, CompositorHandle, CompositorSources, FrameReport};
use crate::device::Gpu;
use crate::render::WgpuApi;
use crate::time::FrameStats;

use super::{FrameCtx, LoopControl, RenderLoop};

/// [`RenderLoop`] that drives a [`Compositor`] on the wgpu backend.
///
/// The compositor is built on the first `on_surface_created`; a later call
/// (surface recreated) moves it onto the new device and rebuilds its objects.
pub struct CompositorLoop {
    config: CompositorConfig,
    handle: CompositorHandle,
    sources: Option<CompositorSources>,
    compositor: Option<Compositor<WgpuApi>>,
    stats: FrameStats,
    last_report: Option<FrameReport>,
}

impl CompositorLoop {
    pub fn new(config: CompositorConfig, sources: CompositorSources) -> Self {
        let handle = CompositorHandle::from_config(&config);
        Self {
            config,
            handle,
            sources: Some(sources),
            compositor: None,
            stats: FrameStats::new("compositor", Duration::from_secs(5)),
            last_report: None,
        }
    }

    /// Control handle; usable before the surface exists.
    pub fn handle(&self) -> CompositorHandle {
        self.handle.clone()
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }
}

impl RenderLoop for CompositorLoop {
    fn on_surface_created(&mut self, gpu: &Gpu<'_>) -> anyhow::Result<()> {
        let api = WgpuApi::new(&gpu.render_ctx());

        let compositor = match self.compositor.take() {
            Some(mut existing) => {
                existing.replace_api(api);
                existing
            }
            None => {
                let sources = self
                    .sources
                    .take()
                    .context("compositor sources already consumed")?;
                Compositor::with_handle(api, self.config.clone(), sources, self.handle.clone())
            }
        };
        let compositor = self.compositor.insert(compositor);

        compositor.initialize()
    }

    fn on_surface_changed(&mut self, width: u32, height: u32) {
        if let Some(c) = self.compositor.as_mut() {
            c.resize(width, height);
        }
    }

    fn on_draw_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> LoopControl {
        let Some(compositor) = self.compositor.as_mut() else {
            return LoopControl::Continue;
        };

        let mut report = None;
        let control = ctx.render(|_, target| {
            report = Some(compositor.draw_frame());
            compositor.api_mut().encode(target);
        });

        if report.is_some() {
            self.stats.record(&ctx.time);
            self.last_report = report;
        }
        control
    }

    fn on_surface_destroyed(&mut self) {
        if let Some(c) = self.compositor.as_mut() {
            c.teardown();
        }
    }
}
