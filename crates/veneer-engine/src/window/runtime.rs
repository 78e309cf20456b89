use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::core::{FrameCtx, LoopControl, RenderLoop};
use crate::device::{Gpu, GpuInit};
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Close the window on Escape.
    pub exit_on_escape: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "veneer".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            exit_on_escape: true,
        }
    }
}

/// Entry point for the render-loop driver.
pub struct Runtime;

impl Runtime {
    /// Runs `render_loop` in a single window until it closes.
    ///
    /// Redraws continuously; frame pacing comes from the surface present mode.
    pub fn run<L>(config: RuntimeConfig, gpu_init: GpuInit, render_loop: L) -> Result<()>
    where
        L: RenderLoop + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = DriverState::new(config, gpu_init, render_loop);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct DriverState<L: RenderLoop> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    render_loop: L,

    entry: Option<WindowEntry>,
    window_id: Option<WindowId>,
    exit_requested: bool,
    fatal: Option<anyhow::Error>,
}

impl<L: RenderLoop> DriverState<L> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, render_loop: L) -> Self {
        Self {
            config,
            gpu_init,
            render_loop,
            entry: None,
            window_id: None,
            exit_requested: false,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        self.destroy_surface();
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let id = window.id();
        let gpu_init = self.gpu_init.clone();

        let entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed")?;

        let render_loop = &mut self.render_loop;
        entry
            .with_gpu(|gpu| render_loop.on_surface_created(gpu))
            .context("render loop rejected the new surface")?;

        let size = entry.with_gpu(|gpu| gpu.size());
        render_loop.on_surface_changed(size.width, size.height);

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.window_id = Some(id);
        Ok(())
    }

    fn destroy_surface(&mut self) {
        if self.entry.take().is_some() {
            self.render_loop.on_surface_destroyed();
            log::debug!("surface destroyed");
        }
        self.window_id = None;
    }

    fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        entry.with_gpu_mut(|gpu| gpu.resize(size));
        entry.with_clock_mut(|clock| clock.reset());
        self.render_loop.on_surface_changed(size.width, size.height);
        entry.with_window(|w| w.request_redraw());
    }

    fn draw(&mut self) -> LoopControl {
        let (render_loop, entry) = (&mut self.render_loop, &mut self.entry);
        let Some(entry) = entry.as_mut() else {
            return LoopControl::Continue;
        };

        entry.with_mut(|fields| {
            let time = fields.clock.tick();
            let mut ctx = FrameCtx {
                window: fields.window,
                gpu: fields.gpu,
                time,
            };
            render_loop.on_draw_frame(&mut ctx)
        })
    }
}

impl<L: RenderLoop> ApplicationHandler for DriverState<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }
        if let Err(e) = self.create_surface(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.destroy_surface();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window_id != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.destroy_surface();
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if self.config.exit_on_escape => {
                self.destroy_surface();
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => self.resize(size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.draw() == LoopControl::Exit {
                    self.destroy_surface();
                    self.exit_requested = true;
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}
