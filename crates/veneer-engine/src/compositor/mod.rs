//! Dual-surface compositor.
//!
//! Each frame clears the target, recomputes both rotation matrices, then draws
//! the background (camera) quad full-screen and the foreground (video) quad
//! with the latest tracked coordinates. Both passes run under one geometry read
//! guard so the foreground never mixes two updates. Nothing in `draw_frame`
//! fails: broken programs and stale sources skip their pass, GPU error codes
//! are drained and logged.

mod config;
mod handle;
mod transform;

use std::sync::Arc;

use anyhow::Context;

use crate::coords::{Mat4, Quad, Viewport, QUAD_VERTICES};
use crate::gfx::{GpuErrorCode, GraphicsApi, Topology};
use crate::shader::ProgramCache;
use crate::source::FrameSource;
use crate::surface::{AcquireError, SurfaceManager, SurfaceRole};

pub use config::CompositorConfig;
pub use handle::CompositorHandle;
pub use transform::TransformState;

/// The two streaming inputs, camera first.
pub struct CompositorSources {
    pub background: Box<dyn FrameSource>,
    pub foreground: Box<dyn FrameSource>,
}

impl CompositorSources {
    pub fn new(background: impl FrameSource + 'static, foreground: impl FrameSource + 'static) -> Self {
        Self {
            background: Box::new(background),
            foreground: Box::new(foreground),
        }
    }
}

/// What happened to one pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Drawn,
    /// `initialize` has not run (or `teardown` did).
    SkippedUninitialized,
    /// The pass's program failed to build.
    SkippedProgram,
    /// The pass's source could not be acquired.
    SkippedSource,
}

/// Summary of one `draw_frame` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub background: PassOutcome,
    pub foreground: PassOutcome,
    /// Geometry generation the foreground pass read.
    pub geometry_generation: u64,
    /// Error codes drained after the passes, oldest first.
    pub errors: Vec<GpuErrorCode>,
}

impl FrameReport {
    pub fn all_drawn(&self) -> bool {
        self.background == PassOutcome::Drawn && self.foreground == PassOutcome::Drawn
    }
}

/// Tracks consecutive failures of one pass for log rate limiting.
#[derive(Debug, Default)]
struct FailureStreak {
    frames: u64,
}

impl FailureStreak {
    /// Returns true when this failure should be logged.
    fn fail(&mut self, every: u64) -> bool {
        self.frames += 1;
        self.frames == 1 || (every > 0 && self.frames % every == 0)
    }

    /// Returns the streak length if one just ended.
    fn recover(&mut self) -> Option<u64> {
        let n = std::mem::take(&mut self.frames);
        (n > 0).then_some(n)
    }
}

/// Renders the camera background and tracked video foreground.
///
/// Owns every GPU object it creates through the injected [`GraphicsApi`]; they
/// are released by [`Compositor::teardown`] or on drop.
pub struct Compositor<A: GraphicsApi> {
    api: A,
    config: CompositorConfig,
    handle: CompositorHandle,
    surfaces: SurfaceManager,
    programs: Option<ProgramCache>,
    transform: TransformState,
    viewport: Option<Viewport>,
    frame_index: u64,
    streaks: [FailureStreak; 2],
}

impl<A: GraphicsApi> Compositor<A> {
    pub fn new(api: A, config: CompositorConfig, sources: CompositorSources) -> Self {
        let handle = CompositorHandle::from_config(&config);
        Self::with_handle(api, config, sources, handle)
    }

    /// Uses an existing handle, so controllers can be wired before the GPU is up.
    ///
    /// The handle's buffering mode and initial state take precedence over `config`.
    pub fn with_handle(
        api: A,
        config: CompositorConfig,
        sources: CompositorSources,
        handle: CompositorHandle,
    ) -> Self {
        let surfaces = SurfaceManager::new(
            sources.background,
            config.background_surface,
            sources.foreground,
            config.foreground_surface,
        );
        let (bg, fg) = handle.rotations();
        Self {
            api,
            surfaces,
            handle,
            programs: None,
            transform: TransformState::new(bg, fg),
            viewport: None,
            frame_index: 0,
            streaks: Default::default(),
            config,
        }
    }

    pub fn handle(&self) -> CompositorHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    pub fn surfaces(&self) -> &SurfaceManager {
        &self.surfaces
    }

    pub fn programs(&self) -> Option<&ProgramCache> {
        self.programs.as_ref()
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn is_initialized(&self) -> bool {
        self.programs.is_some()
    }

    /// Surface created: allocates both textures and builds both programs.
    ///
    /// Program failures are not errors here; they disable their pass. Calling
    /// this again (surface recreated) rebuilds everything.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        if self.is_initialized() {
            log::debug!("compositor re-initializing; releasing previous GPU objects");
            self.teardown();
        }

        self.surfaces
            .initialize(&mut self.api)
            .context("allocating surface textures")?;

        let programs = ProgramCache::build(
            &mut self.api,
            &self.config.background_shader,
            &self.config.foreground_shader,
            &self.config.bindings,
        );
        log::info!(
            "compositor ready (background program: {}, foreground program: {}, {:?} buffering)",
            if programs.background.is_linked() { "ok" } else { "failed" },
            if programs.foreground.is_linked() { "ok" } else { "failed" },
            self.handle.geometry().mode(),
        );
        self.programs = Some(programs);

        if let Some(vp) = self.viewport {
            self.api.set_viewport(vp);
        }
        Ok(())
    }

    /// Swaps in a new graphics context (the old one was lost) and returns the old one.
    ///
    /// Objects created through the old context are released first; call
    /// [`Compositor::initialize`] afterwards.
    pub fn replace_api(&mut self, api: A) -> A {
        self.teardown();
        std::mem::replace(&mut self.api, api)
    }

    /// Surface changed: new drawable size in pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        let vp = Viewport::new(width, height);
        if !vp.is_valid() {
            log::debug!("ignoring zero-area viewport {width}x{height}");
            return;
        }
        self.viewport = Some(vp);
        self.api.set_viewport(vp);
    }

    /// Draws one frame. Never fails; see [`FrameReport`] for what happened.
    pub fn draw_frame(&mut self) -> FrameReport {
        self.frame_index += 1;

        self.api.clear(self.config.clear_color);

        let (bg_angle, fg_angle) = self.handle.rotations();
        self.transform.recompute(bg_angle, fg_angle);

        let geometry = Arc::clone(self.handle.geometry());
        let (background, foreground, geometry_generation) = {
            let guard = geometry.read();
            let bg_mvp = self.transform.background_mvp;
            let fg_mvp = self.transform.foreground_mvp;
            let background = self.draw_pass(SurfaceRole::Background, &Quad::FULL_SCREEN, &bg_mvp);
            let foreground = self.draw_pass(SurfaceRole::Foreground, guard.quad(), &fg_mvp);
            (background, foreground, guard.generation())
        };

        let errors = self.drain_errors();

        FrameReport {
            frame_index: self.frame_index,
            background,
            foreground,
            geometry_generation,
            errors,
        }
    }

    fn draw_pass(&mut self, role: SurfaceRole, quad: &Quad, mvp: &Mat4) -> PassOutcome {
        let Some(programs) = &self.programs else {
            return PassOutcome::SkippedUninitialized;
        };
        let program = match role {
            SurfaceRole::Background => &programs.background,
            SurfaceRole::Foreground => &programs.foreground,
        };
        let Some((id, loc)) = program.linked() else {
            return PassOutcome::SkippedProgram;
        };

        self.api.use_program(Some(id));

        if let Err(err) = self.surfaces.acquire_latest(role, &mut self.api, self.frame_index) {
            self.note_acquire_failure(role, &err);
            return PassOutcome::SkippedSource;
        }
        if let Some(frames) = self.streak(role).recover() {
            log::info!("{role} pass recovered after {frames} skipped frame(s)");
        }

        let surface = self.surfaces.surface(role);
        let Some(texture) = surface.texture() else {
            return PassOutcome::SkippedSource;
        };
        let tex_coords = Quad::tex_coords(surface.flip_vertically());

        self.api.bind_texture(0, texture);
        self.api.uniform_sampler(loc.sampler, 0);
        self.api.uniform_mat4(loc.transform, mvp);

        self.api.enable_attrib_array(loc.position);
        self.api.attrib_pointer(loc.position, 3, quad.as_slice());
        self.api.enable_attrib_array(loc.tex_coord);
        self.api.attrib_pointer(loc.tex_coord, 2, tex_coords);

        self.api.draw_arrays(Topology::TriangleStrip, 0, QUAD_VERTICES);

        self.api.disable_attrib_array(loc.position);
        self.api.disable_attrib_array(loc.tex_coord);

        PassOutcome::Drawn
    }

    fn streak(&mut self, role: SurfaceRole) -> &mut FailureStreak {
        match role {
            SurfaceRole::Background => &mut self.streaks[0],
            SurfaceRole::Foreground => &mut self.streaks[1],
        }
    }

    fn note_acquire_failure(&mut self, role: SurfaceRole, err: &AcquireError) {
        let every = self.config.warn_every_frames;
        let streak = self.streak(role);
        if streak.fail(every) {
            log::warn!(
                "{role} pass skipped ({err}); {} consecutive frame(s)",
                streak.frames
            );
        }
    }

    fn drain_errors(&mut self) -> Vec<GpuErrorCode> {
        let mut errors = Vec::new();
        for _ in 0..self.config.max_errors_per_frame {
            match self.api.get_error() {
                Some(code) => {
                    log::warn!("GPU error after frame {}: {code}", self.frame_index);
                    errors.push(code);
                }
                None => break,
            }
        }
        errors
    }

    /// Surface destroyed: deletes textures and programs. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(mut programs) = self.programs.take() {
            programs.release(&mut self.api);
            self.surfaces.release(&mut self.api);
            log::debug!("compositor torn down after {} frame(s)", self.frame_index);
        }
    }
}

impl<A: GraphicsApi> Drop for Compositor<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::RecordingApi;
    use crate::gfx::AttribLocation;
    use crate::coords::FULL_SCREEN_TEX_COORDS;
    use crate::shader::{ShaderSources, DEFAULT_VERTEX};
    use crate::source::{frame_slot, Frame, FrameProducer, SourceError};
    use std::thread;

    struct Rig {
        compositor: Compositor<RecordingApi>,
        background: FrameProducer,
        foreground: FrameProducer,
    }

    fn rig(config: CompositorConfig) -> Rig {
        let (background, bg) = frame_slot(Some((16, 16)));
        let (foreground, fg) = frame_slot(Some((8, 8)));
        let mut compositor =
            Compositor::new(RecordingApi::new(), config, CompositorSources::new(bg, fg));
        compositor.initialize().unwrap();
        compositor.resize(320, 240);
        Rig {
            compositor,
            background,
            foreground,
        }
    }

    // ── end to end ───────────────────────────────────────────────────────

    #[test]
    fn one_frame_draws_two_strips_and_leaves_no_arrays_enabled() {
        let mut r = rig(CompositorConfig::default());
        r.background.submit(Frame::solid_rgba(16, 16, [10, 20, 30, 255])).unwrap();
        r.foreground.submit(Frame::solid_rgba(8, 8, [200, 0, 0, 255])).unwrap();
        r.compositor.handle().set_coordinates(Quad::FULL_SCREEN.as_slice()).unwrap();

        let report = r.compositor.draw_frame();
        assert!(report.all_drawn());
        assert!(report.errors.is_empty());

        let api = r.compositor.api();
        assert_eq!(api.live_textures(), 2);
        assert_eq!(api.clears().len(), 1);
        assert_eq!(api.viewport(), Some(Viewport::new(320, 240)));

        let draws = api.draws();
        assert_eq!(draws.len(), 2);
        for d in draws {
            assert_eq!(d.topology, Topology::TriangleStrip);
            assert_eq!((d.first, d.count), (0, 4));
            assert_eq!(d.attribs[&0], Quad::FULL_SCREEN.as_slice());
            assert_eq!(d.attribs[&1], FULL_SCREEN_TEX_COORDS);
            assert!(d.transform.unwrap().approx_eq(&Mat4::IDENTITY, 1e-6));
        }
        assert_ne!(draws[0].texture, draws[1].texture);
        assert_eq!(api.enabled_attrib_arrays(), 0);
    }

    #[test]
    fn foreground_uses_latest_coordinates_and_angle() {
        let cfg = CompositorConfig::default().with_angles(0.0, 90.0);
        let mut r = rig(cfg);
        let coords: [f32; 12] = [-0.5, 0.5, 0.0, 0.5, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];
        r.compositor.handle().set_coordinates(&coords).unwrap();

        let report = r.compositor.draw_frame();
        assert_eq!(report.geometry_generation, 1);

        let draws = r.compositor.api().draws();
        assert_eq!(draws[0].attribs[&0], Quad::FULL_SCREEN.as_slice());
        assert_eq!(draws[1].attribs[&0], coords);
        assert!(draws[1]
            .transform
            .unwrap()
            .approx_eq(&Mat4::rotation_z_degrees(90.0), 1e-6));
    }

    #[test]
    fn rotation_set_through_handle_applies_next_frame() {
        let mut r = rig(CompositorConfig::default());
        r.compositor.draw_frame();
        r.compositor.handle().set_background_rotation(360.0);
        r.compositor.handle().set_foreground_rotation(180.0);
        r.compositor.draw_frame();

        let t = r.compositor.transform();
        assert!(t.background_mvp.approx_eq(&Mat4::IDENTITY, 1e-6));
        assert!(t.foreground_mvp.approx_eq(&Mat4::rotation_z_degrees(180.0), 1e-6));
    }

    #[test]
    fn flipped_surface_uses_flipped_tex_coords() {
        let mut r = rig(CompositorConfig::portrait_sensor());
        r.compositor.draw_frame();
        let draws = r.compositor.api().draws();
        assert_eq!(draws[0].attribs[&1], Quad::tex_coords(true));
        assert_eq!(draws[1].attribs[&1], Quad::tex_coords(false));
    }

    #[test]
    fn no_frame_yet_still_draws_blank_texture() {
        let mut r = rig(CompositorConfig::default());
        let report = r.compositor.draw_frame();
        assert!(report.all_drawn());
        assert_eq!(r.compositor.api().draws().len(), 2);
    }

    // ── failure handling ─────────────────────────────────────────────────

    #[test]
    fn malformed_fragment_shader_disables_only_its_pass() {
        let cfg = CompositorConfig {
            foreground_shader: ShaderSources::new(DEFAULT_VERTEX, "@fragment fn broken("),
            ..CompositorConfig::default()
        };
        let mut r = rig(cfg);
        assert!(r.compositor.programs().unwrap().foreground.failure().is_some());

        for _ in 0..3 {
            let report = r.compositor.draw_frame();
            assert_eq!(report.background, PassOutcome::Drawn);
            assert_eq!(report.foreground, PassOutcome::SkippedProgram);
            assert!(report.errors.is_empty());
        }
        assert_eq!(r.compositor.api().draws().len(), 3);
        assert_eq!(r.compositor.api().enabled_attrib_arrays(), 0);
    }

    #[test]
    fn stale_sources_skip_their_pass() {
        let Rig {
            mut compositor,
            background,
            foreground,
        } = rig(CompositorConfig::default());
        drop(foreground);

        let report = compositor.draw_frame();
        assert_eq!(report.background, PassOutcome::Drawn);
        assert_eq!(report.foreground, PassOutcome::SkippedSource);
        let report = compositor.draw_frame();
        assert_eq!(report.foreground, PassOutcome::SkippedSource);

        drop(background);
        let report = compositor.draw_frame();
        assert_eq!(report.background, PassOutcome::SkippedSource);
        assert_eq!(compositor.api().draws().len(), 2);
        assert_eq!(compositor.api().enabled_attrib_arrays(), 0);
    }

    /// Source outside the frame slot: frames reach the compositor unvalidated.
    struct Scripted(Vec<Frame>);

    impl FrameSource for Scripted {
        fn set_frame_listener(&mut self, _listener: crate::source::FrameListener) {}

        fn acquire(&mut self) -> Result<Option<Frame>, SourceError> {
            Ok(self.0.pop())
        }
    }

    #[test]
    fn short_frame_from_custom_source_skips_pass() {
        let (_fp, fg) = frame_slot(None);
        // Popped from the back: the short frame comes first.
        let background = Scripted(vec![
            Frame::solid_rgba(2, 2, [1, 2, 3, 255]),
            Frame::new_rgba(vec![0u8; 3], 2, 2),
        ]);
        let mut c = Compositor::new(
            RecordingApi::new(),
            CompositorConfig::default(),
            CompositorSources::new(background, fg),
        );
        c.initialize().unwrap();

        let report = c.draw_frame();
        assert_eq!(report.background, PassOutcome::SkippedSource);
        assert_eq!(report.foreground, PassOutcome::Drawn);
        let bg = c.surfaces().surface(SurfaceRole::Background).texture().unwrap();
        assert_eq!(c.api().texture(bg).unwrap().uploads, 0);

        assert_eq!(c.draw_frame().background, PassOutcome::Drawn);
        assert_eq!(c.api().texture(bg).unwrap().uploads, 1);
    }

    #[test]
    fn rejected_upload_skips_then_recovers() {
        let mut r = rig(CompositorConfig::default());
        r.background.submit(Frame::solid_rgba(16, 16, [0; 4])).unwrap();
        r.compositor.api_mut().fail_uploads(true);
        assert_eq!(r.compositor.draw_frame().background, PassOutcome::SkippedSource);

        r.compositor.api_mut().fail_uploads(false);
        assert_eq!(r.compositor.draw_frame().background, PassOutcome::Drawn);
        assert_eq!(r.compositor.streaks[0].frames, 0);
    }

    #[test]
    fn gpu_errors_are_drained_not_propagated() {
        let cfg = CompositorConfig {
            max_errors_per_frame: 2,
            ..CompositorConfig::default()
        };
        let mut r = rig(cfg);
        for _ in 0..3 {
            r.compositor.api_mut().push_error(GpuErrorCode::InvalidOperation);
        }

        let report = r.compositor.draw_frame();
        assert!(report.all_drawn());
        assert_eq!(report.errors, vec![GpuErrorCode::InvalidOperation; 2]);
        assert_eq!(r.compositor.api().pending_errors(), 1);
        assert_eq!(r.compositor.draw_frame().errors.len(), 1);
        assert_eq!(r.compositor.api().pending_errors(), 0);
    }

    #[test]
    fn draw_before_initialize_is_a_no_op() {
        let (_bp, bg) = frame_slot(None);
        let (_fp, fg) = frame_slot(None);
        let mut c = Compositor::new(
            RecordingApi::new(),
            CompositorConfig::default(),
            CompositorSources::new(bg, fg),
        );
        let report = c.draw_frame();
        assert_eq!(report.background, PassOutcome::SkippedUninitialized);
        assert_eq!(report.foreground, PassOutcome::SkippedUninitialized);
        assert!(c.api().draws().is_empty());
    }

    // ── lifecycle ────────────────────────────────────────────────────────

    #[test]
    fn teardown_releases_everything_once() {
        let mut r = rig(CompositorConfig::default());
        assert_eq!(r.compositor.api().live_programs(), 2);
        r.compositor.teardown();
        r.compositor.teardown();
        assert_eq!(r.compositor.api().live_textures(), 0);
        assert_eq!(r.compositor.api().live_programs(), 0);
        assert!(!r.compositor.is_initialized());
    }

    #[test]
    fn reinitialize_replaces_gpu_objects() {
        let mut r = rig(CompositorConfig::default());
        r.compositor.initialize().unwrap();
        assert_eq!(r.compositor.api().live_textures(), 2);
        assert_eq!(r.compositor.api().live_programs(), 2);
        assert!(r.compositor.draw_frame().all_drawn());
    }

    #[test]
    fn replaced_context_gets_fresh_objects() {
        let mut r = rig(CompositorConfig::default());
        let old = r.compositor.replace_api(RecordingApi::new());
        assert_eq!(old.live_textures(), 0);
        assert_eq!(old.live_programs(), 0);

        r.compositor.initialize().unwrap();
        assert_eq!(r.compositor.api().live_textures(), 2);
        assert!(r.compositor.draw_frame().all_drawn());
    }

    #[test]
    fn zero_area_resize_keeps_previous_viewport() {
        let mut r = rig(CompositorConfig::default());
        r.compositor.resize(0, 600);
        assert_eq!(r.compositor.api().viewport(), Some(Viewport::new(320, 240)));
    }

    // ── concurrency ──────────────────────────────────────────────────────

    #[test]
    fn concurrent_updates_never_mix_within_a_draw() {
        let mut r = rig(CompositorConfig {
            initial_quad: Quad::new([0.0; 12]),
            ..CompositorConfig::default()
        });
        let handle = r.compositor.handle();

        let writer = thread::spawn(move || {
            for i in 0..2000 {
                handle.set_coordinates(&[i as f32; 12]).unwrap();
            }
        });

        for _ in 0..200 {
            r.compositor.draw_frame();
            let draws = r.compositor.api_mut().take_draws();
            let fg = &draws[1].attribs[&AttribLocation(0).0];
            assert!(fg.iter().all(|v| *v == fg[0]), "mixed quad {fg:?}");
        }
        writer.join().unwrap();
    }
}
