use crate::gfx::{AttribLocation, GraphicsApi, ProgramId, UniformLocation};

use super::{compile_and_link, ProgramInterface, ResourceKind, ShaderError, ShaderSources};

/// Names the draw pass looks up once after linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBindings {
    pub position: String,
    pub tex_coord: String,
    pub sampler: String,
    pub transform: String,
}

impl Default for ShaderBindings {
    fn default() -> Self {
        Self {
            position: "a_position".into(),
            tex_coord: "a_tex_coord".into(),
            sampler: "u_texture".into(),
            transform: "u_transform".into(),
        }
    }
}

/// Locations cached for the lifetime of a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProgramLocations {
    pub position: AttribLocation,
    pub tex_coord: AttribLocation,
    pub sampler: UniformLocation,
    pub transform: UniformLocation,
}

impl ProgramLocations {
    /// Resolves every binding name against a linked interface.
    ///
    /// A missing name, or a name bound to the wrong kind of resource, is a link failure.
    pub fn resolve(
        interface: &ProgramInterface,
        bindings: &ShaderBindings,
    ) -> Result<Self, ShaderError> {
        let attribute = |name: &str| {
            interface
                .attribute(name)
                .map(|a| AttribLocation(a.location))
                .ok_or_else(|| ShaderError::link(format!("no active attribute named `{name}`")))
        };

        let sampler = interface
            .resource(&bindings.sampler)
            .filter(|r| r.kind == ResourceKind::Texture)
            .map(|r| UniformLocation(r.binding))
            .ok_or_else(|| {
                ShaderError::link(format!("no texture uniform named `{}`", bindings.sampler))
            })?;

        let transform = interface
            .resource(&bindings.transform)
            .filter(|r| matches!(r.kind, ResourceKind::UniformBuffer { size } if size >= 64))
            .map(|r| UniformLocation(r.binding))
            .ok_or_else(|| {
                ShaderError::link(format!("no mat4 uniform named `{}`", bindings.transform))
            })?;

        Ok(Self {
            position: attribute(&bindings.position)?,
            tex_coord: attribute(&bindings.tex_coord)?,
            sampler,
            transform,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ProgramState {
    Linked { id: ProgramId, locations: ProgramLocations },
    Failed { error: ShaderError },
    Released,
}

/// One shader program and its cached locations.
///
/// Build failures are terminal: the program stays failed and is never rebuilt.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    label: &'static str,
    state: ProgramState,
}

impl ShaderProgram {
    /// Compiles, links and creates the program, then resolves its locations.
    ///
    /// Never returns an error; a failure is logged with its diagnostic and
    /// recorded in the returned program.
    pub fn build(
        api: &mut dyn GraphicsApi,
        label: &'static str,
        sources: &ShaderSources,
        bindings: &ShaderBindings,
    ) -> Self {
        let state = match Self::try_build(api, sources, bindings) {
            Ok((id, locations)) => {
                log::debug!("{label} program linked as {} ({locations:?})", id.raw());
                ProgramState::Linked { id, locations }
            }
            Err(error) => {
                log::error!("{label} program unusable: {error}");
                ProgramState::Failed { error }
            }
        };
        Self { label, state }
    }

    fn try_build(
        api: &mut dyn GraphicsApi,
        sources: &ShaderSources,
        bindings: &ShaderBindings,
    ) -> Result<(ProgramId, ProgramLocations), ShaderError> {
        let linked = compile_and_link(sources)?;
        let locations = ProgramLocations::resolve(&linked.interface, bindings)?;
        let id = api.create_program(&linked).map_err(ShaderError::Backend)?;
        Ok((id, locations))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Program handle and locations, if the program is usable.
    pub fn linked(&self) -> Option<(ProgramId, ProgramLocations)> {
        match self.state {
            ProgramState::Linked { id, locations } => Some((id, locations)),
            _ => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked().is_some()
    }

    pub fn failure(&self) -> Option<&ShaderError> {
        match &self.state {
            ProgramState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Deletes the backend program. Later calls are no-ops.
    pub fn release(&mut self, api: &mut dyn GraphicsApi) {
        if let ProgramState::Linked { id, .. } = self.state {
            api.delete_program(id);
            self.state = ProgramState::Released;
        }
    }
}

/// The two programs used per frame.
#[derive(Debug)]
pub struct ProgramCache {
    pub background: ShaderProgram,
    pub foreground: ShaderProgram,
}

impl ProgramCache {
    pub fn build(
        api: &mut dyn GraphicsApi,
        background: &ShaderSources,
        foreground: &ShaderSources,
        bindings: &ShaderBindings,
    ) -> Self {
        Self {
            background: ShaderProgram::build(api, "background", background, bindings),
            foreground: ShaderProgram::build(api, "foreground", foreground, bindings),
        }
    }

    pub fn release(&mut self, api: &mut dyn GraphicsApi) {
        self.background.release(api);
        self.foreground.release(api);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::RecordingApi;
    use crate::shader::DEFAULT_VERTEX;

    // ── locations ────────────────────────────────────────────────────────

    #[test]
    fn default_bindings_resolve_against_stock_program() {
        let linked = compile_and_link(&ShaderSources::textured()).unwrap();
        let loc = ProgramLocations::resolve(&linked.interface, &ShaderBindings::default()).unwrap();
        assert_eq!(loc.position, AttribLocation(0));
        assert_eq!(loc.tex_coord, AttribLocation(1));
        assert_eq!(loc.transform, UniformLocation(0));
        assert_eq!(loc.sampler, UniformLocation(1));
    }

    #[test]
    fn missing_name_is_a_link_failure() {
        let linked = compile_and_link(&ShaderSources::textured()).unwrap();
        let bindings = ShaderBindings {
            tex_coord: "a_uv".into(),
            ..ShaderBindings::default()
        };
        let err = ProgramLocations::resolve(&linked.interface, &bindings).unwrap_err();
        assert!(matches!(err, ShaderError::Link { ref log } if log.contains("a_uv")));
    }

    #[test]
    fn sampler_name_must_be_a_texture() {
        let linked = compile_and_link(&ShaderSources::textured()).unwrap();
        let bindings = ShaderBindings {
            sampler: "u_transform".into(),
            ..ShaderBindings::default()
        };
        assert!(ProgramLocations::resolve(&linked.interface, &bindings).is_err());
    }

    // ── program lifecycle ────────────────────────────────────────────────

    #[test]
    fn build_creates_program_once() {
        let mut api = RecordingApi::new();
        let mut program = ShaderProgram::build(
            &mut api,
            "background",
            &ShaderSources::textured(),
            &ShaderBindings::default(),
        );
        assert!(program.is_linked());
        assert_eq!(api.live_programs(), 1);

        program.release(&mut api);
        program.release(&mut api);
        assert!(!program.is_linked());
        assert_eq!(api.live_programs(), 0);
    }

    #[test]
    fn broken_fragment_marks_program_failed() {
        let mut api = RecordingApi::new();
        let sources = ShaderSources::new(DEFAULT_VERTEX, "this is not wgsl");
        let program = ShaderProgram::build(&mut api, "foreground", &sources, &ShaderBindings::default());

        assert!(program.linked().is_none());
        assert!(matches!(program.failure(), Some(ShaderError::Compile { .. })));
        assert_eq!(api.live_programs(), 0);
    }

    #[test]
    fn backend_refusal_marks_program_failed() {
        let mut api = RecordingApi::new();
        api.fail_program_creation(true);
        let program = ShaderProgram::build(
            &mut api,
            "background",
            &ShaderSources::textured(),
            &ShaderBindings::default(),
        );
        assert!(matches!(program.failure(), Some(ShaderError::Backend(_))));
    }
}
