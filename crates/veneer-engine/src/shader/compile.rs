use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ShaderError, ShaderSources, Stage};

/// A vertex input of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    /// Float components declared by the shader (1..=4).
    pub components: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBuffer { size: u32 },
    Texture,
    Sampler,
}

/// A group-0 resource binding of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Reflected interface of a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// Sorted by location.
    pub attributes: Vec<AttributeInfo>,
    /// Sorted by binding.
    pub resources: Vec<ResourceInfo>,
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceInfo> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resource_at(&self, binding: u32) -> Option<&ResourceInfo> {
        self.resources.iter().find(|r| r.binding == binding)
    }
}

/// One compiled stage: source text plus its entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSource {
    pub source: Arc<str>,
    pub entry_point: String,
}

/// Output of a successful compile + link, consumed by backends.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedProgram {
    pub vertex: StageSource,
    pub fragment: StageSource,
    pub interface: ProgramInterface,
}

/// Compiles both stages and links them into a [`LinkedProgram`].
pub fn compile_and_link(sources: &ShaderSources) -> Result<LinkedProgram, ShaderError> {
    let vertex = CompiledStage::compile(Stage::Vertex, &sources.vertex)?;
    let fragment = CompiledStage::compile(Stage::Fragment, &sources.fragment)?;
    link(vertex, fragment)
}

/// Stage IO slot: (name, components) by location.
type Varyings = BTreeMap<u32, (String, u8)>;

struct CompiledStage {
    source: Arc<str>,
    module: naga::Module,
    entry: usize,
}

impl CompiledStage {
    fn compile(stage: Stage, source: &Arc<str>) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
            stage,
            log: e.emit_to_string(source),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            log: e.emit_to_string(source),
        })?;

        let entry = module
            .entry_points
            .iter()
            .position(|ep| ep.stage == stage.naga())
            .ok_or_else(|| ShaderError::link(format!("no @{stage} entry point")))?;

        Ok(Self {
            source: Arc::clone(source),
            module,
            entry,
        })
    }

    fn entry_point(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry]
    }

    fn inputs(&self) -> Result<Varyings, ShaderError> {
        let mut out = Varyings::new();
        for arg in &self.entry_point().function.arguments {
            self.collect_io(arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut out)?;
        }
        Ok(out)
    }

    fn outputs(&self) -> Result<Varyings, ShaderError> {
        let mut out = Varyings::new();
        if let Some(result) = &self.entry_point().function.result {
            self.collect_io(None, result.ty, result.binding.as_ref(), &mut out)?;
        }
        Ok(out)
    }

    /// Flattens one IO value: located scalars/vectors directly, structs by member.
    fn collect_io(
        &self,
        name: Option<&str>,
        ty: naga::Handle<naga::Type>,
        binding: Option<&naga::Binding>,
        out: &mut Varyings,
    ) -> Result<(), ShaderError> {
        match binding {
            Some(naga::Binding::Location { location, .. }) => {
                let components = self.float_components(ty).ok_or_else(|| {
                    ShaderError::link(format!(
                        "location {location} must be an f32 scalar or vector"
                    ))
                })?;
                let name = name.unwrap_or("_").to_string();
                out.insert(*location, (name, components));
                Ok(())
            }
            Some(naga::Binding::BuiltIn(_)) => Ok(()),
            None => match &self.module.types[ty].inner {
                naga::TypeInner::Struct { members, .. } => {
                    for m in members {
                        self.collect_io(m.name.as_deref(), m.ty, m.binding.as_ref(), out)?;
                    }
                    Ok(())
                }
                _ => Ok(()),
            },
        }
    }

    fn float_components(&self, ty: naga::Handle<naga::Type>) -> Option<u8> {
        let is_f32 = |s: &naga::Scalar| s.kind == naga::ScalarKind::Float && s.width == 4;
        match &self.module.types[ty].inner {
            naga::TypeInner::Scalar(s) if is_f32(s) => Some(1),
            naga::TypeInner::Vector { size, scalar } if is_f32(scalar) => Some(*size as u8),
            _ => None,
        }
    }

    fn resources(&self) -> Result<Vec<ResourceInfo>, ShaderError> {
        let mut out = Vec::new();
        for (_, var) in self.module.global_variables.iter() {
            let Some(rb) = &var.binding else { continue };
            let name = var.name.clone().unwrap_or_default();

            if rb.group != 0 {
                return Err(ShaderError::link(format!(
                    "`{name}` uses bind group {}; only group 0 is supported",
                    rb.group
                )));
            }

            let inner = &self.module.types[var.ty].inner;
            let kind = match (var.space, inner) {
                (naga::AddressSpace::Uniform, _) => ResourceKind::UniformBuffer {
                    size: inner.size(self.module.to_ctx()),
                },
                (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => ResourceKind::Texture,
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => ResourceKind::Sampler,
                _ => {
                    return Err(ShaderError::link(format!(
                        "`{name}` has an unsupported resource type"
                    )));
                }
            };

            out.push(ResourceInfo {
                name,
                binding: rb.binding,
                kind,
            });
        }
        Ok(out)
    }
}

fn link(vertex: CompiledStage, fragment: CompiledStage) -> Result<LinkedProgram, ShaderError> {
    let produced = vertex.outputs()?;
    for (location, (name, components)) in fragment.inputs()? {
        match produced.get(&location) {
            Some((_, c)) if *c == components => {}
            Some((_, c)) => {
                return Err(ShaderError::link(format!(
                    "fragment input `{name}` at location {location} has {components} components, \
                     vertex output has {c}"
                )));
            }
            None => {
                return Err(ShaderError::link(format!(
                    "fragment input `{name}` at location {location} is not written by the vertex stage"
                )));
            }
        }
    }

    let attributes = vertex
        .inputs()?
        .into_iter()
        .map(|(location, (name, components))| AttributeInfo {
            name,
            location,
            components,
        })
        .collect();

    let resources = merge_resources(vertex.resources()?, fragment.resources()?)?;

    let entry_point = |s: &CompiledStage| s.entry_point().name.clone();
    Ok(LinkedProgram {
        vertex: StageSource {
            entry_point: entry_point(&vertex),
            source: vertex.source.clone(),
        },
        fragment: StageSource {
            entry_point: entry_point(&fragment),
            source: fragment.source.clone(),
        },
        interface: ProgramInterface {
            attributes,
            resources,
        },
    })
}

/// Unions both stages' bindings; a binding number or name may only mean one thing.
fn merge_resources(
    vertex: Vec<ResourceInfo>,
    fragment: Vec<ResourceInfo>,
) -> Result<Vec<ResourceInfo>, ShaderError> {
    let mut by_binding: BTreeMap<u32, ResourceInfo> = BTreeMap::new();

    for res in vertex.into_iter().chain(fragment) {
        if let Some(existing) = by_binding.get(&res.binding) {
            if existing.kind != res.kind || existing.name != res.name {
                return Err(ShaderError::link(format!(
                    "binding {} declared as `{}` and `{}` with different types",
                    res.binding, existing.name, res.name
                )));
            }
            continue;
        }
        if let Some(other) = by_binding.values().find(|r| r.name == res.name) {
            return Err(ShaderError::link(format!(
                "`{}` bound at both {} and {}",
                res.name, other.binding, res.binding
            )));
        }
        by_binding.insert(res.binding, res);
    }

    Ok(by_binding.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{DEFAULT_VERTEX, TEXTURED_FRAGMENT};

    fn sources(vs: &str, fs: &str) -> ShaderSources {
        ShaderSources::new(vs, fs)
    }

    #[test]
    fn stock_program_links() {
        let p = compile_and_link(&ShaderSources::textured()).unwrap();
        assert_eq!(p.vertex.entry_point, "vs_main");
        assert_eq!(p.fragment.entry_point, "fs_main");

        let pos = p.interface.attribute("a_position").unwrap();
        assert_eq!((pos.location, pos.components), (0, 3));
        let tc = p.interface.attribute("a_tex_coord").unwrap();
        assert_eq!((tc.location, tc.components), (1, 2));

        assert_eq!(
            p.interface.resource("u_transform").unwrap().kind,
            ResourceKind::UniformBuffer { size: 64 }
        );
        assert_eq!(p.interface.resource("u_texture").unwrap().kind, ResourceKind::Texture);
        assert_eq!(p.interface.resource("u_sampler").unwrap().kind, ResourceKind::Sampler);
    }

    #[test]
    fn malformed_fragment_fails_to_compile() {
        let err = compile_and_link(&sources(DEFAULT_VERTEX, "@fragment fn fs_main( -> {")).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, Stage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_but_parseable_shader_fails_validation() {
        // Returns an f32 where a vec4 is declared.
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = compile_and_link(&sources(DEFAULT_VERTEX, fs)).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: Stage::Fragment, .. }));
    }

    #[test]
    fn missing_entry_point_is_a_link_error() {
        let err = compile_and_link(&sources(TEXTURED_FRAGMENT, TEXTURED_FRAGMENT)).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn unmatched_varying_is_a_link_error() {
        let fs = r#"
@fragment
fn fs_main(@location(3) extra: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(extra, 0.0, 1.0);
}
"#;
        let err = compile_and_link(&sources(DEFAULT_VERTEX, fs)).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(log.contains("location 3")),
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn varying_component_mismatch_is_a_link_error() {
        let fs = r#"
@fragment
fn fs_main(@location(0) tc: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(tc, 1.0);
}
"#;
        assert!(matches!(
            compile_and_link(&sources(DEFAULT_VERTEX, fs)),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn conflicting_bindings_are_a_link_error() {
        // Binding 0 is the transform uniform in the vertex stage.
        let fs = r#"
@group(0) @binding(0) var u_texture: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) tc: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_texture, u_sampler, tc);
}
"#;
        assert!(matches!(
            compile_and_link(&sources(DEFAULT_VERTEX, fs)),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn non_zero_group_is_rejected() {
        let fs = r#"
@group(1) @binding(0) var u_texture: texture_2d<f32>;
@group(1) @binding(1) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) tc: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_texture, u_sampler, tc);
}
"#;
        assert!(matches!(
            compile_and_link(&sources(DEFAULT_VERTEX, fs)),
            Err(ShaderError::Link { .. })
        ));
    }
}
