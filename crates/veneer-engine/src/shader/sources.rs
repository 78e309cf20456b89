use std::sync::Arc;

/// Vertex stage shared by both passes: rotate the strip quad, forward tex coords.
pub const DEFAULT_VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@group(0) @binding(0) var<uniform> u_transform: mat4x4<f32>;

@vertex
fn vs_main(
    @location(0) a_position: vec3<f32>,
    @location(1) a_tex_coord: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u_transform * vec4<f32>(a_position, 1.0);
    out.tex_coord = a_tex_coord;
    return out;
}
"#;

/// Fragment stage sampling the pass's streamed texture.
pub const TEXTURED_FRAGMENT: &str = r#"
@group(0) @binding(1) var u_texture: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_texture, u_sampler, tex_coord);
}
"#;

/// WGSL text for one program.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSources {
    pub vertex: Arc<str>,
    pub fragment: Arc<str>,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<Arc<str>>, fragment: impl Into<Arc<str>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The stock textured-quad program.
    pub fn textured() -> Self {
        Self::new(DEFAULT_VERTEX, TEXTURED_FRAGMENT)
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::textured()
    }
}
