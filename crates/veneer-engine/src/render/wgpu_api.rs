use std::collections::{BTreeSet, HashMap, VecDeque};
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, PoisonError};

use wgpu::util::DeviceExt;

use crate::coords::{ColorRgba, Mat4, Viewport};
use crate::gfx::{
    AttribLocation, FilterMode, GpuError, GpuErrorCode, GraphicsApi, ProgramId, TextureDesc,
    TextureId, Topology, UniformLocation, WrapMode,
};
use crate::shader::{LinkedProgram, ResourceKind};
use crate::source::Frame;

use super::{RenderCtx, RenderTarget};

/// Streamed frames are uploaded as 8-bit sRGB RGBA.
const STREAM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Value of a vertex attribute whose array is disabled, and fill for missing components.
const ATTRIB_DEFAULT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

const MAX_VERTEX_ATTRIBS: u32 = 16;

type ErrorQueue = Arc<Mutex<VecDeque<GpuErrorCode>>>;

struct TextureSlot {
    label: &'static str,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: (u32, u32),
}

struct ProgramSlot {
    linked: LinkedProgram,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<Topology, wgpu::RenderPipeline>,
}

struct RecordedDraw {
    program: ProgramId,
    topology: Topology,
    first: u32,
    count: u32,
    bind_group: wgpu::BindGroup,
    /// One buffer per program attribute, in attribute order.
    vertex_buffers: Vec<wgpu::Buffer>,
}

/// Sticky GL-style binding state.
#[derive(Default)]
struct BoundState {
    program: Option<ProgramId>,
    units: HashMap<u32, TextureId>,
    enabled: BTreeSet<u32>,
    pointers: HashMap<u32, (u8, Vec<f32>)>,
    /// Keyed by (program, binding).
    matrices: HashMap<(u32, u32), Mat4>,
    /// Keyed by (program, binding); unset samplers read unit 0.
    sampler_units: HashMap<(u32, u32), u32>,
}

/// [`GraphicsApi`] on wgpu.
///
/// Calls are validated as they arrive; misuse queues a GL-style error code
/// instead of failing. Draws are recorded with their own vertex/uniform
/// buffers and bind group, then replayed by [`WgpuApi::encode`] into one
/// render pass that starts with the frame's clear color. wgpu validation
/// errors raised outside our checks are routed into the same error queue.
pub struct WgpuApi {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    max_texture_size: u32,

    next_id: u32,
    textures: HashMap<u32, TextureSlot>,
    programs: HashMap<u32, ProgramSlot>,

    state: BoundState,
    viewport: Option<Viewport>,
    clear: Option<ColorRgba>,
    draws: Vec<RecordedDraw>,
    errors: ErrorQueue,
}

impl WgpuApi {
    pub fn new(ctx: &RenderCtx<'_>) -> Self {
        let errors = ErrorQueue::default();

        let sink = Arc::clone(&errors);
        ctx.device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            let code = match &err {
                wgpu::Error::OutOfMemory { .. } => GpuErrorCode::OutOfMemory,
                _ => GpuErrorCode::InvalidOperation,
            };
            log::error!("wgpu: {err}");
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(code);
        }));

        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            target_format: ctx.surface_format,
            max_texture_size: ctx.device.limits().max_texture_dimension_2d,
            next_id: 0,
            textures: HashMap::new(),
            programs: HashMap::new(),
            state: BoundState::default(),
            viewport: None,
            clear: None,
            draws: Vec::new(),
            errors,
        }
    }

    fn issue(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn push_error(&self, code: GpuErrorCode) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(code);
    }

    fn current_program(&self) -> Option<(ProgramId, &ProgramSlot)> {
        let id = self.state.program?;
        self.programs.get(&id.raw()).map(|slot| (id, slot))
    }

    /// Replays this frame's recorded draws into one render pass on `target`.
    ///
    /// The pass clears to the last `clear` color (black when none was set).
    pub fn encode(&mut self, target: &mut RenderTarget<'_>) {
        let draws = std::mem::take(&mut self.draws);
        let clear = self.clear.take().unwrap_or_else(ColorRgba::black).sanitized();

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("veneer compositor pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if let Some(vp) = self.viewport.and_then(|vp| clamp_viewport(vp, target.size)) {
            rpass.set_viewport(0.0, 0.0, vp.width as f32, vp.height as f32, 0.0, 1.0);
        }

        for draw in &draws {
            let Some(pipeline) = self
                .programs
                .get(&draw.program.raw())
                .and_then(|p| p.pipelines.get(&draw.topology))
            else {
                continue;
            };

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &draw.bind_group, &[]);
            for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            rpass.draw(draw.first..draw.first + draw.count, 0..1);
        }
    }

    /// Builds the pipeline for (`program`, `topology`) if it does not exist yet.
    fn ensure_pipeline(&mut self, program: ProgramId, topology: Topology) {
        let format = self.target_format;
        let Some(slot) = self.programs.get_mut(&program.raw()) else {
            return;
        };
        if slot.pipelines.contains_key(&topology) {
            return;
        }

        let attributes = &slot.linked.interface.attributes;
        let attrs: Vec<[wgpu::VertexAttribute; 1]> = attributes
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: float_format(a.components),
                    offset: 0,
                    shader_location: a.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .zip(&attrs)
            .map(|(a, attr)| wgpu::VertexBufferLayout {
                array_stride: a.components as u64 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attr,
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("veneer program pipeline"),
                layout: Some(&slot.layout),
                vertex: wgpu::VertexState {
                    module: &slot.vertex,
                    entry_point: Some(slot.linked.vertex.entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &slot.fragment,
                    entry_point: Some(slot.linked.fragment.entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: primitive_topology(topology),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!("pipeline built for program {} ({topology:?})", program.raw());
        slot.pipelines.insert(topology, pipeline);
    }

    /// Texture a sampler binding of `program` reads through its texture unit.
    fn texture_for(&self, program: ProgramId, binding: u32) -> Option<&TextureSlot> {
        let unit = self
            .state
            .sampler_units
            .get(&(program.raw(), binding))
            .copied()
            .unwrap_or(0);
        let id = self.state.units.get(&unit)?;
        self.textures.get(&id.raw())
    }

    /// Records one draw, or queues an error and drops it.
    fn record_draw(
        &self,
        program: ProgramId,
        topology: Topology,
        first: u32,
        count: u32,
    ) -> Option<RecordedDraw> {
        let slot = self.programs.get(&program.raw())?;
        let Some(vertices) = first.checked_add(count) else {
            self.push_error(GpuErrorCode::InvalidValue);
            return None;
        };
        let vertices = vertices as usize;

        let mut vertex_buffers = Vec::with_capacity(slot.linked.interface.attributes.len());
        for a in &slot.linked.interface.attributes {
            let data = if self.state.enabled.contains(&a.location) {
                let Some((components, data)) = self.state.pointers.get(&a.location) else {
                    self.push_error(GpuErrorCode::InvalidOperation);
                    return None;
                };
                let Some(expanded) = expand_attrib(data, *components, a.components, vertices) else {
                    self.push_error(GpuErrorCode::InvalidOperation);
                    return None;
                };
                expanded
            } else {
                constant_attrib(a.components, vertices)
            };

            vertex_buffers.push(self.device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some("veneer attribute buffer"),
                    contents: bytemuck::cast_slice(&data),
                    usage: wgpu::BufferUsages::VERTEX,
                },
            ));
        }

        let resources = &slot.linked.interface.resources;

        let uniforms: Vec<(u32, wgpu::Buffer)> = resources
            .iter()
            .filter_map(|r| match r.kind {
                ResourceKind::UniformBuffer { size } => Some((r.binding, size)),
                _ => None,
            })
            .map(|(binding, size)| {
                let mut bytes = vec![0u8; size as usize];
                if let Some(m) = self.state.matrices.get(&(program.raw(), binding)) {
                    let src = bytemuck::bytes_of(m);
                    let n = src.len().min(bytes.len());
                    bytes[..n].copy_from_slice(&src[..n]);
                }
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("veneer uniform buffer"),
                    contents: &bytes,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                (binding, buffer)
            })
            .collect();

        // Samplers follow the texture of the lowest texture binding.
        let primary = resources
            .iter()
            .find(|r| r.kind == ResourceKind::Texture)
            .and_then(|r| self.texture_for(program, r.binding));

        let mut entries = Vec::with_capacity(resources.len());
        for r in resources {
            let resource = match r.kind {
                ResourceKind::UniformBuffer { .. } => uniforms
                    .iter()
                    .find(|(b, _)| *b == r.binding)
                    .map(|(_, buf)| buf.as_entire_binding()),
                ResourceKind::Texture => self
                    .texture_for(program, r.binding)
                    .map(|t| wgpu::BindingResource::TextureView(&t.view)),
                ResourceKind::Sampler => {
                    primary.map(|t| wgpu::BindingResource::Sampler(&t.sampler))
                }
            };
            let Some(resource) = resource else {
                log::trace!("draw dropped: nothing bound for `{}`", r.name);
                self.push_error(GpuErrorCode::InvalidOperation);
                return None;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: r.binding,
                resource,
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("veneer draw bind group"),
            layout: &slot.bind_group_layout,
            entries: &entries,
        });

        Some(RecordedDraw {
            program,
            topology,
            first,
            count,
            bind_group,
            vertex_buffers,
        })
    }
}

impl GraphicsApi for WgpuApi {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError> {
        check_texture_size(desc.width, desc.height, self.max_texture_size)?;

        let (texture, view) = allocate_texture(&self.device, desc.label, desc.width, desc.height);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: address_mode(desc.wrap_s),
            address_mode_v: address_mode(desc.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(desc.mag_filter),
            min_filter: filter_mode(desc.min_filter),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let id = self.issue();
        self.textures.insert(
            id,
            TextureSlot {
                label: desc.label,
                texture,
                view,
                sampler,
                size: (desc.width, desc.height),
            },
        );
        Ok(TextureId::new(id))
    }

    fn upload_frame(&mut self, texture: TextureId, frame: &Frame) -> Result<(), GpuError> {
        let (width, height) = frame.size();
        check_texture_size(width, height, self.max_texture_size)?;
        let pixels = frame
            .to_packed_rgba()
            .map_err(|e| GpuError::Texture(e.to_string()))?;

        let slot = self
            .textures
            .get_mut(&texture.raw())
            .ok_or(GpuError::UnknownHandle {
                kind: "texture",
                raw: texture.raw(),
            })?;

        if slot.size != (width, height) {
            log::debug!(
                "{} texture reallocated {:?} -> {:?}",
                slot.label,
                slot.size,
                (width, height)
            );
            let (t, v) = allocate_texture(&self.device, slot.label, width, height);
            slot.texture = t;
            slot.view = v;
            slot.size = (width, height);
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &slot.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.remove(&texture.raw()) {
            slot.texture.destroy();
        }
        self.state.units.retain(|_, t| *t != texture);
    }

    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId, GpuError> {
        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("veneer vertex stage"),
            source: wgpu::ShaderSource::Wgsl((&*program.vertex.source).into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("veneer fragment stage"),
            source: wgpu::ShaderSource::Wgsl((&*program.fragment.source).into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = program
            .interface
            .resources
            .iter()
            .map(|r| wgpu::BindGroupLayoutEntry {
                binding: r.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: match r.kind {
                    ResourceKind::UniformBuffer { size } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(size as u64),
                    },
                    ResourceKind::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    ResourceKind::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                },
                count: None,
            })
            .collect();

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("veneer program bgl"),
                entries: &entries,
            });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("veneer program layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let id = self.issue();
        self.programs.insert(
            id,
            ProgramSlot {
                linked: program.clone(),
                vertex,
                fragment,
                bind_group_layout,
                layout,
                pipelines: HashMap::new(),
            },
        );
        Ok(ProgramId::new(id))
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.raw());
        self.state.matrices.retain(|(p, _), _| *p != program.raw());
        self.state.sampler_units.retain(|(p, _), _| *p != program.raw());
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if !viewport.is_valid() {
            self.push_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.viewport = Some(viewport);
    }

    fn clear(&mut self, color: ColorRgba) {
        self.clear = Some(color);
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        match program {
            Some(p) if !self.programs.contains_key(&p.raw()) => {
                self.push_error(GpuErrorCode::InvalidValue)
            }
            other => self.state.program = other,
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if !self.textures.contains_key(&texture.raw()) {
            self.push_error(GpuErrorCode::InvalidOperation);
            return;
        }
        self.state.units.insert(unit, texture);
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        let Some((id, slot)) = self.current_program() else {
            self.push_error(GpuErrorCode::InvalidOperation);
            return;
        };
        let is_texture = matches!(
            slot.linked.interface.resource_at(location.0),
            Some(r) if r.kind == ResourceKind::Texture
        );
        if is_texture {
            self.state.sampler_units.insert((id.raw(), location.0), unit);
        } else {
            self.push_error(GpuErrorCode::InvalidOperation);
        }
    }

    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        let Some((id, slot)) = self.current_program() else {
            self.push_error(GpuErrorCode::InvalidOperation);
            return;
        };
        let fits_mat4 = matches!(
            slot.linked.interface.resource_at(location.0).map(|r| r.kind),
            Some(ResourceKind::UniformBuffer { size }) if size >= 64
        );
        if fits_mat4 {
            self.state.matrices.insert((id.raw(), location.0), *value);
        } else {
            self.push_error(GpuErrorCode::InvalidOperation);
        }
    }

    fn enable_attrib_array(&mut self, location: AttribLocation) {
        if location.0 >= MAX_VERTEX_ATTRIBS {
            self.push_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.state.enabled.insert(location.0);
    }

    fn disable_attrib_array(&mut self, location: AttribLocation) {
        if location.0 >= MAX_VERTEX_ATTRIBS {
            self.push_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.state.enabled.remove(&location.0);
    }

    fn attrib_pointer(&mut self, location: AttribLocation, components: u8, data: &[f32]) {
        if location.0 >= MAX_VERTEX_ATTRIBS || !(1..=4).contains(&components) {
            self.push_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.state
            .pointers
            .insert(location.0, (components, data.to_vec()));
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let Some(program) = self.state.program else {
            self.push_error(GpuErrorCode::InvalidOperation);
            return;
        };
        if count == 0 {
            return;
        }

        self.ensure_pipeline(program, topology);
        if let Some(draw) = self.record_draw(program, topology, first, count) {
            self.draws.push(draw);
        }
    }

    fn get_error(&mut self) -> Option<GpuErrorCode> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

fn allocate_texture(
    device: &wgpu::Device,
    label: &'static str,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STREAM_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn check_texture_size(width: u32, height: u32, max: u32) -> Result<(), GpuError> {
    if width == 0 || height == 0 || width > max || height > max {
        return Err(GpuError::Texture(format!(
            "{width}x{height} outside supported range 1..={max}"
        )));
    }
    Ok(())
}

fn float_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn primitive_topology(t: Topology) -> wgpu::PrimitiveTopology {
    match t {
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
    }
}

fn filter_mode(f: FilterMode) -> wgpu::FilterMode {
    match f {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(w: WrapMode) -> wgpu::AddressMode {
    match w {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Repacks `vertices` client-side vertices from `supplied` to `declared`
/// components, filling missing ones from `(0, 0, 0, 1)`.
///
/// Returns `None` when `data` is too short.
fn expand_attrib(data: &[f32], supplied: u8, declared: u8, vertices: usize) -> Option<Vec<f32>> {
    let supplied = supplied as usize;
    let declared = declared as usize;
    if data.len() < supplied * vertices {
        return None;
    }

    let mut out = Vec::with_capacity(declared * vertices);
    for v in data.chunks_exact(supplied).take(vertices) {
        for c in 0..declared {
            out.push(v.get(c).copied().unwrap_or(ATTRIB_DEFAULT[c]));
        }
    }
    Some(out)
}

fn constant_attrib(declared: u8, vertices: usize) -> Vec<f32> {
    let one = &ATTRIB_DEFAULT[..declared as usize];
    one.iter().copied().cycle().take(one.len() * vertices).collect()
}

/// Viewport limited to the target; `None` if nothing remains.
fn clamp_viewport(vp: Viewport, target: Viewport) -> Option<Viewport> {
    let clamped = Viewport::new(vp.width.min(target.width), vp.height.min(target.height));
    clamped.is_valid().then_some(clamped)
}
