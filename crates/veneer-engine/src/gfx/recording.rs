//! GPU-less [`GraphicsApi`] that replays GL state rules and records draws.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::coords::{ColorRgba, Mat4, Viewport};
use crate::shader::LinkedProgram;
use crate::source::Frame;

use super::{
    AttribLocation, GpuError, GpuErrorCode, GraphicsApi, ProgramId, TextureDesc, TextureId,
    Topology, UniformLocation,
};

/// Snapshot of state consumed by one `draw_arrays`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DrawCall {
    pub program: ProgramId,
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    /// Texture bound to unit 0.
    pub texture: Option<TextureId>,
    pub transform: Option<Mat4>,
    /// Enabled attribute arrays by location.
    pub attribs: BTreeMap<u32, Vec<f32>>,
}

#[derive(Debug)]
pub(crate) struct TextureRecord {
    pub desc: TextureDesc,
    pub uploads: usize,
    pub size: (u32, u32),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingApi {
    next_id: u32,
    textures: HashMap<u32, TextureRecord>,
    programs: HashMap<u32, LinkedProgram>,
    current: Option<ProgramId>,
    units: HashMap<u32, TextureId>,
    transforms: HashMap<(u32, u32), Mat4>,
    enabled: BTreeSet<u32>,
    pointers: HashMap<u32, (u8, Vec<f32>)>,
    errors: VecDeque<GpuErrorCode>,
    draws: Vec<DrawCall>,
    clears: Vec<ColorRgba>,
    viewport: Option<Viewport>,
    fail_uploads: bool,
    fail_programs: bool,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record_error(&mut self, code: GpuErrorCode) {
        self.errors.push_back(code);
    }

    // ── injection ──

    pub fn fail_uploads(&mut self, on: bool) {
        self.fail_uploads = on;
    }

    pub fn fail_program_creation(&mut self, on: bool) {
        self.fail_programs = on;
    }

    pub fn push_error(&mut self, code: GpuErrorCode) {
        self.record_error(code);
    }

    // ── inspection ──

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }

    pub fn clears(&self) -> &[ColorRgba] {
        &self.clears
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn enabled_attrib_arrays(&self) -> usize {
        self.enabled.len()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureRecord> {
        self.textures.get(&id.raw())
    }

    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }
}

impl GraphicsApi for RecordingApi {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError> {
        let id = self.issue();
        self.textures.insert(
            id,
            TextureRecord {
                desc: desc.clone(),
                uploads: 0,
                size: (desc.width, desc.height),
            },
        );
        Ok(TextureId::new(id))
    }

    fn upload_frame(&mut self, texture: TextureId, frame: &Frame) -> Result<(), GpuError> {
        if self.fail_uploads {
            return Err(GpuError::Texture("upload rejected".into()));
        }
        frame.validate().map_err(|e| GpuError::Texture(e.to_string()))?;
        let rec = self.textures.get_mut(&texture.raw()).ok_or(GpuError::UnknownHandle {
            kind: "texture",
            raw: texture.raw(),
        })?;
        rec.uploads += 1;
        rec.size = frame.size();
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture.raw());
        self.units.retain(|_, t| *t != texture);
    }

    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId, GpuError> {
        if self.fail_programs {
            return Err(GpuError::Program("program creation rejected".into()));
        }
        let id = self.issue();
        self.programs.insert(id, program.clone());
        Ok(ProgramId::new(id))
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.raw());
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if !viewport.is_valid() {
            self.record_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.viewport = Some(viewport);
    }

    fn clear(&mut self, color: ColorRgba) {
        self.clears.push(color);
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        match program {
            Some(p) if !self.programs.contains_key(&p.raw()) => {
                self.record_error(GpuErrorCode::InvalidValue)
            }
            other => self.current = other,
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if !self.textures.contains_key(&texture.raw()) {
            self.record_error(GpuErrorCode::InvalidOperation);
            return;
        }
        self.units.insert(unit, texture);
    }

    fn uniform_sampler(&mut self, _location: UniformLocation, _unit: u32) {
        if self.current.is_none() {
            self.record_error(GpuErrorCode::InvalidOperation);
        }
    }

    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        match self.current {
            Some(p) => {
                self.transforms.insert((p.raw(), location.0), *value);
            }
            None => self.record_error(GpuErrorCode::InvalidOperation),
        }
    }

    fn enable_attrib_array(&mut self, location: AttribLocation) {
        self.enabled.insert(location.0);
    }

    fn disable_attrib_array(&mut self, location: AttribLocation) {
        self.enabled.remove(&location.0);
    }

    fn attrib_pointer(&mut self, location: AttribLocation, components: u8, data: &[f32]) {
        if !(1..=4).contains(&components) {
            self.record_error(GpuErrorCode::InvalidValue);
            return;
        }
        self.pointers.insert(location.0, (components, data.to_vec()));
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let Some(program) = self.current else {
            self.record_error(GpuErrorCode::InvalidOperation);
            return;
        };

        let mut attribs = BTreeMap::new();
        for &loc in &self.enabled {
            match self.pointers.get(&loc) {
                Some((components, data))
                    if data.len() >= (first + count) as usize * *components as usize =>
                {
                    attribs.insert(loc, data.clone());
                }
                _ => {
                    self.errors.push_back(GpuErrorCode::InvalidOperation);
                    return;
                }
            }
        }

        let transform = self
            .transforms
            .iter()
            .find(|((p, _), _)| *p == program.raw())
            .map(|(_, m)| *m);

        self.draws.push(DrawCall {
            program,
            topology,
            first,
            count,
            texture: self.units.get(&0).copied(),
            transform,
            attribs,
        });
    }

    fn get_error(&mut self) -> Option<GpuErrorCode> {
        self.errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_without_program_queues_invalid_operation() {
        let mut api = RecordingApi::new();
        api.draw_arrays(Topology::TriangleStrip, 0, 4);
        assert!(api.draws().is_empty());
        assert_eq!(api.get_error(), Some(GpuErrorCode::InvalidOperation));
        assert_eq!(api.get_error(), None);
    }

    #[test]
    fn enabled_array_without_data_fails_the_draw() {
        let mut api = RecordingApi::new();
        let program = api
            .create_program(&crate::shader::compile_and_link(&Default::default()).unwrap())
            .unwrap();
        api.use_program(Some(program));
        assert_eq!(api.current_program(), Some(program));
        api.enable_attrib_array(AttribLocation(0));
        api.draw_arrays(Topology::TriangleStrip, 0, 4);
        assert!(api.draws().is_empty());
        assert_eq!(api.get_error(), Some(GpuErrorCode::InvalidOperation));
    }
}
