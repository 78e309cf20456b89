use crate::coords::Mat4;

/// Per-pass rotation angles and the matrices derived from them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformState {
    pub background_angle: f32,
    pub foreground_angle: f32,
    pub background_mvp: Mat4,
    pub foreground_mvp: Mat4,
}

impl TransformState {
    pub fn new(background_angle: f32, foreground_angle: f32) -> Self {
        let mut s = Self {
            background_angle,
            foreground_angle,
            background_mvp: Mat4::IDENTITY,
            foreground_mvp: Mat4::IDENTITY,
        };
        s.recompute(background_angle, foreground_angle);
        s
    }

    /// MVP = identity (projection/view) x rotation about Z.
    pub fn recompute(&mut self, background_angle: f32, foreground_angle: f32) {
        self.background_angle = background_angle;
        self.foreground_angle = foreground_angle;
        self.background_mvp = Mat4::IDENTITY * Mat4::rotation_z_degrees(background_angle);
        self.foreground_mvp = Mat4::IDENTITY * Mat4::rotation_z_degrees(foreground_angle);
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
