use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

/// 4x4 float matrix, column-major (element `(row, col)` lives at `m[col * 4 + row]`).
///
/// The layout matches WGSL `mat4x4<f32>` so the matrix can be uploaded to a
/// uniform buffer as-is.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Mat4 {
    pub m: [f32; 16],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[inline]
    pub const fn as_array(&self) -> &[f32; 16] {
        &self.m
    }

    /// Rotation about the +Z axis (the surface plane), counter-clockwise for positive angles.
    ///
    /// The angle is reduced modulo 360 before conversion so whole turns land on
    /// the identity instead of accumulating `sin(2π)` noise.
    pub fn rotation_z_degrees(degrees: f32) -> Self {
        if !degrees.is_finite() {
            log::debug!("non-finite rotation angle {degrees}; using identity");
            return Self::IDENTITY;
        }

        let radians = degrees.rem_euclid(360.0).to_radians();
        let (s, c) = radians.sin_cos();

        let mut out = Self::IDENTITY;
        out.m[0] = c;
        out.m[1] = s;
        out.m[4] = -s;
        out.m[5] = c;
        out
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    /// Transforms a point (w = 1) and drops the resulting w.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = self.get(row, 0) * p[0]
                + self.get(row, 1) * p[1]
                + self.get(row, 2) * p[2]
                + self.get(row, 3);
        }
        out
    }

    pub fn approx_eq(&self, other: &Mat4, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.get(row, k) * rhs.get(k, col)).sum();
            }
        }
        Mat4 { m: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= EPS)
    }

    #[test]
    fn zero_degrees_is_identity() {
        assert!(Mat4::rotation_z_degrees(0.0).approx_eq(&Mat4::IDENTITY, EPS));
    }

    #[test]
    fn full_turn_is_identity() {
        assert!(Mat4::rotation_z_degrees(360.0).approx_eq(&Mat4::IDENTITY, EPS));
        assert!(Mat4::rotation_z_degrees(-720.0).approx_eq(&Mat4::IDENTITY, EPS));
    }

    #[test]
    fn quarter_turn_maps_x_to_y() {
        let r = Mat4::rotation_z_degrees(90.0);
        assert!(close(r.transform_point([1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]));
        assert!(close(r.transform_point([0.0, 1.0, 0.0]), [-1.0, 0.0, 0.0]));
    }

    #[test]
    fn rotation_keeps_z() {
        let r = Mat4::rotation_z_degrees(270.0);
        assert!(close(r.transform_point([0.0, 0.0, 0.5]), [0.0, 0.0, 0.5]));
    }

    #[test]
    fn identity_is_neutral_for_mul() {
        let r = Mat4::rotation_z_degrees(33.0);
        assert!((Mat4::IDENTITY * r).approx_eq(&r, EPS));
        assert!((r * Mat4::IDENTITY).approx_eq(&r, EPS));
    }

    #[test]
    fn rotations_compose() {
        let a = Mat4::rotation_z_degrees(90.0) * Mat4::rotation_z_degrees(180.0);
        assert!(a.approx_eq(&Mat4::rotation_z_degrees(270.0), EPS));
    }

    #[test]
    fn non_finite_angle_falls_back_to_identity() {
        assert_eq!(Mat4::rotation_z_degrees(f32::NAN), Mat4::IDENTITY);
    }
}
