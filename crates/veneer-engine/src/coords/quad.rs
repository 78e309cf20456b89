use std::fmt;

/// Vertices per quad (one triangle strip).
pub const QUAD_VERTICES: u32 = 4;

/// Floats per quad: 4 vertices x (x, y, z).
pub const QUAD_FLOATS: usize = 12;

/// Texture coordinates for a strip-ordered quad; texture origin is top-left.
pub const FULL_SCREEN_TEX_COORDS: [f32; 8] = [
    0.0, 0.0, // top left
    1.0, 0.0, // top right
    0.0, 1.0, // bottom left
    1.0, 1.0, // bottom right
];

const FLIPPED_TEX_COORDS: [f32; 8] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0,
];

/// Rejected quad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    InvalidLength { got: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidLength { got } => write!(
                f,
                "quad coordinates must be exactly {QUAD_FLOATS} floats, got {got}"
            ),
        }
    }
}

impl std::error::Error for GeometryError {}

/// A quadrilateral in NDC: 4 vertices x (x, y, z), triangle-strip order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad([f32; QUAD_FLOATS]);

impl Quad {
    pub const FULL_SCREEN: Quad = Quad([
        -1.0, 1.0, 0.0, // top left
        1.0, 1.0, 0.0, // top right
        -1.0, -1.0, 0.0, // bottom left
        1.0, -1.0, 0.0, // bottom right
    ]);

    #[inline]
    pub const fn new(coords: [f32; QUAD_FLOATS]) -> Self {
        Self(coords)
    }

    /// Accepts exactly 12 floats; anything else is rejected.
    pub fn from_slice(coords: &[f32]) -> Result<Self, GeometryError> {
        let arr: [f32; QUAD_FLOATS] = coords
            .try_into()
            .map_err(|_| GeometryError::InvalidLength { got: coords.len() })?;
        Ok(Self(arr))
    }

    /// Builds a quad from tracker corners in normalized image space.
    ///
    /// Input is 4 (x, y) pairs in [0, 1] with the origin at the top-left of the
    /// image and +Y down, listed around the perimeter: top-left, top-right,
    /// bottom-right, bottom-left. Output is strip-ordered NDC with z = 0.
    pub fn from_image_corners(corners: &[f32; 8]) -> Self {
        let ndc = |i: usize| -> [f32; 3] {
            let x = corners[i * 2];
            let y = corners[i * 2 + 1];
            [x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0]
        };

        // perimeter TL, TR, BR, BL -> strip TL, TR, BL, BR
        let order = [0usize, 1, 3, 2];
        let mut out = [0.0f32; QUAD_FLOATS];
        for (slot, &corner) in order.iter().enumerate() {
            out[slot * 3..slot * 3 + 3].copy_from_slice(&ndc(corner));
        }
        Self(out)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn as_array(&self) -> &[f32; QUAD_FLOATS] {
        &self.0
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> [f32; 3] {
        let i = index * 3;
        [self.0[i], self.0[i + 1], self.0[i + 2]]
    }

    /// Texture coordinates matching the strip order, optionally flipped vertically.
    #[inline]
    pub const fn tex_coords(flip_vertically: bool) -> &'static [f32; 8] {
        if flip_vertically {
            &FLIPPED_TEX_COORDS
        } else {
            &FULL_SCREEN_TEX_COORDS
        }
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::FULL_SCREEN
    }
}
