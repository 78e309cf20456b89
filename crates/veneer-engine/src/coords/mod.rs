//! Coordinate and transform types shared by the compositor and its backends.
//!
//! Canonical vertex space is normalized device coordinates:
//! - +X right, +Y up, both axes in [-1, 1]
//! - z is carried but ignored by the 2D compositing passes
//!
//! Quads are stored in triangle-strip order: top-left, top-right, bottom-left,
//! bottom-right.

mod color;
mod mat4;
mod quad;
mod viewport;

pub use color::ColorRgba;
pub use mat4::Mat4;
pub use quad::{GeometryError, Quad, FULL_SCREEN_TEX_COORDS, QUAD_FLOATS, QUAD_VERTICES};
pub use viewport::Viewport;
