//! Foreground quad storage shared between the render thread and coordinate producers.

mod store;

pub use store::{BufferingMode, GeometryRead, GeometryStore, UpdatePhase};
