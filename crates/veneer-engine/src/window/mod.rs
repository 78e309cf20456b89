//! Window + render-loop driver.
//!
//! Owns the `winit` event loop and one window with its GPU surface, and turns
//! window lifecycle events into [`crate::core::RenderLoop`] callbacks.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
