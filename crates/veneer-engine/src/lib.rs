//! Veneer engine crate.
//!
//! Dual-surface compositing renderer: a streamed background (camera) drawn
//! full-screen and a streamed foreground (video) drawn onto a quad whose
//! corners a tracker thread updates concurrently.
//!
//! The compositor core ([`compositor`], [`surface`], [`shader`], [`geometry`])
//! only talks to a [`gfx::GraphicsApi`]; [`render::WgpuApi`] implements it on
//! wgpu and [`window::Runtime`] drives it from a winit window.

pub mod compositor;
pub mod coords;
pub mod core;
pub mod device;
pub mod geometry;
pub mod gfx;
pub mod logging;
pub mod render;
pub mod shader;
pub mod source;
pub mod surface;
pub mod time;
pub mod window;
