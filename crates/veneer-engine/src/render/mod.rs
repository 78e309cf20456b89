//! wgpu rendering backend.
//!
//! [`WgpuApi`] implements the immediate-mode [`crate::gfx::GraphicsApi`] on top
//! of wgpu: calls made during a frame are validated and recorded, then
//! [`WgpuApi::encode`] replays them into a single render pass.

mod ctx;
mod wgpu_api;

pub use ctx::{RenderCtx, RenderTarget};
pub use wgpu_api::WgpuApi;
