//! Graphics capability layer.
//!
//! The compositor never talks to a GPU library directly. It is handed a
//! [`GraphicsApi`] at construction and issues immediate-mode calls through it
//! (program binding, attribute arrays, texture units, strip draws, error
//! polling). Backends decide how those calls reach the hardware.

mod api;
mod error;

#[cfg(test)]
pub(crate) mod recording;

pub use api::{
    AttribLocation, FilterMode, GraphicsApi, ProgramId, TextureDesc, TextureId, Topology,
    UniformLocation, WrapMode,
};
pub use error::{GpuError, GpuErrorCode};
