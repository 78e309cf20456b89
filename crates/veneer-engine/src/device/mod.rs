//! GPU device + surface management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue, configures the window
//! surface, and hands out one [`GpuFrame`] (surface texture + encoder) per
//! presented frame.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
