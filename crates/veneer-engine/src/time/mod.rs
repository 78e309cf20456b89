//! Frame timing.
//!
//! One [`FrameClock`] per render loop produces a [`FrameTime`] per presented
//! frame; [`FrameStats`] folds those into a periodic frame-rate log line.

mod frame_clock;
mod stats;

pub use frame_clock::{FrameClock, FrameTime};
pub use stats::FrameStats;
