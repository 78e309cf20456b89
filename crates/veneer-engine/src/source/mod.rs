//! Streaming image sources.
//!
//! A source stands in for a platform streaming texture: some producer (camera,
//! video decoder) delivers decoded frames at its own pace and the render thread
//! pulls the most recent one each draw.
//!
//! - [`FrameSource`] is the consumer-side capability the compositor depends on.
//! - [`frame_slot`] builds a latest-frame-wins mailbox: a [`FrameProducer`] for
//!   the producer thread and a [`SlotSource`] implementing [`FrameSource`].

mod frame;
mod slot;

use std::fmt;
use std::sync::Arc;

pub use frame::{Frame, PixelFormat};
pub use slot::{frame_slot, FrameProducer, SlotSource, SlotStats};

/// Callback raised by a source whenever a new frame may be pending.
///
/// Invoked on the producer's thread; it must be cheap and must not block.
pub type FrameListener = Arc<dyn Fn() + Send + Sync + 'static>;

/// Streaming-source failure observed by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The producer went away; the stream will never deliver again.
    Abandoned,
    /// The consumer went away; further frames are pointless.
    Closed,
    /// A delivered frame is internally inconsistent.
    Malformed(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Abandoned => write!(f, "stream abandoned by its producer"),
            SourceError::Closed => write!(f, "stream closed by its consumer"),
            SourceError::Malformed(msg) => write!(f, "malformed frame: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Consumer side of a streaming image source.
pub trait FrameSource: Send {
    /// Registers the frame-availability callback, replacing any previous one.
    fn set_frame_listener(&mut self, listener: FrameListener);

    /// Size the texture should be allocated with before the first frame arrives.
    fn default_buffer_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Takes the newest undelivered frame.
    ///
    /// `Ok(None)` means nothing new arrived since the last call; the caller keeps
    /// presenting what it already has.
    fn acquire(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn set_frame_listener(&mut self, listener: FrameListener) {
        (**self).set_frame_listener(listener)
    }

    fn default_buffer_size(&self) -> Option<(u32, u32)> {
        (**self).default_buffer_size()
    }

    fn acquire(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).acquire()
    }
}
