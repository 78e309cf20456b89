use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Frame, FrameListener, FrameSource, SourceError};

/// Counters kept by a frame slot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Frames handed to the slot by the producer.
    pub submitted: u64,
    /// Frames replaced by a newer one before the consumer took them.
    pub overwritten: u64,
    /// Frames taken by the consumer.
    pub delivered: u64,
}

struct SlotState {
    latest: Option<Frame>,
    producer_alive: bool,
    consumer_alive: bool,
    listener: Option<FrameListener>,
    stats: SlotStats,
}

struct Shared {
    state: Mutex<SlotState>,
    default_size: Option<(u32, u32)>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a latest-frame-wins mailbox.
///
/// `default_size` is reported to the consumer as the initial texture size.
pub fn frame_slot(default_size: Option<(u32, u32)>) -> (FrameProducer, SlotSource) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SlotState {
            latest: None,
            producer_alive: true,
            consumer_alive: true,
            listener: None,
            stats: SlotStats::default(),
        }),
        default_size,
    });

    (
        FrameProducer {
            shared: Arc::clone(&shared),
        },
        SlotSource { shared },
    )
}

/// Producer half. Dropping it marks the stream as abandoned.
pub struct FrameProducer {
    shared: Arc<Shared>,
}

impl FrameProducer {
    /// Publishes `frame`, replacing any frame the consumer has not taken yet.
    ///
    /// The frame-available listener runs after the slot lock is released.
    pub fn submit(&self, frame: Frame) -> Result<(), SourceError> {
        let listener = {
            let mut state = self.shared.lock();
            if !state.consumer_alive {
                return Err(SourceError::Closed);
            }
            if state.latest.replace(frame).is_some() {
                state.stats.overwritten += 1;
            }
            state.stats.submitted += 1;
            state.listener.clone()
        };

        if let Some(notify) = listener {
            notify();
        }
        Ok(())
    }

    pub fn stats(&self) -> SlotStats {
        self.shared.lock().stats
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        let listener = {
            let mut state = self.shared.lock();
            state.producer_alive = false;
            state.listener.clone()
        };
        // Wake the consumer so it observes the abandoned stream promptly.
        if let Some(notify) = listener {
            notify();
        }
    }
}

/// Consumer half; implements [`FrameSource`].
pub struct SlotSource {
    shared: Arc<Shared>,
}

impl SlotSource {
    pub fn stats(&self) -> SlotStats {
        self.shared.lock().stats
    }
}

impl FrameSource for SlotSource {
    fn set_frame_listener(&mut self, listener: FrameListener) {
        self.shared.lock().listener = Some(listener);
    }

    fn default_buffer_size(&self) -> Option<(u32, u32)> {
        self.shared.default_size
    }

    fn acquire(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut state = self.shared.lock();

        // A frame published before the producer left is still delivered.
        if let Some(frame) = state.latest.take() {
            state.stats.delivered += 1;
            drop(state);
            frame.validate()?;
            return Ok(Some(frame));
        }

        if !state.producer_alive {
            return Err(SourceError::Abandoned);
        }
        Ok(None)
    }
}

impl Drop for SlotSource {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.consumer_alive = false;
        state.listener = None;
        state.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn frame(tag: u8) -> Frame {
        Frame::solid_rgba(2, 2, [tag, 0, 0, 255])
    }

    #[test]
    fn empty_slot_yields_nothing() {
        let (_producer, mut source) = frame_slot(None);
        assert!(source.acquire().unwrap().is_none());
    }

    #[test]
    fn latest_frame_wins() {
        let (producer, mut source) = frame_slot(None);
        producer.submit(frame(1)).unwrap();
        producer.submit(frame(2)).unwrap();

        let got = source.acquire().unwrap().unwrap();
        assert_eq!(got.data[0], 2);
        assert!(source.acquire().unwrap().is_none());

        let stats = source.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.overwritten, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn listener_fires_per_submit() {
        let (producer, mut source) = frame_slot(None);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        source.set_frame_listener(Arc::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));

        producer.submit(frame(1)).unwrap();
        producer.submit(frame(2)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_producer_delivers_pending_then_reports_abandoned() {
        let (producer, mut source) = frame_slot(None);
        producer.submit(frame(7)).unwrap();
        drop(producer);

        assert_eq!(source.acquire().unwrap().unwrap().data[0], 7);
        assert_eq!(source.acquire().unwrap_err(), SourceError::Abandoned);
    }

    #[test]
    fn dropped_consumer_closes_stream() {
        let (producer, source) = frame_slot(None);
        drop(source);
        assert_eq!(producer.submit(frame(1)).unwrap_err(), SourceError::Closed);
    }

    #[test]
    fn malformed_frame_is_reported_on_acquire() {
        let (producer, mut source) = frame_slot(None);
        producer.submit(Frame::new_rgba(vec![0u8; 3], 2, 2)).unwrap();
        assert!(matches!(source.acquire(), Err(SourceError::Malformed(_))));
        // The bad frame is consumed; the stream itself stays usable.
        assert!(source.acquire().unwrap().is_none());
    }

    #[test]
    fn default_size_is_reported() {
        let (_p, source) = frame_slot(Some((640, 480)));
        assert_eq!(source.default_buffer_size(), Some((640, 480)));
    }
}
