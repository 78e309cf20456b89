use std::thread::{self, JoinHandle};
use std::time::Duration;

use veneer_engine::source::{Frame, FrameProducer, SourceError};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Animated diagonal gradient, RGBA.
pub fn camera_frame(width: u32, height: u32, t: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = ((x * 255) / width.max(1)) as u8;
            let g = ((y * 255) / height.max(1)) as u8;
            let b = ((x + y + t * 4) % 256) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    Frame::new_rgba(data, width, height)
}

const BARS: [[u8; 4]; 7] = [
    // BGRA
    [192, 192, 192, 255],
    [0, 192, 192, 255],
    [192, 192, 0, 255],
    [0, 192, 0, 255],
    [192, 0, 192, 255],
    [0, 0, 192, 255],
    [192, 0, 0, 255],
];

/// Color bars scrolling left by `t` pixels, BGRA with a padded stride.
pub fn video_frame(width: u32, height: u32, t: u32) -> Frame {
    let stride = width * 4 + 64;
    let mut data = vec![0u8; (stride * height) as usize];
    let bar_width = (width / BARS.len() as u32).max(1);
    for y in 0..height {
        let row = (y * stride) as usize;
        for x in 0..width {
            let bar = (((x + t) / bar_width) as usize) % BARS.len();
            let at = row + (x * 4) as usize;
            data[at..at + 4].copy_from_slice(&BARS[bar]);
        }
    }
    Frame::new_bgra(data, width, height, stride)
}

/// Feeds `producer` from `generate` at roughly 30 fps until the consumer closes.
pub fn spawn_producer<G>(name: &str, producer: FrameProducer, generate: G) -> std::io::Result<JoinHandle<()>>
where
    G: Fn(u32) -> Frame + Send + 'static,
{
    let label = name.to_string();
    thread::Builder::new().name(label.clone()).spawn(move || {
        let mut t = 0u32;
        loop {
            match producer.submit(generate(t)) {
                Ok(()) => {}
                Err(SourceError::Closed) => {
                    log::info!("{label}: consumer closed after {t} frames");
                    break;
                }
                Err(err) => {
                    log::warn!("{label}: {err}");
                    break;
                }
            }
            t = t.wrapping_add(1);
            thread::sleep(FRAME_INTERVAL);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_engine::source::PixelFormat;

    #[test]
    fn camera_frames_are_valid_rgba() {
        let frame = camera_frame(64, 48, 3);
        assert_eq!(frame.pixel_format, PixelFormat::Rgba8);
        assert_eq!(frame.data.len(), 64 * 48 * 4);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn video_frames_scroll() {
        let a = video_frame(70, 4, 0);
        let b = video_frame(70, 4, 10);
        assert!(a.validate().is_ok());
        assert_eq!(a.stride, 70 * 4 + 64);
        // Bar width is 10; one step moves the next bar into column 0.
        assert_eq!(&a.data[40..44], &b.data[0..4]);
    }

    #[test]
    fn producer_stops_when_consumer_drops() {
        let (producer, source) = veneer_engine::source::frame_slot(None);
        let worker = spawn_producer("test", producer, |t| camera_frame(4, 4, t)).unwrap();
        drop(source);
        worker.join().unwrap();
    }
}
