use std::time::Duration;

use image::{Delay, RgbaImage};

/// One fully composited frame, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositedFrame {
    index: usize,
    delay: Duration,
    pixels: RgbaImage,
}

impl CompositedFrame {
    pub(crate) fn new(index: usize, delay: Duration, pixels: RgbaImage) -> Self {
        Self {
            index,
            delay,
            pixels,
        }
    }

    /// Position in the animation, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// How long the frame stays on screen.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Screen-sized RGBA pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

impl From<CompositedFrame> for image::Frame {
    fn from(frame: CompositedFrame) -> Self {
        let delay = Delay::from_saturating_duration(frame.delay);
        image::Frame::from_parts(frame.pixels, 0, 0, delay)
    }
}
