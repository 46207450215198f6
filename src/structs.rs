use std::time::Duration;

use crate::error::{DecodingError, DecodingResult};

/// Raw logical screen descriptor, as laid out in the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub packed_fields: u8,
    pub bg_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

impl LogicalScreenDescriptor {
    pub fn has_global_color_table(&self) -> bool {
        (self.packed_fields & 0b1000_0000) != 0
    }

    pub fn color_resolution(&self) -> u8 {
        ((self.packed_fields & 0b0111_0000) >> 4) + 1
    }

    pub fn sort_flag(&self) -> bool {
        (self.packed_fields & 0b0000_1000) != 0
    }

    pub fn global_color_table_size(&self) -> usize {
        let n = self.packed_fields & 0b0000_0111;
        1 << (n + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Ordered RGB entries, addressed by pixel index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorTable {
    colors: Vec<Color>,
}

impl ColorTable {
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors }
    }

    /// Builds a table from packed `r, g, b` triplets. A trailing partial
    /// triplet is ignored.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Self {
        let colors = bytes
            .chunks_exact(3)
            .map(|c| Color::new(c[0], c[1], c[2]))
            .collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<Color> {
        self.colors.get(index as usize).copied()
    }
}

impl From<Vec<Color>> for ColorTable {
    fn from(colors: Vec<Color>) -> Self {
        Self::new(colors)
    }
}

/// How a frame's area is treated before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    /// No disposal specified; handled like `DoNotDispose`.
    #[default]
    NoAction,
    DoNotDispose,
    /// Clear the frame's rectangle to transparent.
    RestoreBackground,
    /// Restore the surface to the last anchored frame.
    RestorePrevious,
}

impl DisposalMethod {
    /// Whether a frame with this method leaves a well-defined composited
    /// state behind, making it usable as a restore anchor.
    pub fn anchors(self) -> bool {
        !matches!(self, DisposalMethod::RestorePrevious)
    }
}

impl From<u8> for DisposalMethod {
    /// Reserved codes 4-7 are treated as `NoAction`.
    fn from(code: u8) -> Self {
        match code & 0b0111 {
            1 => DisposalMethod::DoNotDispose,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestorePrevious,
            _ => DisposalMethod::NoAction,
        }
    }
}

/// Metadata from a graphic control extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicControl {
    pub disposal_method: DisposalMethod,
    pub transparency_index: Option<u8>,
    pub delay: Duration,
}

impl GraphicControl {
    pub fn new(
        disposal_method: DisposalMethod,
        transparency_index: Option<u8>,
        delay: Duration,
    ) -> Self {
        Self {
            disposal_method,
            transparency_index,
            delay,
        }
    }

    /// Delay as stored in the stream, in hundredths of a second.
    pub fn from_centiseconds(
        disposal_method: DisposalMethod,
        transparency_index: Option<u8>,
        delay_cs: u16,
    ) -> Self {
        Self::new(
            disposal_method,
            transparency_index,
            Duration::from_millis(u64::from(delay_cs) * 10),
        )
    }
}

/// A rectangle in logical screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn right(&self) -> u32 {
        u32::from(self.left) + u32::from(self.width)
    }

    pub fn bottom(&self) -> u32 {
        u32::from(self.top) + u32::from(self.height)
    }

    pub fn fits_within(&self, width: u16, height: u16) -> bool {
        self.right() <= u32::from(width) && self.bottom() <= u32::from(height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalScreenHeader {
    pub width: u16,
    pub height: u16,
    pub global_color_table: Option<ColorTable>,
}

impl LogicalScreenHeader {
    pub fn new(width: u16, height: u16, global_color_table: Option<ColorTable>) -> Self {
        Self {
            width,
            height,
            global_color_table,
        }
    }

    pub(crate) fn validate(&self) -> DecodingResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodingError::InvalidGeometry(format!(
                "logical screen is {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// One image patch: an indexed rectangle placed on the logical screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub local_color_table: Option<ColorTable>,
    /// Row-major color indices, already de-interlaced.
    pub pixels: Vec<u8>,
}

impl ImageBlock {
    pub fn new(rect: Rect, local_color_table: Option<ColorTable>, pixels: Vec<u8>) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
            local_color_table,
            pixels,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }

    /// Checks that the rectangle lies inside the screen and that the pixel
    /// buffer covers it exactly.
    pub(crate) fn validate(&self, screen_width: u16, screen_height: u16) -> DecodingResult<()> {
        let rect = self.rect();
        if !rect.fits_within(screen_width, screen_height) {
            return Err(DecodingError::InvalidGeometry(format!(
                "image {}x{} at ({}, {}) exceeds screen {}x{}",
                rect.width, rect.height, rect.left, rect.top, screen_width, screen_height
            )));
        }
        if self.pixels.len() != rect.area() {
            return Err(DecodingError::InvalidGeometry(format!(
                "image {}x{} carries {} pixels",
                rect.width,
                rect.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// A decoded structural block, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header(LogicalScreenHeader),
    Control(GraphicControl),
    Image(ImageBlock),
    End,
}
