//! The accumulation surface: what is currently on screen.

use image::RgbaImage;

use crate::{
    error::DecodingResult,
    render::{self, TRANSPARENT},
    structs::{ColorTable, ImageBlock, Rect},
};

/// Full-screen RGBA raster carried from one frame to the next.
///
/// Starts fully transparent. Only the owning compositor writes to it.
#[derive(Debug, Clone)]
pub struct AccumulationSurface {
    canvas: RgbaImage,
}

impl AccumulationSurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(u32::from(width), u32::from(height), TRANSPARENT),
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Full copy of the current content.
    pub fn snapshot(&self) -> RgbaImage {
        self.canvas.clone()
    }

    /// Replaces the whole surface with `pixels`.
    pub fn restore(&mut self, pixels: &RgbaImage) {
        debug_assert_eq!(self.canvas.dimensions(), pixels.dimensions());
        self.canvas.clone_from(pixels);
    }

    /// Sets every pixel inside `rect` to fully transparent.
    pub fn clear_rect(&mut self, rect: Rect) {
        let (width, height) = self.canvas.dimensions();
        let right = rect.right().min(width);
        let bottom = rect.bottom().min(height);

        for y in u32::from(rect.top)..bottom {
            for x in u32::from(rect.left)..right {
                self.canvas.put_pixel(x, y, TRANSPARENT);
            }
        }
    }

    pub fn blit(
        &mut self,
        image: &ImageBlock,
        table: &ColorTable,
        transparent_index: Option<u8>,
    ) -> DecodingResult<()> {
        render::map_indices_to_rgba(image, table, transparent_index, &mut self.canvas)
    }
}
