use image::{Rgba, RgbaImage};

use crate::{
    error::{DecodingError, DecodingResult},
    structs::{Color, ColorTable, ImageBlock},
};

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const fn opaque(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

/// Looks up the RGB value of `index` in `table`.
///
/// Out-of-range indices are reported, never clamped.
pub fn resolve(index: u8, table: &ColorTable) -> DecodingResult<Color> {
    table.get(index).ok_or(DecodingError::IndexOutOfRange {
        index,
        len: table.len(),
    })
}

/// Picks the local table when present, else the global one.
pub fn select_table<'a>(
    local: Option<&'a ColorTable>,
    global: Option<&'a ColorTable>,
    frame: usize,
) -> DecodingResult<&'a ColorTable> {
    local
        .or(global)
        .ok_or(DecodingError::MissingColorTable { frame })
}

/// Draws `image` onto `canvas` at its own offset.
///
/// Pixels equal to `transparent_index` are holes and leave the canvas as it
/// is. Every other pixel becomes fully opaque. The rectangle must already be
/// validated against the canvas bounds.
pub fn map_indices_to_rgba(
    image: &ImageBlock,
    table: &ColorTable,
    transparent_index: Option<u8>,
    canvas: &mut RgbaImage,
) -> DecodingResult<()> {
    if image.width == 0 || image.height == 0 {
        return Ok(());
    }

    let left = u32::from(image.left);
    let top = u32::from(image.top);

    for (row, line) in image.pixels.chunks_exact(image.width as usize).enumerate() {
        let y = top + row as u32;
        for (col, &index) in line.iter().enumerate() {
            if transparent_index == Some(index) {
                continue;
            }
            let color = resolve(index, table)?;
            canvas.put_pixel(left + col as u32, y, opaque(color));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Rect;

    fn table() -> ColorTable {
        ColorTable::new(vec![Color::new(0, 0, 0), Color::new(255, 0, 0)])
    }

    #[test]
    fn resolves_in_range() {
        assert_eq!(resolve(1, &table()).unwrap(), Color::new(255, 0, 0));
    }

    #[test]
    fn out_of_range_is_an_error() {
        match resolve(2, &table()) {
            Err(DecodingError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn local_table_wins() {
        let local = ColorTable::new(vec![Color::new(1, 2, 3)]);
        let global = table();
        let chosen = select_table(Some(&local), Some(&global), 0).unwrap();
        assert_eq!(chosen, &local);
        let chosen = select_table(None, Some(&global), 0).unwrap();
        assert_eq!(chosen, &global);
    }

    #[test]
    fn no_table_at_all() {
        assert!(matches!(
            select_table(None, None, 3),
            Err(DecodingError::MissingColorTable { frame: 3 })
        ));
    }

    #[test]
    fn transparent_pixels_are_holes() {
        let mut canvas = RgbaImage::from_pixel(3, 1, Rgba([9, 9, 9, 9]));
        let image = ImageBlock::new(Rect::new(1, 0, 2, 1), None, vec![0, 1]);
        map_indices_to_rgba(&image, &table(), Some(0), &mut canvas).unwrap();

        assert_eq!(*canvas.get_pixel(0, 0), Rgba([9, 9, 9, 9]));
        assert_eq!(*canvas.get_pixel(1, 0), Rgba([9, 9, 9, 9]));
        assert_eq!(*canvas.get_pixel(2, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn empty_image_draws_nothing() {
        let mut canvas = RgbaImage::new(2, 2);
        let image = ImageBlock::new(Rect::new(0, 0, 0, 2), None, Vec::new());
        map_indices_to_rgba(&image, &table(), None, &mut canvas).unwrap();
        assert!(canvas.pixels().all(|p| *p == TRANSPARENT));
    }
}
