//! Block-level GIF decoder.
//!
//! Turns a GIF87a/GIF89a byte stream into the [`Block`] events consumed by
//! the compositor: the header first, then graphic controls and images in
//! stream order, then [`Block::End`]. Extensions other than the graphic
//! control extension are skipped.

use std::io::{self, ErrorKind, Read};

use crate::error::{DecodingError, DecodingResult};
use crate::lzw::LzwDecoder;
use crate::reader::SubBlockReader;
use crate::structs::{
    Block, ColorTable, DisposalMethod, GraphicControl, ImageBlock, LogicalScreenDescriptor,
    LogicalScreenHeader, Rect,
};

const IMAGE_SEPARATOR: u8 = 0x2C;
const EXTENSION_INTRODUCER: u8 = 0x21;
const TRAILER: u8 = 0x3B;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;

/// Row offset and step of each interlace pass.
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

const DEFAULT_MAX_PIXELS: usize = 1 << 25;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    max_pixels: Option<usize>,
    allow_truncated: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_pixels: Some(DEFAULT_MAX_PIXELS),
            allow_truncated: true,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest `width * height` accepted for the screen and for each image.
    /// `None` removes the limit.
    pub fn max_pixels(mut self, max_pixels: Option<usize>) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Whether image data that ends before every pixel is decoded is
    /// accepted. Missing pixels are left at index 0.
    pub fn allow_truncated(mut self, allow_truncated: bool) -> Self {
        self.allow_truncated = allow_truncated;
        self
    }

    /// Reads the signature and logical screen, returning a decoder
    /// positioned on the first block.
    pub fn read_blocks<R: Read>(self, reader: R) -> DecodingResult<Decoder<R>> {
        Decoder::with_options(reader, self)
    }

    fn check_limit(&self, width: u16, height: u16) -> DecodingResult<()> {
        let pixels = width as usize * height as usize;
        match self.max_pixels {
            Some(limit) if pixels > limit => Err(DecodingError::LimitExceeded { pixels, limit }),
            _ => Ok(()),
        }
    }
}

/// Iterator over the [`Block`]s of a GIF stream.
///
/// Yields `Block::Header` first and `Block::End` last. Stops after the
/// first error.
pub struct Decoder<R> {
    reader: R,
    options: DecodeOptions,
    screen_descriptor: LogicalScreenDescriptor,
    header: Option<LogicalScreenHeader>,
    done: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> DecodingResult<Self> {
        DecodeOptions::new().read_blocks(reader)
    }

    fn with_options(mut reader: R, options: DecodeOptions) -> DecodingResult<Self> {
        let mut signature = [0u8; 6];
        reader.read_exact(&mut signature)?;

        match &signature {
            b"GIF89a" | b"GIF87a" => {}
            [b'G', b'I', b'F', version @ ..] => {
                return Err(DecodingError::Unsupported(format!(
                    "GIF version {}",
                    String::from_utf8_lossy(version)
                )));
            }
            _ => return Err(DecodingError::InvalidSignature),
        }

        let mut lsd_buf = [0u8; 7];
        reader.read_exact(&mut lsd_buf)?;

        let screen_descriptor = LogicalScreenDescriptor {
            width: u16::from_le_bytes([lsd_buf[0], lsd_buf[1]]),
            height: u16::from_le_bytes([lsd_buf[2], lsd_buf[3]]),
            packed_fields: lsd_buf[4],
            bg_color_index: lsd_buf[5],
            pixel_aspect_ratio: lsd_buf[6],
        };
        options.check_limit(screen_descriptor.width, screen_descriptor.height)?;

        let global_color_table = if screen_descriptor.has_global_color_table() {
            let size = screen_descriptor.global_color_table_size();
            Some(read_color_table(&mut reader, size)?)
        } else {
            None
        };

        log::debug!(
            "screen {}x{}, {} bits per primary, global table: {} (sorted: {})",
            screen_descriptor.width,
            screen_descriptor.height,
            screen_descriptor.color_resolution(),
            global_color_table.as_ref().map_or(0, ColorTable::len),
            screen_descriptor.sort_flag()
        );

        let header = LogicalScreenHeader::new(
            screen_descriptor.width,
            screen_descriptor.height,
            global_color_table,
        );

        Ok(Self {
            reader,
            options,
            screen_descriptor,
            header: Some(header),
            done: false,
        })
    }

    pub fn screen_descriptor(&self) -> &LogicalScreenDescriptor {
        &self.screen_descriptor
    }

    /// Decodes the next block, or `None` once `Block::End` was returned.
    pub fn next_block(&mut self) -> DecodingResult<Option<Block>> {
        if self.done {
            return Ok(None);
        }
        if let Some(header) = self.header.take() {
            return Ok(Some(Block::Header(header)));
        }

        loop {
            let Some(introducer) = self.read_byte_or_eof()? else {
                log::warn!("stream ended without a trailer");
                self.done = true;
                return Ok(Some(Block::End));
            };

            match introducer {
                IMAGE_SEPARATOR => return self.read_image().map(|image| Some(Block::Image(image))),
                EXTENSION_INTRODUCER => {
                    let label = self.read_byte()?;
                    if label == GRAPHIC_CONTROL_LABEL {
                        let control = self.read_graphic_control()?;
                        return Ok(Some(Block::Control(control)));
                    }
                    let skipped = SubBlockReader::new(&mut self.reader).drain()?;
                    log::debug!("skipped extension 0x{label:02X} ({skipped} bytes)");
                }
                TRAILER => {
                    self.done = true;
                    return Ok(Some(Block::End));
                }
                other => {
                    return Err(DecodingError::Format(format!(
                        "unknown block introducer 0x{other:02X}"
                    )))
                }
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_byte_or_eof(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_u16(&mut self) -> io::Result<u16> {
        let mut bytes = [0u8; 2];
        self.reader.read_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Label already consumed.
    fn read_graphic_control(&mut self) -> DecodingResult<GraphicControl> {
        let mut blocks = SubBlockReader::new(&mut self.reader);
        let mut fields = [0u8; 4];
        blocks.read_exact(&mut fields).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                DecodingError::Format("graphic control extension too short".to_owned())
            }
            _ => e.into(),
        })?;
        let extra = blocks.drain()?;
        if extra > 0 {
            log::warn!("graphic control extension carries {extra} extra bytes");
        }

        let [packed, delay_lo, delay_hi, transparent] = fields;
        let disposal = DisposalMethod::from((packed >> 2) & 0b0111);
        let transparency_index = (packed & 0b0000_0001 != 0).then_some(transparent);
        let delay_cs = u16::from_le_bytes([delay_lo, delay_hi]);

        log::debug!("graphic control: {disposal:?}, transparent {transparency_index:?}, delay {delay_cs}cs");
        Ok(GraphicControl::from_centiseconds(disposal, transparency_index, delay_cs))
    }

    /// Separator already consumed.
    fn read_image(&mut self) -> DecodingResult<ImageBlock> {
        let left = self.read_u16()?;
        let top = self.read_u16()?;
        let width = self.read_u16()?;
        let height = self.read_u16()?;
        let packed = self.read_byte()?;
        self.options.check_limit(width, height)?;

        let has_local_table = packed & 0b1000_0000 != 0;
        let interlaced = packed & 0b0100_0000 != 0;
        let local_color_table = if has_local_table {
            let size = 1 << ((packed & 0b0000_0111) + 1);
            Some(read_color_table(&mut self.reader, size)?)
        } else {
            None
        };

        let min_code_size = self.read_byte()?;
        if !(1..=8).contains(&min_code_size) {
            return Err(DecodingError::Format(format!(
                "invalid LZW minimum code size {min_code_size}"
            )));
        }

        let rect = Rect::new(left, top, width, height);
        let mut pixels = vec![0u8; rect.area()];

        let mut lzw = LzwDecoder::new(SubBlockReader::new(&mut self.reader), min_code_size);
        let decoded = lzw.decode_bytes(&mut pixels).map_err(lzw_error)?;
        if decoded < pixels.len() {
            if !self.options.allow_truncated {
                return Err(DecodingError::Format(format!(
                    "image data ends after {decoded} of {} pixels",
                    pixels.len()
                )));
            }
            log::warn!("image data ends after {decoded} of {} pixels", pixels.len());
        }

        match lzw.into_inner().drain() {
            Ok(0) => {}
            // Usually just the end code, which is left unread once every
            // pixel is decoded.
            Ok(extra) => log::debug!("skipped {extra} trailing bytes of image data"),
            Err(e) if self.options.allow_truncated && e.kind() == ErrorKind::UnexpectedEof => {
                log::warn!("image data truncated: {e}");
            }
            Err(e) => return Err(e.into()),
        }

        if interlaced {
            pixels = deinterlace(&pixels, width as usize, height as usize);
        }

        log::debug!("image {width}x{height} at ({left}, {top}), interlaced: {interlaced}");
        Ok(ImageBlock::new(rect, local_color_table, pixels))
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = DecodingResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_color_table<R: Read>(reader: &mut R, size: usize) -> DecodingResult<ColorTable> {
    let mut buffer = vec![0u8; size * 3];
    reader.read_exact(&mut buffer)?;
    Ok(ColorTable::from_rgb_bytes(&buffer))
}

fn lzw_error(e: io::Error) -> DecodingError {
    match e.kind() {
        ErrorKind::InvalidData => DecodingError::Format(e.to_string()),
        _ => DecodingError::Io(e),
    }
}

/// Reorders rows stored in the four interlace passes into top-to-bottom
/// order.
fn deinterlace(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    if width == 0 || height == 0 {
        return pixels.to_vec();
    }

    let mut out = vec![0u8; pixels.len()];
    let mut rows = pixels.chunks_exact(width);
    for (start, step) in INTERLACE_PASSES {
        for y in (start..height).step_by(step) {
            if let Some(row) = rows.next() {
                out[y * width..(y + 1) * width].copy_from_slice(row);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Color;

    /// 2x2 checkerboard with a black/white global table, no extensions.
    const CHECKERBOARD: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x02, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x02,
        0x03, 0x0c, 0x10, 0x05, 0x00, 0x3b,
    ];

    fn blocks(bytes: &[u8]) -> Vec<Block> {
        Decoder::new(bytes)
            .unwrap()
            .collect::<DecodingResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn decodes_checkerboard() {
        let blocks = blocks(CHECKERBOARD);
        assert_eq!(blocks.len(), 3);

        let Block::Header(header) = &blocks[0] else {
            panic!("expected header, got {:?}", blocks[0]);
        };
        assert_eq!((header.width, header.height), (2, 2));
        let table = header.global_color_table.as_ref().unwrap();
        assert_eq!(table.get(0), Some(Color::new(0, 0, 0)));
        assert_eq!(table.get(1), Some(Color::new(255, 255, 255)));

        let Block::Image(image) = &blocks[1] else {
            panic!("expected image, got {:?}", blocks[1]);
        };
        assert_eq!(image.rect(), Rect::new(0, 0, 2, 2));
        assert_eq!(image.pixels, vec![1, 0, 0, 1]);
        assert!(image.local_color_table.is_none());

        assert_eq!(blocks[2], Block::End);
    }

    #[test]
    fn graphic_control_and_skipped_extensions() {
        let mut bytes = CHECKERBOARD[..19].to_vec();
        // comment extension
        bytes.extend_from_slice(&[0x21, 0xFE, 0x02, b'h', b'i', 0x00]);
        // graphic control: restore-previous, transparent index 1, 25cs
        bytes.extend_from_slice(&[0x21, 0xF9, 0x04, 0b0000_1101, 25, 0, 1, 0x00]);
        bytes.extend_from_slice(&CHECKERBOARD[19..]);

        let blocks = blocks(&bytes);
        assert_eq!(
            blocks[1],
            Block::Control(GraphicControl::from_centiseconds(
                DisposalMethod::RestorePrevious,
                Some(1),
                25
            ))
        );
        assert!(matches!(blocks[2], Block::Image(_)));
        assert_eq!(blocks[3], Block::End);
    }

    #[test]
    fn missing_trailer_still_ends() {
        let bytes = &CHECKERBOARD[..CHECKERBOARD.len() - 1];
        let blocks = blocks(bytes);
        assert_eq!(blocks.last(), Some(&Block::End));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = CHECKERBOARD.to_vec();
        bytes[0] = b'J';
        assert!(matches!(
            Decoder::new(&bytes[..]),
            Err(DecodingError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = CHECKERBOARD.to_vec();
        bytes[3] = b'9';
        bytes[4] = b'0';
        assert!(matches!(
            Decoder::new(&bytes[..]),
            Err(DecodingError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_unknown_introducer() {
        let mut bytes = CHECKERBOARD[..19].to_vec();
        bytes.push(0x99);
        let mut decoder = Decoder::new(&bytes[..]).unwrap();
        assert!(matches!(decoder.next(), Some(Ok(Block::Header(_)))));
        assert!(matches!(decoder.next(), Some(Err(DecodingError::Format(_)))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn screen_over_limit() {
        let options = DecodeOptions::new().max_pixels(Some(3));
        assert!(matches!(
            options.read_blocks(CHECKERBOARD),
            Err(DecodingError::LimitExceeded { pixels: 4, limit: 3 })
        ));
    }

    #[test]
    fn strict_mode_rejects_truncated_data() {
        // Same image declared as 2x3: only 4 of 6 pixels are present.
        let mut bytes = CHECKERBOARD.to_vec();
        bytes[8] = 3;
        bytes[26] = 3;

        let decoded = blocks(&bytes);
        let Block::Image(image) = &decoded[1] else {
            panic!("expected image");
        };
        assert_eq!(image.pixels, vec![1, 0, 0, 1, 0, 0]);

        let mut strict = DecodeOptions::new()
            .allow_truncated(false)
            .read_blocks(&bytes[..])
            .unwrap();
        assert!(matches!(strict.next(), Some(Ok(Block::Header(_)))));
        assert!(matches!(strict.next(), Some(Err(DecodingError::Format(_)))));
    }

    #[test]
    fn deinterlace_restores_row_order() {
        // Rows 0..10 stored in pass order: 0, 8, 4, 2, 6, 1, 3, 5, 7, 9
        let stored = [0u8, 8, 4, 2, 6, 1, 3, 5, 7, 9];
        assert_eq!(
            deinterlace(&stored, 1, 10),
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
        );
    }
}
