//! Builds small GIF byte streams for tests.
//!
//! Image data is LZW-encoded without compression: a clear code is emitted
//! before every pair of literals so the code width never grows.

#![allow(dead_code)]

pub type Rgb = [u8; 3];

pub struct GifBuilder {
    bytes: Vec<u8>,
    min_code_size: u8,
}

impl GifBuilder {
    /// `global` must hold a power-of-two number of entries (2..=256).
    pub fn new(width: u16, height: u16, global: Option<&[Rgb]>) -> Self {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());

        let min_code_size = match global {
            Some(table) => {
                bytes.push(0b1000_0000 | size_bits(table.len()));
                bytes.extend_from_slice(&[0, 0]);
                bytes.extend(table.iter().flatten());
                min_code_size_for(table.len())
            }
            None => {
                bytes.extend_from_slice(&[0, 0, 0]);
                2
            }
        };

        Self {
            bytes,
            min_code_size,
        }
    }

    pub fn control(mut self, disposal: u8, transparent: Option<u8>, delay_cs: u16) -> Self {
        let packed = (disposal & 0b0111) << 2 | u8::from(transparent.is_some());
        self.bytes.extend_from_slice(&[0x21, 0xF9, 0x04, packed]);
        self.bytes.extend_from_slice(&delay_cs.to_le_bytes());
        self.bytes.push(transparent.unwrap_or(0));
        self.bytes.push(0);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xFE]);
        self.bytes.extend(sub_blocks(text.as_bytes()));
        self
    }

    /// `pixels` are row-major; they are stored in pass order when
    /// `interlaced` is set.
    pub fn image(
        mut self,
        (left, top, width, height): (u16, u16, u16, u16),
        local: Option<&[Rgb]>,
        interlaced: bool,
        pixels: &[u8],
    ) -> Self {
        assert_eq!(pixels.len(), width as usize * height as usize);

        self.bytes.push(0x2C);
        for value in [left, top, width, height] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }

        let mut packed = 0;
        if interlaced {
            packed |= 0b0100_0000;
        }
        let min_code_size = match local {
            Some(table) => {
                packed |= 0b1000_0000 | size_bits(table.len());
                min_code_size_for(table.len())
            }
            None => self.min_code_size,
        };
        self.bytes.push(packed);
        if let Some(table) = local {
            self.bytes.extend(table.iter().flatten());
        }

        let stored = if interlaced {
            interlace(pixels, width as usize, height as usize)
        } else {
            pixels.to_vec()
        };

        self.bytes.push(min_code_size);
        self.bytes.extend(sub_blocks(&lzw_literal(min_code_size, &stored)));
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x3B);
        self.bytes
    }

    pub fn finish_without_trailer(self) -> Vec<u8> {
        self.bytes
    }
}

fn size_bits(len: usize) -> u8 {
    assert!(len.is_power_of_two() && (2..=256).contains(&len));
    (len.trailing_zeros() - 1) as u8
}

fn min_code_size_for(len: usize) -> u8 {
    (len.trailing_zeros() as u8).max(2)
}

pub fn lzw_literal(min_code_size: u8, pixels: &[u8]) -> Vec<u8> {
    let clear = 1u32 << min_code_size;
    let width = u32::from(min_code_size) + 1;

    let mut codes = Vec::new();
    for pair in pixels.chunks(2) {
        codes.push(clear);
        codes.extend(pair.iter().map(|&p| u32::from(p)));
    }
    codes.push(clear + 1);

    let mut out = Vec::new();
    let (mut acc, mut bits) = (0u32, 0u32);
    for code in codes {
        acc |= code << bits;
        bits += width;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push(acc as u8);
    }
    out
}

fn sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

fn interlace(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len());
    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        for y in (start..height).step_by(step) {
            out.extend_from_slice(&pixels[y * width..(y + 1) * width]);
        }
    }
    out
}
