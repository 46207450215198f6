use std::io::{self, Read};

/// Reads LSB-first variable-width codes from a byte stream.
pub struct BitReader<R> {
    input: R,
    bit_buffer: u32,
    bits_in_buffer: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Reads the next `n`-bit code (`n <= 16`).
    pub fn read_bits(&mut self, n: u8) -> io::Result<u16> {
        debug_assert!(n <= 16, "codes are at most 16 bits wide");

        while self.bits_in_buffer < n {
            let mut byte = [0u8; 1];
            if self.input.read(&mut byte)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "end of image data while reading a code",
                ));
            }

            self.bit_buffer |= u32::from(byte[0]) << self.bits_in_buffer;
            self.bits_in_buffer += 8;
        }

        let code = (self.bit_buffer & ((1 << n) - 1)) as u16;
        self.bit_buffer >>= n;
        self.bits_in_buffer -= n;

        Ok(code)
    }

    /// Returns the underlying reader. Buffered bits are discarded.
    pub fn into_inner(self) -> R {
        self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_cross_byte_boundaries() {
        let mut reader = BitReader::new(&[0b0101_1011u8, 0b0000_0001][..]);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1011);
        assert_eq!(reader.read_bits(5).unwrap(), 0b1_0101);
        assert_eq!(
            reader.read_bits(8).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
