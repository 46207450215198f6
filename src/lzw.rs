use std::io::{self, Read};

use crate::bitreader::BitReader;

const MAX_CODES: usize = 4096;
const MAX_CODE_SIZE: u8 = 12;
const NO_CODE: u16 = 0xFFFF;

/// Variable-width LZW decompressor for GIF image data.
pub struct LzwDecoder<R> {
    reader: BitReader<R>,

    min_code_size: u8,
    clear_code: u16,
    end_code: u16,

    code_size: u8,
    next_code: u16,
    prev_code: u16,
    first_index: u8,
    finished: bool,

    prefix: [u16; MAX_CODES],
    suffix: [u8; MAX_CODES],

    // Indices of one decoded string, last one on top.
    stack: [u8; MAX_CODES + 1],
    stack_top: usize,
}

impl<R: Read> LzwDecoder<R> {
    /// `min_code_size` must be in `1..=8`.
    pub fn new(reader: R, min_code_size: u8) -> Self {
        debug_assert!((1..=8).contains(&min_code_size));
        let clear_code = 1 << min_code_size;

        let mut decoder = Self {
            reader: BitReader::new(reader),
            min_code_size,
            clear_code,
            end_code: clear_code + 1,
            code_size: min_code_size + 1,
            next_code: clear_code + 2,
            prev_code: NO_CODE,
            first_index: 0,
            finished: false,
            prefix: [NO_CODE; MAX_CODES],
            suffix: [0; MAX_CODES],
            stack: [0; MAX_CODES + 1],
            stack_top: 0,
        };
        decoder.reset();
        decoder
    }

    fn reset(&mut self) {
        self.code_size = self.min_code_size + 1;
        self.next_code = self.end_code + 1;
        self.prev_code = NO_CODE;

        for code in 0..self.clear_code {
            self.prefix[code as usize] = NO_CODE;
            self.suffix[code as usize] = code as u8;
        }
    }

    fn push(&mut self, index: u8) -> io::Result<()> {
        if self.stack_top >= self.stack.len() {
            return Err(invalid("LZW string longer than the code table"));
        }
        self.stack[self.stack_top] = index;
        self.stack_top += 1;
        Ok(())
    }

    /// Fills `buf` with decoded indices and returns how many were written.
    ///
    /// Fewer than `buf.len()` means the data ended early, either at the end
    /// code or because the input ran out.
    pub fn decode_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;

        while written < buf.len() {
            while self.stack_top > 0 && written < buf.len() {
                self.stack_top -= 1;
                buf[written] = self.stack[self.stack_top];
                written += 1;
            }
            if written == buf.len() || self.finished {
                break;
            }

            let code = match self.reader.read_bits(self.code_size) {
                Ok(code) => code,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.finished = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            if code == self.clear_code {
                self.reset();
                continue;
            }
            if code == self.end_code {
                self.finished = true;
                break;
            }

            let mut current = code;
            if code >= self.next_code {
                // KwKwK: the code being defined right now.
                if code != self.next_code || self.prev_code == NO_CODE {
                    return Err(invalid("invalid LZW code"));
                }
                self.push(self.first_index)?;
                current = self.prev_code;
            }

            while current >= self.clear_code {
                self.push(self.suffix[current as usize])?;
                current = self.prefix[current as usize];
            }
            self.first_index = self.suffix[current as usize];
            self.push(self.first_index)?;

            if self.prev_code != NO_CODE && (self.next_code as usize) < MAX_CODES {
                self.prefix[self.next_code as usize] = self.prev_code;
                self.suffix[self.next_code as usize] = self.first_index;
                self.next_code += 1;

                if self.next_code >= (1 << self.code_size) && self.code_size < MAX_CODE_SIZE {
                    self.code_size += 1;
                }
            }

            self.prev_code = code;
        }

        Ok(written)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

fn invalid(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
