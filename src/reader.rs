use std::io::{self, Read};

/// Presents a chain of length-prefixed data sub-blocks as one byte stream.
///
/// Must be positioned on the first size byte. Reading stops at the zero
/// length terminator.
pub struct SubBlockReader<'a, R> {
    reader: &'a mut R,
    remaining_in_block: usize,
    finished: bool,
}

impl<'a, R: Read> SubBlockReader<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            remaining_in_block: 0,
            finished: false,
        }
    }

    /// Consumes everything up to and including the terminator, returning
    /// the number of data bytes skipped.
    pub fn drain(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        let mut scratch = [0u8; 255];
        loop {
            match self.read(&mut scratch)? {
                0 => return Ok(skipped),
                n => skipped += n,
            }
        }
    }
}

impl<R: Read> Read for SubBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        if self.remaining_in_block == 0 {
            let mut size_byte = [0u8; 1];
            if self.reader.read(&mut size_byte)? == 0 {
                // Missing terminator at EOF is tolerated.
                self.finished = true;
                return Ok(0);
            }

            if size_byte[0] == 0 {
                self.finished = true;
                return Ok(0);
            }
            self.remaining_in_block = size_byte[0] as usize;
        }

        let max_read = buf.len().min(self.remaining_in_block);
        let read_amount = self.reader.read(&mut buf[..max_read])?;
        if read_amount == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream truncated inside a data sub-block",
            ));
        }

        self.remaining_in_block -= read_amount;
        Ok(read_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_sub_blocks() {
        let mut input = &[2u8, b'a', b'b', 1, b'c', 0, 0xFF][..];
        let mut joined = Vec::new();
        SubBlockReader::new(&mut input).read_to_end(&mut joined).unwrap();
        assert_eq!(joined, b"abc");
        // The byte after the terminator is left alone.
        assert_eq!(input, &[0xFF]);
    }

    #[test]
    fn drain_counts_skipped_bytes() {
        let mut input = &[3u8, 1, 2, 3, 2, 4, 5, 0][..];
        let mut blocks = SubBlockReader::new(&mut input);
        let mut first = [0u8; 1];
        blocks.read_exact(&mut first).unwrap();
        assert_eq!(blocks.drain().unwrap(), 4);
        assert!(input.is_empty());
    }

    #[test]
    fn truncated_sub_block_is_an_error() {
        let mut input = &[4u8, 1, 2][..];
        let mut joined = Vec::new();
        let err = SubBlockReader::new(&mut input)
            .read_to_end(&mut joined)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
