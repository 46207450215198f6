use std::io;

use thiserror::Error;

/// Errors produced while decoding blocks or compositing frames.
///
/// Every variant is fatal for the decode session. Frames flushed before the
/// error stay valid.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("not a GIF stream (bad signature)")]
    InvalidSignature,

    #[error("malformed stream: {0}")]
    Format(String),

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// Neither a local nor a global color table is available.
    #[error("frame {frame} has no local or global color table")]
    MissingColorTable { frame: usize },

    #[error("color index {index} out of range for table of {len} entries")]
    IndexOutOfRange { index: u8, len: usize },

    /// The rectangle does not fit the logical screen, or the pixel buffer
    /// does not match it.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("image of {pixels} pixels exceeds the limit of {limit}")]
    LimitExceeded { pixels: usize, limit: usize },

    #[error("block received before the logical screen header")]
    MissingHeader,

    #[error("logical screen header received twice")]
    DuplicateHeader,

    #[error("block received after end of stream")]
    StreamFinished,

    #[error("block source ended without an end-of-stream marker")]
    UnexpectedEnd,
}

pub type DecodingResult<T> = Result<T, DecodingError>;
