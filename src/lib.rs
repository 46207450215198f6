//! Frame compositing for animated GIFs.
//!
//! A GIF animation is stored as a series of small indexed patches, each with
//! a disposal method saying how its area is cleaned up before the next patch
//! is drawn. This crate replays those patches onto a persistent RGBA surface
//! and hands back one complete, screen-sized frame per animation step.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = BufReader::new(File::open("spinner.gif")?);
//! let animation = gif_compositor::decode_animation(file)?;
//! for frame in &animation.frames {
//!     println!("frame {} shows for {:?}", frame.index(), frame.delay());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Lower-level entry points: [`FrameCompositor::feed`] consumes [`Block`]s
//! one at a time, and [`Sequencer`] adds iteration, observers and
//! cancellation on top.

pub mod animator;
pub mod decoder;
pub mod disposal;
pub mod error;
pub mod frame;
pub mod render;
pub mod sequencer;
pub mod structs;
pub mod surface;

mod bitreader;
mod lzw;
mod reader;

pub use animator::FrameCompositor;
pub use decoder::{DecodeOptions, Decoder};
pub use error::{DecodingError, DecodingResult};
pub use frame::CompositedFrame;
pub use sequencer::{
    decode_animation, Animation, CancelHandle, Event, Finish, FrameObserver, PartialDecode,
    Sequencer,
};
pub use structs::{
    Block, Color, ColorTable, DisposalMethod, GraphicControl, ImageBlock, LogicalScreenHeader,
    Rect,
};
