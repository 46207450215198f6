//! Drives a block source through the compositor and reports the results.
//!
//! A [`Sequencer`] can be consumed three ways, all backed by the same
//! compositor state:
//!
//! * as an [`Iterator`] of [`Event`]s,
//! * pushed into a [`FrameObserver`] with [`Sequencer::run`],
//! * in one go with [`Sequencer::decode_all`].
//!
//! Cancellation goes through a [`CancelHandle`] and is checked between
//! blocks. Frames already handed out stay valid.

use std::io::Read;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use thiserror::Error;

use crate::animator::FrameCompositor;
use crate::decoder::{DecodeOptions, Decoder};
use crate::error::{DecodingError, DecodingResult};
use crate::frame::CompositedFrame;
use crate::structs::Block;

/// Shared flag used to stop a running decode.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A notification produced while sequencing.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Header { width: u16, height: u16 },
    Frame(CompositedFrame),
    Complete,
    Cancelled,
}

/// How a decode session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Complete,
    Cancelled,
}

/// Receives sequencing notifications in order.
///
/// `on_header` comes first, then `on_frame` in index order, then exactly
/// one of `on_complete` or `on_cancelled`. Neither is called when the
/// session fails; the error is returned by [`Sequencer::run`] instead.
///
/// Returning `ControlFlow::Break` stops the run as if it had been
/// cancelled.
pub trait FrameObserver {
    fn on_header(&mut self, _width: u16, _height: u16) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_frame(&mut self, frame: CompositedFrame) -> ControlFlow<()>;

    fn on_complete(&mut self) {}

    fn on_cancelled(&mut self) {}
}

/// Forwards every notification as an [`Event`]. The run stops once the
/// receiver is dropped.
impl FrameObserver for Sender<Event> {
    fn on_header(&mut self, width: u16, height: u16) -> ControlFlow<()> {
        forward(self, Event::Header { width, height })
    }

    fn on_frame(&mut self, frame: CompositedFrame) -> ControlFlow<()> {
        forward(self, Event::Frame(frame))
    }

    fn on_complete(&mut self) {
        let _ = self.send(Event::Complete);
    }

    fn on_cancelled(&mut self) {
        let _ = self.send(Event::Cancelled);
    }
}

fn forward(sender: &Sender<Event>, event: Event) -> ControlFlow<()> {
    match sender.send(event) {
        Ok(()) => ControlFlow::Continue(()),
        Err(_) => {
            log::debug!("event receiver disconnected");
            ControlFlow::Break(())
        }
    }
}

/// Every frame of a decode session.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub width: u16,
    pub height: u16,
    pub frames: Vec<CompositedFrame>,
    pub finish: Finish,
}

/// A failed session, with the frames flushed before the failure.
#[derive(Debug, Error)]
#[error("decoding stopped after {} frames: {error}", .frames.len())]
pub struct PartialDecode {
    pub frames: Vec<CompositedFrame>,
    #[source]
    pub error: DecodingError,
}

impl From<DecodingError> for PartialDecode {
    fn from(error: DecodingError) -> Self {
        Self {
            frames: Vec::new(),
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// End of stream reached; `Complete` not reported yet.
    Completing,
    Done,
}

pub struct Sequencer<I> {
    blocks: I,
    compositor: Option<FrameCompositor>,
    cancel: CancelHandle,
    phase: Phase,
    emitted: usize,
}

impl<R: Read> Sequencer<Decoder<R>> {
    /// Sequences a GIF byte stream with default decoder options.
    pub fn from_reader(reader: R) -> DecodingResult<Self> {
        Ok(Self::new(Decoder::new(reader)?))
    }

    pub fn from_reader_with_options(reader: R, options: DecodeOptions) -> DecodingResult<Self> {
        Ok(Self::new(options.read_blocks(reader)?))
    }
}

impl<I> Sequencer<I>
where
    I: Iterator<Item = DecodingResult<Block>>,
{
    pub fn new<B>(blocks: B) -> Self
    where
        B: IntoIterator<IntoIter = I>,
    {
        Self {
            blocks: blocks.into_iter(),
            compositor: Some(FrameCompositor::new()),
            cancel: CancelHandle::new(),
            phase: Phase::Running,
            emitted: 0,
        }
    }

    /// Uses `cancel` instead of the sequencer's own handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs to the end and returns every frame.
    ///
    /// On failure the frames flushed so far are returned inside the error.
    pub fn decode_all(self) -> Result<Animation, PartialDecode> {
        let (mut width, mut height) = (0, 0);
        let mut frames = Vec::new();

        for event in self {
            let finish = match event {
                Ok(Event::Header { width: w, height: h }) => {
                    (width, height) = (w, h);
                    continue;
                }
                Ok(Event::Frame(frame)) => {
                    frames.push(frame);
                    continue;
                }
                Ok(Event::Complete) => Finish::Complete,
                Ok(Event::Cancelled) => Finish::Cancelled,
                Err(error) => return Err(PartialDecode { frames, error }),
            };
            return Ok(Animation {
                width,
                height,
                frames,
                finish,
            });
        }

        Err(PartialDecode {
            frames,
            error: DecodingError::UnexpectedEnd,
        })
    }

    /// Runs to the end, pushing every notification into `observer`.
    pub fn run<O: FrameObserver + ?Sized>(mut self, observer: &mut O) -> DecodingResult<Finish> {
        while let Some(event) = self.next() {
            let flow = match event? {
                Event::Header { width, height } => observer.on_header(width, height),
                Event::Frame(frame) => observer.on_frame(frame),
                Event::Complete => {
                    observer.on_complete();
                    return Ok(Finish::Complete);
                }
                Event::Cancelled => {
                    observer.on_cancelled();
                    return Ok(Finish::Cancelled);
                }
            };

            if flow.is_break() {
                self.abort();
                observer.on_cancelled();
                return Ok(Finish::Cancelled);
            }
        }
        Err(DecodingError::UnexpectedEnd)
    }

    fn step(&mut self, block: Block) -> DecodingResult<Option<Event>> {
        let Some(compositor) = self.compositor.as_mut() else {
            return Err(DecodingError::StreamFinished);
        };

        let header = match &block {
            Block::Header(header) => Some((header.width, header.height)),
            _ => None,
        };
        let is_end = matches!(block, Block::End);

        let frame = compositor.feed(block)?;
        if is_end {
            self.phase = Phase::Completing;
            self.compositor = None;
        }

        if let Some(frame) = frame {
            self.emitted += 1;
            return Ok(Some(Event::Frame(frame)));
        }
        Ok(header.map(|(width, height)| Event::Header { width, height }))
    }

    fn abort(&mut self) -> Event {
        log::info!("decode cancelled after {} frames", self.emitted);
        self.phase = Phase::Done;
        self.compositor = None;
        Event::Cancelled
    }

    fn fail(&mut self, error: DecodingError) -> DecodingError {
        log::debug!("decode failed after {} frames: {error}", self.emitted);
        self.phase = Phase::Done;
        self.compositor = None;
        error
    }
}

impl<I> Iterator for Sequencer<I>
where
    I: Iterator<Item = DecodingResult<Block>>,
{
    type Item = DecodingResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Done => return None,
                _ if self.cancel.is_cancelled() => return Some(Ok(self.abort())),
                Phase::Completing => {
                    self.phase = Phase::Done;
                    return Some(Ok(Event::Complete));
                }
                Phase::Running => {}
            }

            let block = match self.blocks.next() {
                Some(Ok(block)) => block,
                Some(Err(e)) => return Some(Err(self.fail(e))),
                None => return Some(Err(self.fail(DecodingError::UnexpectedEnd))),
            };

            match self.step(block) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => return Some(Err(self.fail(e))),
            }
        }
    }
}

/// Decodes a whole GIF stream into composited frames.
pub fn decode_animation<R: Read>(reader: R) -> Result<Animation, PartialDecode> {
    Sequencer::from_reader(reader)?.decode_all()
}
