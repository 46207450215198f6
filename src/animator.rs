use image::RgbaImage;

use crate::disposal::DisposalState;
use crate::error::{DecodingError, DecodingResult};
use crate::frame::CompositedFrame;
use crate::render;
use crate::structs::{Block, DisposalMethod, GraphicControl, ImageBlock, LogicalScreenHeader, Rect};
use crate::surface::AccumulationSurface;

/// Per-session state that exists once the header has been seen.
#[derive(Debug)]
struct Session {
    header: LogicalScreenHeader,
    surface: AccumulationSurface,
    disposal: DisposalState,

    last_rect: Option<Rect>,

    pending_image: bool,
    next_index: usize,
}

#[derive(Debug)]
enum State {
    AwaitingHeader,
    Running(Box<Session>),
    Finished,
}

/// Turns block events into composited frames.
///
/// Feed blocks in stream order with [`FrameCompositor::feed`]. A frame is
/// returned when a control block or the end of stream closes it. One
/// compositor handles exactly one decode session.
#[derive(Debug)]
pub struct FrameCompositor {
    state: State,
}

impl Default for FrameCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCompositor {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingHeader,
        }
    }

    pub fn header(&self) -> Option<&LogicalScreenHeader> {
        match &self.state {
            State::Running(session) => Some(&session.header),
            _ => None,
        }
    }

    /// Current content of the accumulation surface, if a session is running.
    pub fn surface(&self) -> Option<&RgbaImage> {
        match &self.state {
            State::Running(session) => Some(session.surface.canvas()),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Processes one block and returns the frame it completed, if any.
    ///
    /// Any error ends the session: the frame in progress is dropped and
    /// later blocks are rejected with [`DecodingError::StreamFinished`].
    pub fn feed(&mut self, block: Block) -> DecodingResult<Option<CompositedFrame>> {
        let result = self.apply(block);
        if let Err(e) = &result {
            log::debug!("compositing aborted: {e}");
            self.state = State::Finished;
        }
        result
    }

    fn apply(&mut self, block: Block) -> DecodingResult<Option<CompositedFrame>> {
        let session = match &mut self.state {
            State::Finished => return Err(DecodingError::StreamFinished),
            State::AwaitingHeader => {
                let Block::Header(header) = block else {
                    return Err(DecodingError::MissingHeader);
                };
                header.validate()?;
                log::debug!("logical screen {}x{}", header.width, header.height);
                self.state = State::Running(Box::new(Session::new(header)));
                return Ok(None);
            }
            State::Running(session) => session,
        };

        match block {
            Block::Header(_) => Err(DecodingError::DuplicateHeader),
            Block::Control(control) => {
                let frame = session.flush();
                session.disposal.advance(control);
                Ok(frame)
            }
            Block::Image(image) => {
                session.draw(&image)?;
                Ok(None)
            }
            Block::End => {
                let frame = session.flush();
                self.state = State::Finished;
                Ok(frame)
            }
        }
    }
}

impl Session {
    fn new(header: LogicalScreenHeader) -> Self {
        let surface = AccumulationSurface::new(header.width, header.height);
        Self {
            header,
            surface,
            disposal: DisposalState::new(),
            last_rect: None,
            pending_image: false,
            next_index: 0,
        }
    }

    fn draw(&mut self, image: &ImageBlock) -> DecodingResult<()> {
        image.validate(self.header.width, self.header.height)?;
        let table = render::select_table(
            image.local_color_table.as_ref(),
            self.header.global_color_table.as_ref(),
            self.next_index,
        )?;

        // Disposal runs once per frame boundary, before the first patch of
        // the new frame.
        if !self.pending_image && self.next_index > 0 {
            dispose_previous(
                &mut self.surface,
                &mut self.disposal,
                self.last_rect,
                self.next_index - 1,
            );
        }

        let GraphicControl {
            transparency_index, ..
        } = *self.disposal.pending();
        self.surface.blit(image, table, transparency_index)?;

        self.last_rect = Some(image.rect());
        self.pending_image = true;
        Ok(())
    }

    fn flush(&mut self) -> Option<CompositedFrame> {
        if !self.pending_image {
            return None;
        }

        let index = self.next_index;
        let delay = self.disposal.pending().delay;
        log::trace!("frame {index} composited, delay {delay:?}");

        self.pending_image = false;
        self.next_index += 1;
        Some(CompositedFrame::new(index, delay, self.surface.snapshot()))
    }
}

/// Applies the disposal declared for frame `previous` before the next frame
/// draws. The surface still holds `previous`'s composited output on entry.
fn dispose_previous(
    surface: &mut AccumulationSurface,
    disposal: &mut DisposalState,
    last_rect: Option<Rect>,
    previous: usize,
) {
    let method = disposal.active().disposal_method;
    log::trace!("disposing frame {previous} with {method:?}");

    if method.anchors() {
        disposal.record_anchor(previous, surface.canvas());
    }

    match method {
        DisposalMethod::NoAction | DisposalMethod::DoNotDispose => {}
        DisposalMethod::RestoreBackground => {
            if let Some(rect) = last_rect {
                surface.clear_rect(rect);
            }
        }
        DisposalMethod::RestorePrevious => match disposal.anchor() {
            Some((index, pixels)) => {
                log::trace!("restoring frame {index}");
                surface.restore(pixels);
            }
            None => {
                if let Some(rect) = last_rect {
                    surface.clear_rect(rect);
                }
            }
        },
    }
}
