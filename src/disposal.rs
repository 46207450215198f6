use std::mem;

use image::RgbaImage;

use crate::structs::GraphicControl;

/// Composited output of the most recent frame a restore-to-previous can
/// return to.
#[derive(Debug, Clone)]
struct Anchor {
    index: usize,
    pixels: RgbaImage,
}

/// Control metadata for the frame being drawn and the frame on display.
///
/// The method declared alongside frame N governs how frame N is cleaned up
/// before frame N+1 is drawn, so both generations are kept.
#[derive(Debug, Clone, Default)]
pub struct DisposalState {
    pending: GraphicControl,
    active: GraphicControl,
    anchor: Option<Anchor>,
}

impl DisposalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control data for the frame about to be drawn.
    pub fn pending(&self) -> &GraphicControl {
        &self.pending
    }

    /// Control data for the frame already displayed.
    pub fn active(&self) -> &GraphicControl {
        &self.active
    }

    /// Rotates `active <- pending` and installs `control` as pending.
    pub fn advance(&mut self, control: GraphicControl) {
        self.active = mem::replace(&mut self.pending, control);
    }

    /// Index and pixels of the anchor frame, if one was recorded.
    pub fn anchor(&self) -> Option<(usize, &RgbaImage)> {
        self.anchor
            .as_ref()
            .map(|anchor| (anchor.index, &anchor.pixels))
    }

    /// Makes frame `index`, composited as `pixels`, the new anchor.
    pub fn record_anchor(&mut self, index: usize, pixels: &RgbaImage) {
        match &mut self.anchor {
            Some(anchor) => {
                anchor.index = index;
                anchor.pixels.clone_from(pixels);
            }
            None => {
                self.anchor = Some(Anchor {
                    index,
                    pixels: pixels.clone(),
                })
            }
        }
    }
}
