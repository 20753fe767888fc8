//! Per-row glyph selection.
//!
//! Chooses the glyph and control-code sequence for one character row so the
//! displayed pixels deviate as little as possible from the source. Greedy
//! per-cell choice is not enough here: a colour or background change spends
//! its cell one position before the cells it pays off in, so the choice at
//! every column depends on the best achievable remainder of the row. The
//! search memoises that remainder per (render state, column); the visited
//! state set is small, so a sparse map replaces the dense state table.

use std::collections::HashMap;

use crate::{
    rgb_of, ControlFeatures, FrameLayout, RenderState, SourceImage, BLACK_BG, BLANK, GFX_COLOUR,
    HOLD_GFX, MODE7_WIDTH, NEW_BG, RELEASE_GFX, ROW_START,
};

/// Sub-pixel mask and cell-relative pixel position, in scan order.
/// Bit 5 is always set on a mosaic, so the bottom-right pixel spills into
/// bit 6.
const SUBPIXELS: [(u8, usize, usize); 6] = [
    (0x01, 0, 0),
    (0x02, 1, 0),
    (0x04, 0, 1),
    (0x08, 1, 1),
    (0x10, 0, 2),
    (0x40, 1, 2),
];

struct Choice {
    error: u32,
    glyph: u8,
}

/// Row search scratch state. One instance survives a whole frame; the memo
/// map is cleared when a row begins.
pub(crate) struct RowEncoder<'a> {
    image: &'a SourceImage,
    layout: FrameLayout,
    features: ControlFeatures,
    y7: usize,
    cache: HashMap<(u16, usize), Choice>,
}

impl<'a> RowEncoder<'a> {
    pub fn new(image: &'a SourceImage, layout: FrameLayout, features: ControlFeatures) -> Self {
        Self {
            image,
            layout,
            features,
            y7: 0,
            cache: HashMap::new(),
        }
    }

    /// Solve row `y7` and write the chosen glyphs into
    /// `row[prefix_width..MODE7_WIDTH]`. Returns the minimum row error.
    pub fn encode_row(&mut self, y7: usize, row: &mut [u8]) -> u32 {
        self.y7 = y7;
        self.cache.clear();

        let start = self.layout.prefix_width();
        let total = self.best_tail(ROW_START, start);

        let mut state = ROW_START;
        for x7 in start..MODE7_WIDTH {
            let glyph = self.cache[&(state.state_id(), x7)].glyph;
            row[x7] = glyph;
            state = state.advance(glyph, self.features);
        }
        total
    }

    /// Squared pixel error of one emitted byte at column `x7`, with the row
    /// state already advanced past the byte.
    fn cell_error(&self, x7: usize, emitted: u8, state: RenderState) -> u32 {
        let displayed = state.displayed(emitted);
        let sx = (x7 - self.layout.prefix_width()) * 2;
        let sy = self.y7 * 3;

        let mut error = 0;
        for (bit, dx, dy) in SUBPIXELS {
            let shown = if displayed & bit != 0 { state.fg } else { state.bg };
            let (sr, sg, sb) = rgb_of(shown);
            let (ir, ig, ib) = self.image.rgb_at(sx + dx, sy + dy);
            error += sq(sr, ir) + sq(sg, ig) + sq(sb, ib);
        }
        error
    }

    /// The mosaic reproducing this cell against a background colour: a
    /// sub-pixel is on iff its source colour differs from the background.
    /// Blank when all six match.
    fn mosaic_for_cell(&self, x7: usize, bg: u8) -> u8 {
        let sx = (x7 - self.layout.prefix_width()) * 2;
        let sy = self.y7 * 3;

        let mut glyph = BLANK;
        for (bit, dx, dy) in SUBPIXELS {
            if self.image.colour_at(sx + dx, sy + dy) != bg {
                glyph |= bit;
            }
        }
        glyph
    }

    fn consider(&mut self, state: RenderState, x7: usize, emitted: u8, best: &mut Choice) {
        let next = state.advance(emitted, self.features);
        let error = self.cell_error(x7, emitted, next) + self.best_tail(next, x7 + 1);
        if error < best.error {
            best.error = error;
            best.glyph = emitted;
        }
    }

    /// Minimum achievable error from column `x7` to the end of the row when
    /// entering it in `state`; memoises the result and the glyph realising
    /// it. Candidate order matters for reproducibility: ties keep the
    /// earliest candidate.
    fn best_tail(&mut self, state: RenderState, x7: usize) -> u32 {
        if x7 >= MODE7_WIDTH {
            return 0;
        }
        let key = (state.state_id(), x7);
        if let Some(choice) = self.cache.get(&key) {
            return choice.error;
        }

        let mosaic = self.mosaic_for_cell(x7, state.bg);
        let mut best = Choice {
            error: u32::MAX,
            glyph: BLANK,
        };

        if mosaic == BLANK {
            self.consider(state, x7, BLANK, &mut best);
        }
        if self.features.use_fill {
            if state.bg != state.fg {
                self.consider(state, x7, NEW_BG, &mut best);
            }
            if state.bg != 0 {
                self.consider(state, x7, BLACK_BG, &mut best);
            }
        }
        if self.features.use_hold {
            if state.hold {
                self.consider(state, x7, RELEASE_GFX, &mut best);
            } else {
                self.consider(state, x7, HOLD_GFX, &mut best);
            }
        }
        for c in 1..8 {
            if c != state.fg {
                self.consider(state, x7, GFX_COLOUR + c, &mut best);
            }
        }
        if mosaic != BLANK {
            self.consider(state, x7, mosaic, &mut best);
        }

        let error = best.error;
        self.cache.insert(key, best);
        error
    }
}

fn sq(a: u8, b: u8) -> u32 {
    let d = i32::from(a) - i32::from(b);
    (d * d) as u32
}
