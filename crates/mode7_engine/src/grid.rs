//! The 40x25 character grid and the frame assembler.

use crate::{
    prefix_cell1, row::RowEncoder, ControlFeatures, FrameLayout, SourceImage, BLANK, GFX_WHITE,
    MODE7_MAX_SIZE, MODE7_WIDTH,
};

/// One MODE 7 screen worth of glyph bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode7Grid {
    cells: [u8; MODE7_MAX_SIZE],
}

impl Mode7Grid {
    pub fn blank() -> Self {
        Self {
            cells: [BLANK; MODE7_MAX_SIZE],
        }
    }

    /// The preset boot screen: every row already carries the graphics-white
    /// prefix. Must match the screen the playback routine starts from.
    pub fn preset(separated: bool) -> Self {
        let mut grid = Self::blank();
        for row in grid.cells.chunks_exact_mut(MODE7_WIDTH) {
            row[0] = GFX_WHITE;
            row[1] = prefix_cell1(separated);
        }
        grid
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn row_mut(&mut self, y7: usize) -> &mut [u8] {
        &mut self.cells[y7 * MODE7_WIDTH..(y7 + 1) * MODE7_WIDTH]
    }

    pub fn copy_from(&mut self, other: &Mode7Grid) {
        self.cells.copy_from_slice(&other.cells);
    }
}

/// Encode one dithered frame into the grid, row by row: splice the mandatory
/// prefix, run the row search over the image columns. Rows below the image
/// stay blank. Returns the summed minimum row error.
pub fn assemble_frame(
    grid: &mut Mode7Grid,
    image: &SourceImage,
    layout: FrameLayout,
    features: ControlFeatures,
    separated: bool,
) -> u64 {
    let mut encoder = RowEncoder::new(image, layout, features);
    let mut total_error = 0;
    for y7 in 0..layout.frame_height {
        let row = grid.row_mut(y7);
        row[..layout.prefix_width()].fill(BLANK);
        total_error += u64::from(encoder.encode_row(y7, row));
        row[0] = GFX_WHITE;
        row[1] = prefix_cell1(separated);
    }
    total_error
}
