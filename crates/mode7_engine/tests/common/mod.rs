//! Shared helpers: source-image builders and a playback simulator that
//! applies an encoded stream to a screen the way the target decoder does.

#![allow(dead_code)]

use mode7_engine::{
    rgb_of, ControlFeatures, DeltaCodec, Mode7Grid, RenderState, SourceImage, BLANK,
    MODE7_MAX_SIZE, MODE7_WIDTH, ROW_START, SOLID,
};

/// Sub-pixel mask and cell-relative pixel position, in scan order.
pub const SUBPIXELS: [(u8, usize, usize); 6] = [
    (0x01, 0, 0),
    (0x02, 1, 0),
    (0x04, 0, 1),
    (0x08, 1, 1),
    (0x10, 0, 2),
    (0x40, 1, 2),
];

pub fn image_from_fn(
    width: usize,
    height: usize,
    f: impl Fn(usize, usize) -> (u8, u8, u8),
) -> SourceImage {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = f(x, y);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    SourceImage::from_rgb(width, height, rgb).unwrap()
}

pub fn solid_image(width: usize, height: usize, rgb: (u8, u8, u8)) -> SourceImage {
    image_from_fn(width, height, |_, _| rgb)
}

/// Decode a run-length payload covering `cells` cells. Returns the decoded
/// cells and the number of payload bytes consumed.
pub fn steve_decode(payload: &[u8], cells: usize, blank: u8) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(cells);
    let mut pos = 0;
    while out.len() < cells {
        let byte = payload[pos];
        pos += 1;
        if byte >= 0x80 {
            // Mosaic literals carry bit 7 on top; control codes already
            // live above it and pass through unchanged.
            out.push(if byte >= 0xA0 { byte & 0x7F } else { byte });
        } else if byte >= 0x40 {
            out.extend(std::iter::repeat(SOLID).take((byte - 0x40) as usize));
        } else {
            out.extend(std::iter::repeat(blank).take(byte as usize));
        }
    }
    assert_eq!(out.len(), cells, "run overshot the cell count");
    (out, pos)
}

/// Replays an encoded stream against a simulated MODE 7 screen.
pub struct Replayer<'a> {
    stream: &'a [u8],
    pos: usize,
    codec: DeltaCodec,
    pub frame_size: usize,
    pub screen: Vec<u8>,
}

impl<'a> Replayer<'a> {
    pub fn new(stream: &'a [u8], codec: DeltaCodec, preset: bool, separated: bool) -> Self {
        let frame_size = u16::from_le_bytes([stream[0], stream[1]]) as usize;
        let screen = if preset {
            Mode7Grid::preset(separated).cells().to_vec()
        } else {
            vec![BLANK; MODE7_MAX_SIZE]
        };
        Self {
            stream,
            pos: 2,
            codec,
            frame_size,
            screen,
        }
    }

    /// Apply the next frame envelope; `None` on the stream terminator.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        match self.stream[self.pos] {
            0xFF => return None,
            0xFE => {
                self.pos += 1;
                let (cells, used) =
                    steve_decode(&self.stream[self.pos..], self.frame_size, BLANK);
                self.pos += used;
                self.screen[..self.frame_size].copy_from_slice(&cells);
            }
            0xFD => {
                self.pos += 1;
                let (cells, used) = steve_decode(&self.stream[self.pos..], self.frame_size, 0);
                self.pos += used;
                for (i, &data) in cells.iter().enumerate() {
                    if data != 0 {
                        self.screen[i] = data;
                    }
                }
            }
            0x00 => {
                // A zero header is a no-change frame unless the legacy reset
                // marker and a full grid follow.
                let reset = self.stream.get(self.pos + 1) == Some(&0xFF)
                    && self.stream.len() - self.pos - 2 > self.frame_size;
                if reset {
                    self.pos += 2;
                    self.screen[..self.frame_size]
                        .copy_from_slice(&self.stream[self.pos..self.pos + self.frame_size]);
                    self.pos += self.frame_size;
                } else {
                    self.pos += 1;
                }
            }
            count => {
                self.pos += 1;
                self.apply_deltas(count as usize);
            }
        }
        Some(&self.screen[..self.frame_size])
    }

    fn apply_deltas(&mut self, count: usize) {
        let mut previ = 0;
        for _ in 0..count {
            match self.codec {
                DeltaCodec::Packed16 => {
                    let word =
                        u16::from_le_bytes([self.stream[self.pos], self.stream[self.pos + 1]]);
                    self.pos += 2;
                    let offset = (word & 0x3FF) as usize;
                    let data = 0x20 | (word >> 10) as u8 & 0x1F | ((word >> 15) as u8 & 1) << 6;
                    previ += offset;
                    self.screen[previ] = data;
                }
                DeltaCodec::Unpacked24 => {
                    let offset =
                        u16::from_le_bytes([self.stream[self.pos], self.stream[self.pos + 1]])
                            as usize;
                    let data = self.stream[self.pos + 2];
                    self.pos += 3;
                    previ += offset;
                    self.screen[previ] = data;
                }
            }
        }
    }
}

/// Render the image region of a screen to RGB pixels, walking each row's
/// state machine the way the display hardware does.
pub fn render_pixels(
    screen: &[u8],
    frame_width: usize,
    frame_height: usize,
    features: ControlFeatures,
) -> Vec<(u8, u8, u8)> {
    let prefix_width = MODE7_WIDTH - frame_width;
    let mut pixels = vec![(0, 0, 0); frame_width * 2 * frame_height * 3];
    for y7 in 0..frame_height {
        let row = &screen[y7 * MODE7_WIDTH..(y7 + 1) * MODE7_WIDTH];
        let mut state: RenderState = ROW_START;
        for (x7, &cell) in row.iter().enumerate() {
            let next = state.advance(cell, features);
            if x7 >= prefix_width {
                let displayed = next.displayed(cell);
                for (bit, dx, dy) in SUBPIXELS {
                    let colour = if displayed & bit != 0 { next.fg } else { next.bg };
                    let x = (x7 - prefix_width) * 2 + dx;
                    let y = y7 * 3 + dy;
                    pixels[y * frame_width * 2 + x] = rgb_of(colour);
                }
            }
            state = next;
        }
    }
    pixels
}

/// The source pixels covered by the cell grid, in the same order as
/// `render_pixels` output.
pub fn source_pixels(
    image: &SourceImage,
    frame_width: usize,
    frame_height: usize,
) -> Vec<(u8, u8, u8)> {
    let mut pixels = Vec::with_capacity(frame_width * 2 * frame_height * 3);
    for y in 0..frame_height * 3 {
        for x in 0..frame_width * 2 {
            pixels.push(image.rgb_at(x, y));
        }
    }
    pixels
}
