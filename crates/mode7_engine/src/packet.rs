//! Frame packetising.
//!
//! Each encoded frame is shipped in the cheapest of several envelopes:
//!
//! | header        | payload                                             |
//! |---------------|-----------------------------------------------------|
//! | `0x00`        | nothing changed                                     |
//! | `N` (1..=252) | `N` deltas, packed words or offset/offset/byte      |
//! | `0xFE`        | run-length encoding of the whole grid (blank = 32)  |
//! | `0xFD`        | run-length encoding of the delta array (blank = 0)  |
//! | `0x00 0xFF`   | raw grid bytes (legacy reset)                       |
//!
//! The stream starts with the frame size as a little-endian word and ends
//! with a single `0xFF`.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{
    assemble_frame, compute_delta, is_mosaic, steve_encode, ControlFeatures, FrameLayout,
    Mode7Grid, Result, SourceImage, BLANK, EngineError,
};

pub const STREAM_TERMINATOR: u8 = 0xFF;
const FULL_STEVE_TAG: u8 = 0xFE;
const DELTA_STEVE_TAG: u8 = 0xFD;
const RESET_TAG: u8 = 0xFF;

/// Highest delta count a one-byte frame header can carry; 0xFD..0xFF are
/// envelope tags.
const DELTA_MAX_COUNT: usize = 0xFC;
/// Widest cell gap the 10-bit offset field of a packed delta can express.
const MAX_PACKED_OFFSET: usize = 0x3FF;

/// Wire format of a delta cell.
///
/// The two formats are not interchangeable and nothing in the stream
/// declares which one is in use; encoder and playback routine must agree
/// out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaCodec {
    /// 16-bit little-endian word: 10-bit cell offset, 5 low glyph bits,
    /// glyph bit 6 on top. Only mosaic bytes survive this packing.
    Packed16,
    /// 16-bit little-endian offset followed by the raw byte.
    Unpacked24,
}

impl DeltaCodec {
    pub fn bytes_per_delta(self) -> usize {
        match self {
            DeltaCodec::Packed16 => 2,
            DeltaCodec::Unpacked24 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Allow `HoldGraphics` / `ReleaseGraphics` in the row search.
    pub use_hold: bool,
    /// Allow `NewBackground` / `BlackBackground` in the row search.
    pub use_fill: bool,
    /// Prefix rows with separated rather than contiguous graphics.
    pub separated_graphics: bool,
    /// Assume the playback screen already carries the row prefixes.
    pub zero_frame_preset: bool,
    pub delta_codec: DeltaCodec,
    /// Consider the run-length encoding of the delta array. When off its
    /// cost is treated as infinite.
    pub use_delta_steve: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            use_hold: true,
            use_fill: true,
            separated_graphics: false,
            zero_frame_preset: true,
            delta_codec: DeltaCodec::Packed16,
            use_delta_steve: true,
        }
    }
}

impl EncoderOptions {
    fn features(&self) -> ControlFeatures {
        ControlFeatures {
            use_hold: self.use_hold,
            use_fill: self.use_fill,
        }
    }
}

/// One changed cell: absolute grid index and the byte to store there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaCell {
    pub index: usize,
    pub data: u8,
}

/// A frame's wire representation, chosen by cost before any byte is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEnvelope {
    Blank,
    Delta(Vec<DeltaCell>),
    FullSteve(Vec<u8>),
    DeltaSteve(Vec<u8>),
    FullRefresh(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Blank,
    Delta,
    FullSteve,
    DeltaSteve,
    FullRefresh,
}

impl EnvelopeKind {
    pub fn name(self) -> &'static str {
        match self {
            EnvelopeKind::Blank => "blank",
            EnvelopeKind::Delta => "delta",
            EnvelopeKind::FullSteve => "steve",
            EnvelopeKind::DeltaSteve => "delta-steve",
            EnvelopeKind::FullRefresh => "reset",
        }
    }
}

impl FrameEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            FrameEnvelope::Blank => EnvelopeKind::Blank,
            FrameEnvelope::Delta(_) => EnvelopeKind::Delta,
            FrameEnvelope::FullSteve(_) => EnvelopeKind::FullSteve,
            FrameEnvelope::DeltaSteve(_) => EnvelopeKind::DeltaSteve,
            FrameEnvelope::FullRefresh(_) => EnvelopeKind::FullRefresh,
        }
    }

    /// Emitted size in bytes, header included.
    pub fn encoded_len(&self, codec: DeltaCodec) -> usize {
        match self {
            FrameEnvelope::Blank => 1,
            FrameEnvelope::Delta(cells) => 1 + cells.len() * codec.bytes_per_delta(),
            FrameEnvelope::FullSteve(payload) | FrameEnvelope::DeltaSteve(payload) => {
                1 + payload.len()
            }
            FrameEnvelope::FullRefresh(raw) => 2 + raw.len(),
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W, codec: DeltaCodec) -> Result<()> {
        match self {
            FrameEnvelope::Blank => out.write_u8(0)?,
            FrameEnvelope::Delta(cells) => {
                out.write_u8(cells.len() as u8)?;
                let mut previ = 0;
                for cell in cells {
                    let offset = cell.index - previ;
                    match codec {
                        DeltaCodec::Packed16 => {
                            let word = offset as u16
                                | u16::from(cell.data & 0x1F) << 10
                                | u16::from(cell.data & 0x40) << 9;
                            out.write_u16::<LittleEndian>(word)?;
                        }
                        DeltaCodec::Unpacked24 => {
                            out.write_u16::<LittleEndian>(offset as u16)?;
                            out.write_u8(cell.data)?;
                        }
                    }
                    previ = cell.index;
                }
            }
            FrameEnvelope::FullSteve(payload) => {
                out.write_u8(FULL_STEVE_TAG)?;
                out.write_all(payload)?;
            }
            FrameEnvelope::DeltaSteve(payload) => {
                out.write_u8(DELTA_STEVE_TAG)?;
                out.write_all(payload)?;
            }
            FrameEnvelope::FullRefresh(raw) => {
                out.write_u8(0)?;
                out.write_u8(RESET_TAG)?;
                out.write_all(raw)?;
            }
        }
        Ok(())
    }
}

/// Delta cells for the packed codec. Gaps the 10-bit offset cannot carry
/// are split with no-op rewrites of unchanged mosaic cells, so a decoder
/// lands on the right index without visible effect. Returns `None` when a
/// byte cannot survive the 6-bit packing (control codes) and no delta
/// envelope is possible for this frame.
fn packed_delta_cells(delta: &[u8], grid: &[u8]) -> Option<Vec<DeltaCell>> {
    let mut cells = Vec::new();
    let mut previ = 0;
    for (i, &data) in delta.iter().enumerate() {
        if data == 0 {
            continue;
        }
        if !is_mosaic(data) {
            return None;
        }
        while i - previ > MAX_PACKED_OFFSET {
            let mut pad = previ + MAX_PACKED_OFFSET;
            while pad > previ && !is_mosaic(grid[pad]) {
                pad -= 1;
            }
            if pad == previ {
                return None;
            }
            log::warn!("delta gap {} exceeds 10 bits, padding at cell {pad}", i - previ);
            cells.push(DeltaCell {
                index: pad,
                data: grid[pad],
            });
            previ = pad;
        }
        cells.push(DeltaCell { index: i, data });
        previ = i;
    }
    Some(cells)
}

fn unpacked_delta_cells(delta: &[u8]) -> Vec<DeltaCell> {
    delta
        .iter()
        .enumerate()
        .filter(|&(_, &data)| data != 0)
        .map(|(index, &data)| DeltaCell { index, data })
        .collect()
}

/// Per-frame outcome, for verbose reporting.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub kind: EnvelopeKind,
    /// Changed cells against the previous frame (before any gap padding).
    pub delta_count: usize,
    /// Bytes this frame added to the stream.
    pub bytes: usize,
    /// The row search's summed minimum error.
    pub error: u64,
}

/// Running totals across the stream.
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    pub frames: usize,
    pub total_deltas: usize,
    pub max_deltas: usize,
    pub reset_frames: usize,
    /// Stream bytes excluding the terminator.
    pub total_bytes: usize,
    pub delta_counts: Vec<usize>,
}

/// Nominal playback rate of the target, frames per second.
pub const PLAYBACK_FPS: f64 = 25.0;

impl EncoderStats {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.total_deltas += report.delta_count;
        self.max_deltas = self.max_deltas.max(report.delta_count);
        if report.kind == EnvelopeKind::FullRefresh {
            self.reset_frames += 1;
        }
        self.total_bytes += report.bytes;
        self.delta_counts.push(report.delta_count);
    }

    pub fn deltas_per_frame(&self) -> f64 {
        self.total_deltas as f64 / self.frames.max(1) as f64
    }

    pub fn bytes_per_frame(&self) -> f64 {
        self.total_bytes as f64 / self.frames.max(1) as f64
    }

    pub fn bytes_per_second(&self) -> f64 {
        PLAYBACK_FPS * self.bytes_per_frame()
    }
}

/// Stream encoder. Owns the persistent previous grid, the running
/// statistics and the output buffer; frames must be fed in playback order
/// because every envelope is relative to the grid before it.
pub struct Mode7Encoder {
    options: EncoderOptions,
    layout: Option<FrameLayout>,
    current: Mode7Grid,
    previous: Mode7Grid,
    delta: Vec<u8>,
    output: Vec<u8>,
    stats: EncoderStats,
    expected_frames: usize,
}

impl Mode7Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        let previous = if options.zero_frame_preset {
            Mode7Grid::preset(options.separated_graphics)
        } else {
            Mode7Grid::blank()
        };
        Self {
            options,
            layout: None,
            current: Mode7Grid::blank(),
            previous,
            delta: Vec::new(),
            output: Vec::new(),
            stats: EncoderStats::default(),
            expected_frames: 0,
        }
    }

    /// Hint for pre-sizing the output buffer to its upper bound.
    pub fn expect_frames(&mut self, frames: usize) {
        self.expected_frames = frames;
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Grid of the last encoded frame.
    pub fn current_grid(&self) -> &[u8] {
        let size = self.layout.map_or(0, FrameLayout::frame_size);
        &self.current.cells()[..size]
    }

    /// Delta array of the last encoded frame (0 = unchanged).
    pub fn delta_array(&self) -> &[u8] {
        &self.delta
    }

    /// Encode one frame and append its envelope to the stream.
    pub fn encode_frame(&mut self, image: &SourceImage) -> Result<FrameReport> {
        let layout = self.frame_layout(image)?;
        let frame_size = layout.frame_size();

        let error = assemble_frame(
            &mut self.current,
            image,
            layout,
            self.options.features(),
            self.options.separated_graphics,
        );

        self.delta.resize(frame_size, 0);
        let delta_count = compute_delta(
            &self.current.cells()[..frame_size],
            &self.previous.cells()[..frame_size],
            &mut self.delta,
        );

        let envelope = self.choose_envelope(frame_size, delta_count);
        let before = self.output.len();
        envelope.write_to(&mut self.output, self.options.delta_codec)?;

        let report = FrameReport {
            kind: envelope.kind(),
            delta_count,
            bytes: self.output.len() - before,
            error,
        };
        self.stats.record(&report);
        self.previous.copy_from(&self.current);
        Ok(report)
    }

    /// Terminate the stream and hand it over.
    pub fn finish(mut self) -> (Vec<u8>, EncoderStats) {
        self.output.push(STREAM_TERMINATOR);
        (self.output, self.stats)
    }

    fn frame_layout(&mut self, image: &SourceImage) -> Result<FrameLayout> {
        let layout = FrameLayout::for_image(image)?;
        match self.layout {
            Some(expected) if expected != layout => Err(EngineError::FrameSizeMismatch {
                expected_width: expected.frame_width,
                expected_height: expected.frame_height,
                width: layout.frame_width,
                height: layout.frame_height,
            }),
            Some(_) => Ok(layout),
            None => {
                self.layout = Some(layout);
                self.output
                    .reserve(self.expected_frames.saturating_mul(layout.frame_size()) + 3);
                self.output
                    .write_u16::<LittleEndian>(layout.frame_size() as u16)?;
                self.stats.total_bytes += 2;
                Ok(layout)
            }
        }
    }

    /// Pick the cheapest representation for the frame. The legacy reset rule
    /// runs first: a delta count beyond what a raw refresh would cost always
    /// emits the raw grid.
    fn choose_envelope(&self, frame_size: usize, delta_count: usize) -> FrameEnvelope {
        if delta_count == 0 {
            return FrameEnvelope::Blank;
        }

        let grid = &self.current.cells()[..frame_size];
        let codec = self.options.delta_codec;

        if delta_count > frame_size / codec.bytes_per_delta() {
            log::debug!("frame reset: {delta_count} deltas");
            return FrameEnvelope::FullRefresh(grid.to_vec());
        }

        let cells = match codec {
            DeltaCodec::Packed16 => packed_delta_cells(&self.delta, grid),
            DeltaCodec::Unpacked24 => Some(unpacked_delta_cells(&self.delta)),
        };
        let cells = match cells {
            Some(cells) if cells.len() > DELTA_MAX_COUNT => {
                log::warn!(
                    "delta count {} exceeds the one-byte header, falling back to run-length",
                    cells.len()
                );
                None
            }
            other => other,
        };

        let full_steve = steve_encode(grid, BLANK);
        let delta_steve = self
            .options
            .use_delta_steve
            .then(|| steve_encode(&self.delta, 0));
        let delta_steve_len = delta_steve.as_ref().map_or(usize::MAX, Vec::len);

        if let Some(cells) = cells {
            let delta_len = cells.len() * codec.bytes_per_delta();
            if delta_len <= full_steve.len() && delta_len <= delta_steve_len {
                return FrameEnvelope::Delta(cells);
            }
        }
        match delta_steve {
            Some(payload) if payload.len() < full_steve.len() => FrameEnvelope::DeltaSteve(payload),
            _ => FrameEnvelope::FullSteve(full_steve),
        }
    }
}
