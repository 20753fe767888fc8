#![warn(clippy::all)]
#![allow(clippy::cast_possible_truncation, clippy::cast_lossless, clippy::must_use_candidate)]

//! Encoder core for BBC MODE 7 video streams.
//!
//! Takes pre-dithered RGB frames and produces a byte stream a playback
//! routine applies as deltas to a persistent 40x25 teletext screen. Display
//! attributes (foreground, background, hold graphics) are set by in-band
//! control codes that occupy a character cell each, so glyph selection for a
//! row is a search over the row state machine, not a per-cell mapping.

mod colour;
pub use colour::*;

mod error;
pub use error::*;

mod glyph;
pub use glyph::*;

mod source;
pub use source::*;

mod row;

mod grid;
pub use grid::*;

mod delta;
pub use delta::*;

mod steve;
pub use steve::*;

mod packet;
pub use packet::*;
