//! Run-length ("Steve") encoding.
//!
//! Encodes a cell array as runs of the blank code and of solid blocks, with
//! every other byte escaped as a literal:
//!
//! ```plain
//! 0x01..=0x3F   run of 1..63 blank cells
//! 0x41..=0x7F   run of 1..63 solid (127) cells
//! 0x80..=0xFF   literal: the cell byte with bit 7 set
//! ```
//!
//! Runs are capped at 63 so the flush byte stays below the literal range;
//! longer stretches emit consecutive run bytes. The same scheme covers full
//! frames (blank = 32) and delta arrays (blank = 0, meaning "cell
//! unchanged"). Mosaic literals (32..=127) move to 160..=255; control-code
//! literals (144..=159) already carry bit 7 and stay put, so the two ranges
//! cannot collide on decode.

use crate::SOLID;

const MAX_RUN: usize = 63;
const BLANK_RUN_BASE: u8 = 0;
const SOLID_RUN_BASE: u8 = 64;

/// Encode `cells` with the given blank sentinel.
pub fn steve_encode(cells: &[u8], blank: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut run: Option<(u8, usize)> = None;

    for &cell in cells {
        if cell == blank || cell == SOLID {
            match &mut run {
                Some((code, len)) if *code == cell && *len < MAX_RUN => *len += 1,
                _ => {
                    flush_run(&mut out, blank, run);
                    run = Some((cell, 1));
                }
            }
        } else {
            flush_run(&mut out, blank, run.take());
            out.push(cell | 0x80);
        }
    }
    flush_run(&mut out, blank, run);
    out
}

fn flush_run(out: &mut Vec<u8>, blank: u8, run: Option<(u8, usize)>) {
    if let Some((code, len)) = run {
        let base = if code == blank {
            BLANK_RUN_BASE
        } else {
            SOLID_RUN_BASE
        };
        out.push(base + len as u8);
    }
}
