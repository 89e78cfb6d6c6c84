//! Per-frame timecode sequence generation.
//!
//! Given a track's observed timing, produces one timecode per frame in
//! 90 kHz ticks. Two strategies:
//!
//! * [`proportional`] distributes the span evenly, carrying the fractional
//!   remainder so rounding error never accumulates past one tick;
//! * [`fixed`] is exact for constant-frame-length audio whose frame length
//!   is a whole number of milliseconds.
//!
//! [`for_track`] picks between them from the track's observed timing.

use super::types::TICKS_PER_MS;
use crate::error::Result;
use std::fmt::Write as _;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Evenly distributes `frame_count` timecodes across `[first, last)`.
///
/// The average inter-frame delta is carried as a real number; the integer
/// position is bumped by one tick whenever the accumulated remainder
/// reaches a full tick. Output is non-decreasing, starts at `first` and
/// never exceeds `last`.
pub fn proportional(first: u64, last: u64, frame_count: u64) -> Vec<u64> {
    if frame_count == 0 {
        return Vec::new();
    }
    let span = last.saturating_sub(first);
    let c = span as f64 / frame_count as f64;

    let mut exact = 0.0f64;
    let mut ticks = 0u64;
    let mut out = Vec::with_capacity(frame_count as usize);
    for _ in 0..frame_count {
        out.push(first + ticks);
        exact += c;
        ticks += c as u64; // truncating add, remainder carried in `exact`
        if exact - ticks as f64 >= 1.0 {
            ticks += 1;
        }
    }
    out
}

/// Exact timecodes for a constant frame length: `base + i * frame_length`.
pub fn fixed(base: u64, frame_length: u64, frame_count: u64) -> Vec<u64> {
    (0..frame_count).map(|i| base + i * frame_length).collect()
}

/// Generates the timecode sequence for a demuxed track.
///
/// `first`/`last` are the track's first and last presentation times; the
/// covered span extends one frame past `last`. The fixed strategy applies
/// only when the frames provably fit the span and the frame length is a
/// whole number of milliseconds (so the millisecond output loses nothing);
/// anything else falls back to proportional distribution. `base` shifts
/// the fixed sequence onto a shared timeline when several inputs are
/// demuxed in a row.
pub fn for_track(base: u64, first: u64, last: u64, frame_length: u64, frame_count: u64) -> Vec<u64> {
    let end = last + frame_length;
    if frame_length > 0
        && frame_length % TICKS_PER_MS == 0
        && frame_count * frame_length <= end.saturating_sub(first)
    {
        fixed(base, frame_length, frame_count)
    } else {
        proportional(first, end, frame_count)
    }
}

/// Writes timecodes as millisecond values, one per line.
pub async fn write_ms<W: AsyncWrite + Unpin>(writer: &mut W, ticks: &[u64]) -> Result<()> {
    let mut out = String::with_capacity(ticks.len() * 8);
    for t in ticks {
        let _ = writeln!(out, "{}", t / TICKS_PER_MS);
    }
    writer.write_all(out.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
