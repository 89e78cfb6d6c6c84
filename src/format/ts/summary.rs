//! Human-readable per-track report over the final stream table.
//!
//! This is a diagnostic surface, not a data output: the orchestration
//! layer reads it to decide success, and it lands on the log, not in the
//! demuxed files.

use super::types::TICKS_PER_MS;
use std::fmt;

/// Timing and identity of one resolved elementary stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    /// Packet identifier the stream arrived on.
    pub pid: u16,
    /// Owning program number.
    pub channel: u16,
    /// Ordinal position within the program's PMT.
    pub id: u8,
    /// Raw stream type byte.
    pub stream_type: u8,
    /// Output extension derived from the stream type.
    pub extension: &'static str,
    /// PES stream id byte.
    pub stream_id: u8,
    /// Frames per second derived from the last inter-frame delta.
    pub fps: Option<f64>,
    /// Track duration in milliseconds (first PTS to one frame past the
    /// last PTS).
    pub duration_ms: Option<u64>,
    /// PES packets observed.
    pub frame_count: u64,
    /// Elementary-stream frame boundaries counted, when a codec counter
    /// ran and found any.
    pub es_frame_count: Option<u64>,
    /// Lead of this track's start over the earliest track, in ms.
    pub head_ms: Option<u64>,
    /// Shortfall of this track's end against the latest track, in ms.
    pub tail_ms: Option<u64>,
}

impl fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid={} (0x{:04x}), ch={}, id={}, type=0x{:02x} ({}), stream=0x{:02x}",
            self.pid, self.pid, self.channel, self.id, self.stream_type, self.extension,
            self.stream_id
        )?;
        if let Some(fps) = self.fps {
            write!(f, ", fps={fps:.2}")?;
        }
        if let Some(len) = self.duration_ms {
            write!(f, ", len={len}ms")?;
        }
        if self.frame_count > 0 {
            write!(f, ", fn={}", self.frame_count)?;
        }
        if let Some(esfn) = self.es_frame_count {
            write!(f, ", esfn={esfn}")?;
        }
        if let Some(head) = self.head_ms {
            write!(f, ", head=+{head}ms")?;
        }
        if let Some(tail) = self.tail_ms {
            write!(f, ", tail=-{tail}ms")?;
        }
        Ok(())
    }
}

/// Report over every resolved track, ordered by PID.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Per-track lines.
    pub tracks: Vec<TrackSummary>,
}

impl Summary {
    /// Emits the report at info level.
    pub fn log(&self) {
        for track in &self.tracks {
            log::info!("{track}");
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for track in &self.tracks {
            writeln!(f, "{track}")?;
        }
        Ok(())
    }
}

/// Converts 90 kHz ticks to whole milliseconds.
pub(crate) fn ticks_to_ms(ticks: u64) -> u64 {
    ticks / TICKS_PER_MS
}
