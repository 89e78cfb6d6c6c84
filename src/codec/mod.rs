//! Per-codec elementary-stream frame-boundary counters.
//!
//! PES packet counts are only a proxy for access units (a PES packet may
//! carry several frames, or a frame may span several packets), so streams
//! that support it get a byte-stream scanner that counts true frame
//! boundaries as payload flows past. Counters are streaming and
//! restartable: feeding a byte sequence in one call or split across
//! arbitrary call boundaries yields the same count.

/// H.264 access-unit-delimiter NAL counter
pub mod h264;

/// AC-3 sync-frame counter
pub mod ac3;

use ac3::SyncFrameCounter;
use h264::AccessUnitCounter;

/// Frame-boundary counter attached to a stream, dispatched by stream type
/// when the PMT resolves the codec.
#[derive(Debug, Clone, Default)]
pub enum FrameCounter {
    /// No elementary-stream counting for this codec.
    #[default]
    None,
    /// H.264 video: counts access-unit-delimiter NAL units.
    H264(AccessUnitCounter),
    /// AC-3 audio: counts sync frames.
    Ac3(SyncFrameCounter),
}

impl FrameCounter {
    /// Picks the counter for a raw PMT stream type byte.
    pub fn for_stream_type(stream_type: u8) -> Self {
        match stream_type {
            0x1b => Self::H264(AccessUnitCounter::new()),
            0x06 | 0x81 | 0x83 => Self::Ac3(SyncFrameCounter::new()),
            _ => Self::None,
        }
    }

    /// Feeds a chunk of elementary-stream payload through the counter and
    /// returns the running frame count.
    pub fn count_boundaries(&mut self, data: &[u8]) -> u64 {
        match self {
            Self::None => 0,
            Self::H264(c) => c.count(data),
            Self::Ac3(c) => c.count(data),
        }
    }

    /// Running frame count without consuming any payload.
    pub fn frames(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::H264(c) => c.frames(),
            Self::Ac3(c) => c.frames(),
        }
    }

    /// Clears the scan context and the count.
    pub fn reset(&mut self) {
        match self {
            Self::None => {}
            Self::H264(c) => c.reset(),
            Self::Ac3(c) => c.reset(),
        }
    }
}
