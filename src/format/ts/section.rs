use crate::error::PacketError;
use bytes::BytesMut;

/// Capacity of the per-stream reassembly buffer. PSI sections are capped
/// at 1021 bytes by the standard but this demuxer only reassembles PAT/PMT
/// and PES header prefixes, which fit comfortably; longer declared lengths
/// are rejected rather than grown.
pub const SECTION_BUF_CAPACITY: usize = 512;

/// Bounded scratch buffer reassembling a PSI section or PES header prefix
/// that spans transport packets.
///
/// Holds `used` bytes toward a `target` length, maintaining
/// `used <= target <= capacity` at every append. The buffer is reused in
/// place across sections; [`reset`](SectionBuffer::reset) drops the
/// content without releasing the allocation.
#[derive(Debug)]
pub struct SectionBuffer {
    buf: BytesMut,
    target: usize,
}

impl SectionBuffer {
    /// Creates an empty buffer with the full capacity reserved up front.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(SECTION_BUF_CAPACITY),
            target: 0,
        }
    }

    /// Starts reassembly of a unit of `target` bytes, dropping any
    /// previous content.
    pub fn begin(&mut self, target: usize) -> Result<(), PacketError> {
        if target > SECTION_BUF_CAPACITY {
            return Err(PacketError::SectionTooLarge);
        }
        self.buf.clear();
        self.target = target;
        Ok(())
    }

    /// Raises the target length once the already-collected bytes reveal
    /// more is coming (PES headers declare their optional-field length at
    /// offset 8).
    pub fn extend_target(&mut self, additional: usize) -> Result<(), PacketError> {
        let target = self.target + additional;
        if target > SECTION_BUF_CAPACITY {
            return Err(PacketError::SectionTooLarge);
        }
        self.target = target;
        Ok(())
    }

    /// Appends bytes from `data` until the target is reached; surplus
    /// input (stuffing after the final fragment) is left untouched.
    /// Returns how many bytes were consumed.
    pub fn fill(&mut self, data: &[u8]) -> Result<usize, PacketError> {
        let want = self.target - self.buf.len();
        let take = want.min(data.len());
        if self.buf.len() + take > SECTION_BUF_CAPACITY {
            return Err(PacketError::SectionOverflow);
        }
        self.buf.extend_from_slice(&data[..take]);
        Ok(take)
    }

    /// Bytes collected so far.
    pub fn used(&self) -> usize {
        self.buf.len()
    }

    /// Declared length of the unit being reassembled; 0 when idle.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Whether a unit is mid-reassembly.
    pub fn pending(&self) -> bool {
        self.target > 0 && self.buf.len() < self.target
    }

    /// Whether the declared length has been reached.
    pub fn is_complete(&self) -> bool {
        self.target > 0 && self.buf.len() == self.target
    }

    /// The reassembled bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Drops content and target, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.target = 0;
    }
}

impl Default for SectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}
