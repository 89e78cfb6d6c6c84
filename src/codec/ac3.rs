/// AC-3 (A/52) sync-frame counter.
///
/// Placeholder: payload is accepted but no sync-word scan is performed,
/// so the count stays at zero and the summary falls back to PES packet
/// counts for AC-3 tracks.
#[derive(Debug, Clone, Default)]
pub struct SyncFrameCounter {
    frames: u64,
}

impl SyncFrameCounter {
    /// Creates the counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a payload chunk; returns the running total (always zero).
    pub fn count(&mut self, _data: &[u8]) -> u64 {
        self.frames
    }

    /// Running sync-frame count.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Clears the count.
    pub fn reset(&mut self) {
        self.frames = 0;
    }
}
