/// Streaming H.264 access-unit counter.
///
/// Keeps a 32-bit shifting context over the byte stream; each byte is
/// shifted in from the right. An access-unit-delimiter NAL start
/// (`00 00 01 09`, with the nal_ref_idc bits masked off) marks one frame.
/// No buffering beyond the 4 bytes of context, so chunk boundaries fall
/// anywhere.
#[derive(Debug, Clone, Default)]
pub struct AccessUnitCounter {
    ctx: u32,
    frames: u64,
}

const AUD_MASK: u32 = 0xffff_ff1f;
const AUD_PATTERN: u32 = 0x0000_0109;

impl AccessUnitCounter {
    /// Creates a counter with empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `data`, counting access-unit delimiters; returns the running
    /// total.
    pub fn count(&mut self, data: &[u8]) -> u64 {
        for &b in data {
            self.ctx = (self.ctx << 8) | b as u32;
            if self.ctx & AUD_MASK == AUD_PATTERN {
                self.frames += 1;
            }
        }
        self.frames
    }

    /// Running access-unit count.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Clears context and count.
    pub fn reset(&mut self) {
        self.ctx = 0;
        self.frames = 0;
    }
}
