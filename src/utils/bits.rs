//! Stateless big-endian field readers over byte slices.
//!
//! The transport layer is byte-aligned throughout, so these stay simple:
//! fixed-width loads at a caller-supplied offset. Callers bound-check the
//! slice before indexing; the helpers themselves panic on short input like
//! any slice access would, which keeps them out of the error path.

/// Reads one byte at `offset`.
#[inline]
pub fn be8(data: &[u8], offset: usize) -> u8 {
    data[offset]
}

/// Reads a big-endian 16-bit field at `offset`.
#[inline]
pub fn be16(data: &[u8], offset: usize) -> u16 {
    ((data[offset] as u16) << 8) | data[offset + 1] as u16
}

/// Reads a big-endian 32-bit field at `offset`.
#[inline]
pub fn be32(data: &[u8], offset: usize) -> u32 {
    ((data[offset] as u32) << 24)
        | ((data[offset + 1] as u32) << 16)
        | ((data[offset + 2] as u32) << 8)
        | data[offset + 3] as u32
}
