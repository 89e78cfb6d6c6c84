//! Byte-level helpers shared by the table and header decoders.

/// Big-endian field readers
pub mod bits;

pub use bits::*;
