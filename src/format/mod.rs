//! Container format support.

/// MPEG-2 transport stream (TS / M2TS) demultiplexing
pub mod ts;
