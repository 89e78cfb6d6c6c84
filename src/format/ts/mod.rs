//! MPEG-2 transport stream demultiplexing.
//!
//! The pipeline runs in layers: [`types`] sniffs the physical framing and
//! classifies PMT stream types, [`section`] reassembles byte units that
//! span packets, [`psi`] decodes completed PAT/PMT sections, [`pes`]
//! decodes reassembled PES headers and their 33-bit timestamps, and
//! [`demuxer`] drives the whole thing packet by packet. [`summary`] and
//! [`timecode`] read the resulting stream table back out.

/// Framing detection, stream type classification, shared constants
pub mod types;

/// Bounded cross-packet reassembly buffer
pub mod section;

/// PAT/PMT section body parsers
pub mod psi;

/// PES header decoding and timestamp codec
pub mod pes;

/// The packet-driven demuxer core
pub mod demuxer;

/// Per-track report generation
pub mod summary;

/// Per-frame timecode sequences
pub mod timecode;

pub use demuxer::{Demuxer, Stream};
pub use pes::PesHeader;
pub use psi::{PatEntry, PmtEntry};
pub use summary::{Summary, TrackSummary};
pub use types::{Framing, StreamKind};
