#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]

//! # tsdemux - MPEG-2 Transport Stream Demultiplexer
//!
//! `tsdemux` splits MPEG-2 transport stream captures (plain 188-byte TS
//! and Blu-ray 192-byte M2TS) into their elementary streams. It resolves
//! the program tables, reassembles PES headers across packet boundaries,
//! tracks per-stream timing and writes one output file per audio/video
//! track.
//!
//! ## Features
//!
//! - Automatic TS / M2TS framing detection
//! - PAT/PMT resolution with cross-packet section reassembly
//! - PTS/DTS extraction, per-track duration, fps and skew reporting
//! - Elementary stream or raw PES output, per-track file sinks
//! - H.264 access-unit counting over the demuxed payload
//! - Per-frame timecode sequence generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsdemux::{DemuxConfig, Demuxer};
//!
//! #[tokio::main]
//! async fn main() -> tsdemux::Result<()> {
//!     let config = DemuxConfig::new().with_output_dir("out");
//!     let mut demuxer = Demuxer::new(config);
//!     demuxer.demux_file("capture.m2ts").await?;
//!     demuxer.summary().log();
//!     Ok(())
//! }
//! ```
//!
//! The packet-level API is available too: feed [`Demuxer::demux_packet`]
//! one packet at a time from any transport.

/// Run configuration
pub mod config;

/// Error types
pub mod error;

/// Elementary-stream frame counters
pub mod codec;

/// Container formats
pub mod format;

/// Shared byte-level helpers
pub mod utils;

pub use config::{DemuxConfig, DumpLevel};
pub use error::{DemuxError, PacketError, Result};
pub use format::ts::{Demuxer, Framing, Stream, StreamKind, Summary, TrackSummary};
