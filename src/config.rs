use std::path::PathBuf;

/// Diagnostic dump verbosity.
///
/// Emission goes through the [`log`] crate; the level selects *which*
/// per-packet lines are produced at all, so a quiet run does not pay for
/// formatting it will never see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DumpLevel {
    /// No per-packet diagnostics.
    #[default]
    None,
    /// One line per transport packet: pid, flag summary, arrival timecode,
    /// continuity counter.
    Packets,
    /// Raw PTS/DTS values as they are decoded.
    Timestamps,
    /// Per-track timestamp lines (channel, id, type, stream id, times in ms).
    Tracks,
}

/// Run configuration for a [`Demuxer`](crate::format::ts::Demuxer).
///
/// Built once, passed in at construction and read-only afterwards. All
/// fields have conservative defaults: audio/video filtering on, ES output
/// (not PES), strict error handling, no output directory.
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Force HDMV (192-byte M2TS) framing instead of autodetecting it.
    pub hdmv: Option<bool>,
    /// Only demux stream types with a known audio/video classification.
    pub av_only: bool,
    /// Parse tables and timing but never open output files.
    pub parse_only: bool,
    /// Diagnostic verbosity for per-packet dump lines.
    pub dump: DumpLevel,
    /// Program (channel) to demux; 0 selects every program in the PAT.
    pub channel: u16,
    /// Write reassembled PES headers ahead of the payload instead of raw ES.
    pub pes_output: bool,
    /// Output file name prefix. When empty it is derived from the input
    /// file name (basename up to the first dot) with a trailing dot.
    pub prefix: String,
    /// Output directory; files land next to the process cwd when unset.
    pub output_dir: Option<PathBuf>,
    /// Feed ES payload through the per-codec frame-boundary counters.
    pub es_parse: bool,
    /// Abort the run on the first structurally invalid packet. When false
    /// such packets are logged and skipped.
    pub strict: bool,
    /// Reserved subtitle side channel; subtitle extraction is not
    /// implemented and this path is never opened.
    pub subtitles: Option<PathBuf>,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            hdmv: None,
            av_only: true,
            parse_only: false,
            dump: DumpLevel::None,
            channel: 0,
            pes_output: false,
            prefix: String::new(),
            output_dir: None,
            es_parse: false,
            strict: true,
            subtitles: None,
        }
    }
}

impl DemuxConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a single program to demux; 0 keeps every program.
    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// Enables or disables the audio/video-only stream type filter.
    pub fn with_av_only(mut self, av_only: bool) -> Self {
        self.av_only = av_only;
        self
    }

    /// Parse-only mode: no output files are opened or written.
    pub fn parse_only(mut self) -> Self {
        self.parse_only = true;
        self
    }

    /// Sets the output file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the directory output files are created in.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Enables elementary-stream frame-boundary counting.
    pub fn with_es_parse(mut self, es_parse: bool) -> Self {
        self.es_parse = es_parse;
        self
    }

    /// Emits reassembled PES headers into the output sinks.
    pub fn with_pes_output(mut self, pes_output: bool) -> Self {
        self.pes_output = pes_output;
        self
    }

    /// Sets the diagnostic dump level.
    pub fn with_dump(mut self, dump: DumpLevel) -> Self {
        self.dump = dump;
        self
    }

    /// Controls whether structural packet errors abort the run.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
