use crate::error::DemuxError;

/// TS packet sync byte.
pub const SYNC_BYTE: u8 = 0x47;
/// Plain transport stream packet size.
pub const TS_PACKET_SIZE: usize = 188;
/// HDMV (M2TS) packet size: 4-byte arrival-timestamp prefix + TS packet.
pub const M2TS_PACKET_SIZE: usize = 192;
/// Fixed TS header size ahead of adaptation field / payload.
pub const TS_HEADER_SIZE: usize = 4;

/// PID carrying the Program Association Table.
pub const PID_PAT: u16 = 0x0000;
/// Null packet PID, carries stuffing only.
pub const PID_NULL: u16 = 0x1fff;

/// PAT table id.
pub const TABLE_ID_PAT: u8 = 0x00;
/// PMT table id.
pub const TABLE_ID_PMT: u8 = 0x02;

/// PTS/DTS clock rate.
pub const PTS_HZ: u64 = 90_000;
/// 90 kHz ticks per millisecond.
pub const TICKS_PER_MS: u64 = 90;

/// Sentinel for a stream not yet assigned to a program.
pub const CHANNEL_UNSET: u16 = 0xffff;
/// Stream type byte meaning "not an elementary stream" (still PSI).
pub const STREAM_TYPE_NOT_ES: u8 = 0xff;

/// Physical framing of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 188-byte transport stream packets.
    Ts,
    /// 192-byte Blu-ray (HDMV) packets with an arrival-timestamp prefix.
    M2ts,
}

impl Framing {
    /// Sniffs the framing from the first bytes of a file.
    ///
    /// A TS file opens with the sync byte and has ordinary header/payload
    /// data at offset 4; an M2TS file opens with the 4-byte arrival
    /// timestamp, so the sync byte lands at offset 4. Anything else is not
    /// a capture this demuxer understands.
    pub fn sniff(head: &[u8]) -> Result<Framing, DemuxError> {
        if head.len() < 5 {
            return Err(DemuxError::UnrecognizedFraming);
        }
        match (head[0] == SYNC_BYTE, head[4] == SYNC_BYTE) {
            (true, false) => Ok(Framing::Ts),
            (false, true) => Ok(Framing::M2ts),
            _ => Err(DemuxError::UnrecognizedFraming),
        }
    }

    /// Size of one packet under this framing.
    pub fn packet_size(self) -> usize {
        match self {
            Framing::Ts => TS_PACKET_SIZE,
            Framing::M2ts => M2TS_PACKET_SIZE,
        }
    }

    /// Whether this is the HDMV variant.
    pub fn is_hdmv(self) -> bool {
        self == Framing::M2ts
    }
}

/// Codec classification derived from the raw PMT stream type byte.
///
/// The 0x80 type is overloaded: MPEG-2 video in plain TS captures, LPCM
/// audio on Blu-ray, so classification needs the framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Unclassified payload, written with the default extension.
    Data,
    /// MPEG-2 video (types 0x01, 0x02, and 0x80 in plain TS).
    Mpeg2Video,
    /// H.264 video (type 0x1b).
    H264Video,
    /// VC-1 video (type 0xea).
    Vc1Video,
    /// AC-3 audio (types 0x81, 0x06, 0x83).
    Ac3Audio,
    /// MPEG-1/2 audio (types 0x03, 0x04).
    Mpeg2Audio,
    /// LPCM audio (type 0x80 on Blu-ray).
    LpcmAudio,
    /// DTS audio (types 0x82, 0x86, 0x8a).
    DtsAudio,
}

impl StreamKind {
    /// Classifies a raw stream type byte under the given framing.
    pub fn classify(stream_type: u8, hdmv: bool) -> StreamKind {
        match stream_type {
            0x01 | 0x02 => StreamKind::Mpeg2Video,
            0x80 => {
                if hdmv {
                    StreamKind::LpcmAudio
                } else {
                    StreamKind::Mpeg2Video
                }
            }
            0x1b => StreamKind::H264Video,
            0xea => StreamKind::Vc1Video,
            0x81 | 0x06 | 0x83 => StreamKind::Ac3Audio,
            0x03 | 0x04 => StreamKind::Mpeg2Audio,
            0x82 | 0x86 | 0x8a => StreamKind::DtsAudio,
            _ => StreamKind::Data,
        }
    }

    /// Output file extension for this kind (no leading dot).
    pub fn extension(self) -> &'static str {
        match self {
            StreamKind::Data => "aac",
            StreamKind::Mpeg2Video => "m2v",
            StreamKind::H264Video => "264",
            StreamKind::Vc1Video => "vc1",
            StreamKind::Ac3Audio => "ac3",
            StreamKind::Mpeg2Audio => "mp3",
            StreamKind::LpcmAudio => "pcm",
            StreamKind::DtsAudio => "dts",
        }
    }
}

/// Whether a raw stream type byte carries video under the given framing.
///
/// Drives the fps estimate: frame-length deltas only become fps for video
/// tracks.
pub fn is_video_stream_type(stream_type: u8, hdmv: bool) -> bool {
    match stream_type {
        0x01 | 0x02 | 0x1b | 0xea => true,
        0x80 => !hdmv,
        _ => false,
    }
}

/// Stream types accepted by the audio/video-only filter.
pub fn is_av_stream_type(stream_type: u8) -> bool {
    matches!(
        stream_type,
        0x01 | 0x02 | 0x80 | 0x1b | 0xea | 0x81 | 0x06 | 0x83 | 0x03 | 0x04 | 0x82 | 0x86 | 0x8a
    )
}
