use thiserror::Error;

/// Errors that terminate a demux run.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized stream framing (neither 188-byte TS nor 192-byte M2TS)")]
    UnrecognizedFraming,

    #[error("truncated packet: read {got} of {want} bytes at packet {packet}")]
    TruncatedPacket { got: usize, want: usize, packet: u64 },

    #[error("invalid packet {packet}: {source}")]
    Packet {
        packet: u64,
        #[source]
        source: PacketError,
    },

    #[error("unknown pid {0:#06x}")]
    UnknownPid(u16),
}

/// Structural violations scoped to a single transport packet.
///
/// In strict mode any of these aborts the run; otherwise the packet is
/// dropped with a warning and the scan continues.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("missing 0x47 sync byte")]
    BadSync,

    #[error("transport error indicator set")]
    TransportError,

    #[error("adaptation field runs past packet end")]
    AdaptationOverrun,

    #[error("packet too short for a section header")]
    ShortSectionHeader,

    #[error("bad fixed bits in section length field")]
    BadSectionHeader,

    #[error("section length exceeds reassembly buffer capacity")]
    SectionTooLarge,

    #[error("continuation packet with no section in progress")]
    NoPendingSection,

    #[error("section continuation overflows reassembly buffer")]
    SectionOverflow,

    #[error("section too short for its fixed header")]
    ShortSection,

    #[error("section body length is not a whole number of entries")]
    BadSectionLength,

    #[error("reserved bits ahead of pid field are not all ones")]
    BadReservedBits,

    #[error("section entry truncated")]
    ShortEntry,

    #[error("section byte count does not match declared length")]
    TrailingBytes,

    #[error("missing 0x000001 start code in pes header")]
    BadPesStartCode,
}

impl PacketError {
    /// Attaches the 1-based packet number for run-level reporting.
    pub fn at(self, packet: u64) -> DemuxError {
        DemuxError::Packet { packet, source: self }
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;
