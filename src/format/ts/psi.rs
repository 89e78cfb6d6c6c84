//! PAT/PMT section body parsers.
//!
//! Both run over a *completed* section: the bytes following the table id
//! and section length fields, exactly `section_length` of them, as
//! delivered in one packet or reassembled by
//! [`SectionBuffer`](super::section::SectionBuffer). Reassembly and
//! parsing are kept apart so a section split across N packets at arbitrary
//! byte boundaries parses identically to the same section in one packet.

use crate::error::PacketError;
use crate::utils::{be16, be8};

/// One PAT program entry: program number and the PID its PMT arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    /// Program (channel) number.
    pub channel: u16,
    /// PID carrying this program's PMT.
    pub pid: u16,
}

/// One PMT elementary-stream entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmtEntry {
    /// Raw stream type byte.
    pub stream_type: u8,
    /// PID carrying this elementary stream.
    pub pid: u16,
}

/// Parses a completed PAT section body into program entries.
///
/// Skips the 5 fixed header bytes (transport stream id, version, section
/// numbers), excludes the 4-byte CRC trailer without validating it, and
/// requires the remainder to be a whole number of 4-byte entries. The
/// reserved bits ahead of each PID must read all ones.
pub fn parse_pat(section: &[u8]) -> Result<Vec<PatEntry>, PacketError> {
    if section.len() <= 5 {
        return Err(PacketError::ShortSection);
    }
    let body = &section[5..];
    if body.len() < 4 || (body.len() - 4) % 4 != 0 {
        return Err(PacketError::BadSectionLength);
    }
    let body = &body[..body.len() - 4];

    let mut entries = Vec::with_capacity(body.len() / 4);
    for chunk in body.chunks_exact(4) {
        let channel = be16(chunk, 0);
        let pid = be16(chunk, 2);
        if pid & 0xe000 != 0xe000 {
            return Err(PacketError::BadReservedBits);
        }
        entries.push(PatEntry {
            channel,
            pid: pid & 0x1fff,
        });
    }
    Ok(entries)
}

/// Parses a completed PMT section body into elementary-stream entries.
///
/// Skips the 7 fixed header bytes (program number, version, section
/// numbers, PCR PID), the variable-length program-info descriptor loop,
/// and the 4-byte CRC trailer; then walks `{type, pid, es_info_length}`
/// entries, skipping the ES-info descriptors. Consumption must land
/// exactly on the computed section end.
pub fn parse_pmt(section: &[u8]) -> Result<Vec<PmtEntry>, PacketError> {
    // fixed header plus the 2-byte program-info length field
    if section.len() < 9 {
        return Err(PacketError::ShortSection);
    }
    let program_info_len = (be16(section, 7) & 0x0fff) as usize;
    let mut pos = 7 + 2 + program_info_len;
    let end = section.len() - 4;

    if pos >= end {
        return Err(PacketError::ShortSection);
    }

    let mut entries = Vec::new();
    while pos < end {
        if end - pos < 5 {
            return Err(PacketError::ShortEntry);
        }
        let stream_type = be8(section, pos);
        let pid = be16(section, pos + 1);
        if pid & 0xe000 != 0xe000 {
            return Err(PacketError::BadReservedBits);
        }
        let es_info_len = (be16(section, pos + 3) & 0x0fff) as usize;
        pos += 5 + es_info_len;

        entries.push(PmtEntry {
            stream_type,
            pid: pid & 0x1fff,
        });
    }

    if pos != end {
        return Err(PacketError::TrailingBytes);
    }
    Ok(entries)
}
