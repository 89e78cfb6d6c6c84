//! PES header decoding and the 33-bit truncated timestamp codec.

use crate::error::PacketError;
use crate::utils::be8;

/// Fixed PES header prefix: start code, stream id, packet length, flags,
/// header data length. Optional fields (PTS/DTS and friends) follow.
pub const PES_PREFIX_LEN: usize = 9;

/// Decoded PES packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    /// MPEG stream id byte (0xe0.. video, 0xc0.. audio).
    pub stream_id: u8,
    /// Presentation timestamp in 90 kHz ticks, when signalled.
    pub pts: Option<u64>,
    /// Decode timestamp in 90 kHz ticks, when signalled.
    pub dts: Option<u64>,
}

impl PesHeader {
    /// Decodes a fully reassembled PES header (the 9-byte prefix plus
    /// `header_data_length` optional bytes).
    ///
    /// The PTS/DTS presence flags live in the top two bits of byte 7:
    /// `10` signals PTS at offset 9, `11` signals PTS at 9 and DTS at 14.
    /// Any other flag combination carries no timestamps; flags that claim
    /// more optional bytes than the header declares are ignored the same
    /// way.
    pub fn parse(buf: &[u8]) -> Result<PesHeader, PacketError> {
        if buf.len() < PES_PREFIX_LEN || buf[..3] != [0x00, 0x00, 0x01] {
            return Err(PacketError::BadPesStartCode);
        }

        let stream_id = be8(buf, 3);
        let (pts, dts) = match be8(buf, 7) & 0xc0 {
            0x80 if buf.len() >= 14 => (Some(decode_timestamp(&buf[9..14])), None),
            0xc0 if buf.len() >= 19 => (
                Some(decode_timestamp(&buf[9..14])),
                Some(decode_timestamp(&buf[14..19])),
            ),
            _ => (None, None),
        };

        Ok(PesHeader { stream_id, pts, dts })
    }
}

/// Decodes the 5-byte truncated 33-bit PTS/DTS encoding.
///
/// Layout: `0000 aaa1 bbbb bbbb bbbb bbb1 cccc cccc cccc ccc1` where the
/// timestamp is `aaa · b×15 · c×15` and the interleaved marker bits are
/// skipped.
pub fn decode_timestamp(p: &[u8]) -> u64 {
    ((p[0] as u64 & 0x0e) << 29)
        | ((p[1] as u64) << 22)
        | ((p[2] as u64 & 0xfe) << 14)
        | ((p[3] as u64) << 7)
        | ((p[4] as u64) >> 1)
}

/// Encodes a 33-bit timestamp into the 5-byte PES layout.
///
/// `marker` carries the 4 leading indicator bits (0x20 for a lone PTS,
/// 0x30/0x10 for a PTS/DTS pair). The inverse of [`decode_timestamp`] for
/// every value in `[0, 2^33)`.
pub fn encode_timestamp(marker: u8, ts: u64) -> [u8; 5] {
    let ts = ts & 0x1_ffff_ffff;
    [
        marker | ((ts >> 29) & 0x0e) as u8 | 0x01,
        (ts >> 22) as u8,
        ((ts >> 14) as u8 & 0xfe) | 0x01,
        (ts >> 7) as u8,
        ((ts << 1) as u8 & 0xfe) | 0x01,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn header_with(flags: u8, stamps: &[u64]) -> Vec<u8> {
        let mut buf = vec![0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x80, flags];
        buf.push((stamps.len() * 5) as u8);
        match stamps {
            [pts] => buf.extend_from_slice(&encode_timestamp(0x20, *pts)),
            [pts, dts] => {
                buf.extend_from_slice(&encode_timestamp(0x30, *pts));
                buf.extend_from_slice(&encode_timestamp(0x10, *dts));
            }
            _ => {}
        }
        buf
    }

    #[test]
    fn test_parse_pts_only() {
        let header = PesHeader::parse(&header_with(0x80, &[90_000])).unwrap();
        assert_eq!(header.stream_id, 0xe0);
        assert_eq!(header.pts, Some(90_000));
        assert_eq!(header.dts, None);
    }

    #[test]
    fn test_parse_pts_and_dts() {
        let header = PesHeader::parse(&header_with(0xc0, &[273_000, 270_000])).unwrap();
        assert_eq!(header.pts, Some(273_000));
        assert_eq!(header.dts, Some(270_000));
    }

    #[test]
    fn test_parse_no_timestamps() {
        let header = PesHeader::parse(&header_with(0x00, &[])).unwrap();
        assert_eq!(header.pts, None);
        assert_eq!(header.dts, None);
    }

    #[test]
    fn test_bad_start_code() {
        let mut buf = header_with(0x80, &[0]);
        buf[2] = 0x02;
        assert_eq!(
            PesHeader::parse(&buf).unwrap_err(),
            PacketError::BadPesStartCode
        );
    }

    #[test]
    fn test_timestamp_extremes() {
        assert_eq!(decode_timestamp(&encode_timestamp(0x20, 0)), 0);
        let max = (1u64 << 33) - 1;
        assert_eq!(decode_timestamp(&encode_timestamp(0x20, max)), max);
    }

    #[quickcheck]
    fn prop_timestamp_round_trip(ts: u64) -> bool {
        let ts = ts & 0x1_ffff_ffff;
        decode_timestamp(&encode_timestamp(0x30, ts)) == ts
    }
}
