//! Transport stream demuxer core.
//!
//! [`Demuxer`] consumes 188-byte TS or 192-byte M2TS packets, resolves the
//! program tables, reassembles PES headers across packet boundaries and
//! routes elementary-stream payload to per-track output files. Feed it
//! packet by packet with [`Demuxer::demux_packet`] or point it at a file
//! with [`Demuxer::demux_file`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::codec::FrameCounter;
use crate::config::{DemuxConfig, DumpLevel};
use crate::error::{DemuxError, PacketError, Result};
use crate::utils::{be16, be32, be8};

use super::pes::{PesHeader, PES_PREFIX_LEN};
use super::psi::{parse_pat, parse_pmt, PatEntry};
use super::section::SectionBuffer;
use super::summary::{ticks_to_ms, Summary, TrackSummary};
use super::timecode;
use super::types::{
    is_av_stream_type, is_video_stream_type, Framing, StreamKind, CHANNEL_UNSET, M2TS_PACKET_SIZE,
    PID_NULL, PID_PAT, PTS_HZ, STREAM_TYPE_NOT_ES, SYNC_BYTE, TABLE_ID_PAT, TABLE_ID_PMT,
    TS_HEADER_SIZE, TS_PACKET_SIZE,
};

type Sink = BufWriter<File>;

/// Per-PID stream state.
///
/// A PID starts life as a PSI carrier (PAT reference or unresolved PMT) and
/// becomes an elementary stream once a PMT entry assigns it a stream type.
/// The section buffer is shared between the two phases: it reassembles
/// PAT/PMT sections while the PID is tables, PES header prefixes once it is
/// payload.
#[derive(Debug, Default)]
pub struct Stream {
    channel: u16,
    id: u8,
    stream_type: u8,
    stream_id: u8,
    psi: SectionBuffer,
    decode_time: u64,
    first_decode_time: u64,
    first_pts: u64,
    last_pts: u64,
    frame_length: u64,
    frame_count: u64,
    counter: FrameCounter,
    sink: Option<Sink>,
}

impl Stream {
    fn new() -> Self {
        Self {
            channel: CHANNEL_UNSET,
            stream_type: STREAM_TYPE_NOT_ES,
            ..Default::default()
        }
    }

    /// Program number, or `CHANNEL_UNSET` before the PAT names one.
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Ordinal within the program, assigned in PMT order starting at 1.
    pub fn ordinal(&self) -> u8 {
        self.id
    }

    /// Raw PMT stream type byte, `STREAM_TYPE_NOT_ES` for table PIDs.
    pub fn stream_type(&self) -> u8 {
        self.stream_type
    }

    /// PES stream id byte from the last reassembled header.
    pub fn stream_id(&self) -> u8 {
        self.stream_id
    }

    /// Completed PES packets observed on this PID.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Elementary-stream frame boundaries counted so far.
    pub fn es_frames(&self) -> u64 {
        self.counter.frames()
    }

    /// First presentation timestamp seen, 0 until one arrives.
    pub fn first_pts(&self) -> u64 {
        self.first_pts
    }

    /// Largest presentation timestamp seen.
    pub fn last_pts(&self) -> u64 {
        self.last_pts
    }

    /// Last observed decode-time delta between consecutive PES packets.
    pub fn frame_length(&self) -> u64 {
        self.frame_length
    }

    fn is_psi(&self) -> bool {
        self.channel != CHANNEL_UNSET && self.stream_type == STREAM_TYPE_NOT_ES
    }

    fn is_es(&self) -> bool {
        self.stream_type != STREAM_TYPE_NOT_ES
    }

    fn reset_timing(&mut self) {
        self.psi.reset();
        self.stream_id = 0;
        self.decode_time = 0;
        self.first_decode_time = 0;
        self.first_pts = 0;
        self.last_pts = 0;
        self.frame_length = 0;
        self.frame_count = 0;
        self.counter.reset();
    }

    /// Consumes one packet's worth of PES payload.
    ///
    /// A payload-unit-start packet opens reassembly of the 9-byte fixed
    /// prefix; once byte 8 (the optional-field length) is in hand the
    /// target grows to cover the whole header, which may take further
    /// packets. On completion the header is decoded and the remaining
    /// bytes, plus every later continuation packet, go to the sink as
    /// elementary stream. Returns the fps estimate when this packet
    /// produced a fresh video frame-length reading.
    async fn handle_pes(
        &mut self,
        cfg: &DemuxConfig,
        hdmv: bool,
        pid: u16,
        packet_no: u64,
        pusi: bool,
        payload: &[u8],
    ) -> Result<Option<f64>> {
        let mut pos = 0usize;
        if pusi {
            self.psi.begin(PES_PREFIX_LEN).map_err(|e| e.at(packet_no))?;
        }
        while self.psi.pending() {
            if pos >= payload.len() {
                // header continues in the next packet
                return Ok(None);
            }
            pos += self.psi.fill(&payload[pos..]).map_err(|e| e.at(packet_no))?;
            if self.psi.used() == PES_PREFIX_LEN && self.psi.target() == PES_PREFIX_LEN {
                let optional = be8(self.psi.bytes(), 8) as usize;
                self.psi.extend_target(optional).map_err(|e| e.at(packet_no))?;
            }
        }

        let mut fps = None;
        if self.psi.is_complete() {
            let header = PesHeader::parse(self.psi.bytes()).map_err(|e| e.at(packet_no))?;
            self.stream_id = header.stream_id;
            self.frame_count += 1;

            if let Some(pts) = header.pts {
                let decode_time = header.dts.unwrap_or(pts);
                if self.decode_time > 0 && decode_time > self.decode_time {
                    self.frame_length = decode_time - self.decode_time;
                    if is_video_stream_type(self.stream_type, hdmv) && self.frame_length > 0 {
                        fps = Some(PTS_HZ as f64 / self.frame_length as f64);
                    }
                }
                self.decode_time = decode_time;
                if self.first_decode_time == 0 {
                    self.first_decode_time = decode_time;
                }
                if self.first_pts == 0 {
                    self.first_pts = pts;
                }
                if pts > self.last_pts {
                    self.last_pts = pts;
                }

                match cfg.dump {
                    DumpLevel::Timestamps => match header.dts {
                        Some(dts) => log::debug!("{pid:#06x}: pts={pts} dts={dts}"),
                        None => log::debug!("{pid:#06x}: pts={pts}"),
                    },
                    DumpLevel::Tracks => {
                        let line = format!(
                            "{:#06x}: track={}.{}, type={:#04x}, stream={:#04x}, pts={}ms",
                            pid,
                            self.channel,
                            self.id,
                            self.stream_type,
                            self.stream_id,
                            ticks_to_ms(pts)
                        );
                        match header.dts {
                            Some(dts) => log::debug!("{line}, dts={}ms", ticks_to_ms(dts)),
                            None => log::debug!("{line}"),
                        }
                    }
                    _ => {}
                }
            }

            if cfg.pes_output {
                if let Some(sink) = self.sink.as_mut() {
                    sink.write_all(self.psi.bytes()).await?;
                }
            }
            self.psi.reset();
        }

        // payload before the first completed header is orphaned, drop it
        if self.frame_count > 0 {
            let es = &payload[pos..];
            if !es.is_empty() {
                if cfg.es_parse {
                    self.counter.count_boundaries(es);
                }
                if let Some(sink) = self.sink.as_mut() {
                    sink.write_all(es).await?;
                }
            }
        }
        Ok(fps)
    }
}

/// Collects a PSI section across packets.
///
/// On a payload-unit-start packet the pointer field is skipped, the table
/// id filtered to PAT/PMT and the 12-bit section length read behind its
/// fixed `0011` guard bits. A section that fits the packet is returned
/// immediately; a longer one opens reassembly and later continuation
/// packets append until the declared length is reached.
fn collect_section(
    buf: &mut SectionBuffer,
    pusi: bool,
    payload: &[u8],
) -> std::result::Result<Option<Vec<u8>>, PacketError> {
    if pusi {
        if payload.is_empty() {
            return Err(PacketError::ShortSectionHeader);
        }
        let skip = 1 + be8(payload, 0) as usize;
        if skip >= payload.len() {
            return Err(PacketError::ShortSectionHeader);
        }
        let data = &payload[skip..];
        let table_id = be8(data, 0);
        if table_id != TABLE_ID_PAT && table_id != TABLE_ID_PMT {
            return Ok(None);
        }
        if data.len() < 3 {
            return Err(PacketError::ShortSectionHeader);
        }
        let length_field = be16(data, 1);
        if length_field & 0x3000 != 0x3000 {
            return Err(PacketError::BadSectionHeader);
        }
        let section_len = (length_field & 0x0fff) as usize;
        let body = &data[3..];
        if section_len > body.len() {
            buf.begin(section_len)?;
            buf.fill(body)?;
            Ok(None)
        } else {
            Ok(Some(body[..section_len].to_vec()))
        }
    } else {
        if !buf.pending() {
            return Err(PacketError::NoPendingSection);
        }
        buf.fill(payload)?;
        if buf.is_complete() {
            let section = buf.bytes().to_vec();
            buf.reset();
            Ok(Some(section))
        } else {
            Ok(None)
        }
    }
}

/// Transport stream demultiplexer.
///
/// Holds the per-PID stream table, the run configuration and the resolved
/// framing. One instance can demux several inputs in a row; timing state
/// carries over unless [`reset`](Demuxer::reset) is called in between.
#[derive(Debug)]
pub struct Demuxer {
    config: DemuxConfig,
    hdmv: bool,
    streams: HashMap<u16, Stream>,
    video_fps: Option<f64>,
    base_time: u64,
    prefix: String,
    packets: u64,
}

impl Demuxer {
    /// Creates a demuxer with the given configuration.
    pub fn new(config: DemuxConfig) -> Self {
        let hdmv = config.hdmv.unwrap_or(false);
        let prefix = config.prefix.clone();
        Self {
            config,
            hdmv,
            streams: HashMap::new(),
            video_fps: None,
            base_time: 0,
            prefix,
            packets: 0,
        }
    }

    /// Creates a demuxer with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DemuxConfig::default())
    }

    /// The configuration this demuxer runs with.
    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    /// Packets consumed so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Whether the input is (or is forced to) HDMV 192-byte framing.
    pub fn is_hdmv(&self) -> bool {
        self.hdmv
    }

    /// The fps estimate from the most recent video frame-length reading.
    pub fn video_fps(&self) -> Option<f64> {
        self.video_fps
    }

    /// The stream state for a PID, if any packets resolved one.
    pub fn stream(&self, pid: u16) -> Option<&Stream> {
        self.streams.get(&pid)
    }

    /// Base timecode added to fixed-cadence timecode sequences.
    pub fn base_time(&self) -> u64 {
        self.base_time
    }

    /// Sets the base timecode, in 90 kHz ticks. Lets several inputs demuxed
    /// in a row share one output timeline.
    pub fn set_base_time(&mut self, ticks: u64) {
        self.base_time = ticks;
    }

    /// Clears timing and reassembly state while keeping the resolved
    /// stream table and open sinks, ready for the next input of the same
    /// capture.
    pub fn reset(&mut self) {
        for stream in self.streams.values_mut() {
            stream.reset_timing();
        }
        self.video_fps = None;
        self.packets = 0;
    }

    /// Demuxes one packet.
    ///
    /// `raw` must be exactly one packet under the resolved framing: 188
    /// bytes, or 192 with the arrival-timestamp prefix when HDMV. Errors
    /// carry the 1-based packet number; structural per-packet errors leave
    /// the stream table intact, so a caller running non-strict can drop the
    /// packet and continue.
    pub async fn demux_packet(&mut self, raw: &[u8]) -> Result<()> {
        let packet_no = self.packets + 1;
        let want = if self.hdmv { M2TS_PACKET_SIZE } else { TS_PACKET_SIZE };
        if raw.len() != want {
            return Err(DemuxError::TruncatedPacket {
                got: raw.len(),
                want,
                packet: packet_no,
            });
        }
        self.packets = packet_no;

        let (arrival, pkt) = if self.hdmv {
            (be32(raw, 0) & 0x3fff_ffff, &raw[4..])
        } else {
            (0, raw)
        };

        if be8(pkt, 0) != SYNC_BYTE {
            return Err(PacketError::BadSync.at(packet_no));
        }
        let pid_field = be16(pkt, 1);
        let flags = be8(pkt, 3);
        let transport_error = pid_field & 0x8000 != 0;
        let pusi = pid_field & 0x4000 != 0;
        let pid = pid_field & 0x1fff;
        let has_adaptation = flags & 0x20 != 0;
        let has_payload = flags & 0x10 != 0;
        let continuity = flags & 0x0f;

        if self.config.dump == DumpLevel::Packets {
            log::trace!(
                "{:#06x}: [{}{}{}{}] {}.{}",
                pid,
                if transport_error { 'e' } else { '-' },
                if has_payload { 'p' } else { '-' },
                if pusi { 's' } else { '-' },
                if has_adaptation { 'a' } else { '-' },
                arrival,
                continuity,
            );
        }

        if transport_error {
            return Err(PacketError::TransportError.at(packet_no));
        }
        if pid == PID_NULL || !has_payload {
            return Ok(());
        }

        let mut payload = &pkt[TS_HEADER_SIZE..];
        if has_adaptation {
            let skip = be8(payload, 0) as usize + 1;
            if skip >= payload.len() {
                return Err(PacketError::AdaptationOverrun.at(packet_no));
            }
            payload = &payload[skip..];
        }

        if pid == PID_PAT || self.streams.get(&pid).is_some_and(Stream::is_psi) {
            self.handle_psi(packet_no, pid, pusi, payload).await
        } else if let Some(stream) = self.streams.get_mut(&pid) {
            if stream.is_es() {
                let fps = stream
                    .handle_pes(&self.config, self.hdmv, pid, packet_no, pusi, payload)
                    .await?;
                if fps.is_some() {
                    self.video_fps = fps;
                }
            }
            Ok(())
        } else {
            // PID not referenced by any table, ignore
            Ok(())
        }
    }

    async fn handle_psi(
        &mut self,
        packet_no: u64,
        pid: u16,
        pusi: bool,
        payload: &[u8],
    ) -> Result<()> {
        let stream = self.streams.entry(pid).or_insert_with(Stream::new);
        let section = match collect_section(&mut stream.psi, pusi, payload) {
            Ok(Some(section)) => section,
            Ok(None) => return Ok(()),
            Err(e) => return Err(e.at(packet_no)),
        };

        if pid == PID_PAT {
            let programs = parse_pat(&section).map_err(|e| e.at(packet_no))?;
            log::debug!("pat: {} program(s)", programs.len());
            self.apply_pat(&programs);
            Ok(())
        } else {
            self.apply_pmt(packet_no, pid, &section).await
        }
    }

    /// Registers each selected program's PMT PID as a table carrier.
    fn apply_pat(&mut self, programs: &[PatEntry]) {
        for entry in programs {
            if self.config.channel != 0 && self.config.channel != entry.channel {
                continue;
            }
            let stream = self
                .streams
                .entry(entry.pid)
                .or_insert_with(Stream::new);
            stream.channel = entry.channel;
            stream.stream_type = STREAM_TYPE_NOT_ES;
        }
    }

    /// Applies a completed PMT section: assigns stream types, ordinals and
    /// codec counters, opening one output sink per new elementary stream.
    async fn apply_pmt(&mut self, packet_no: u64, pmt_pid: u16, section: &[u8]) -> Result<()> {
        let entries = parse_pmt(section).map_err(|e| e.at(packet_no))?;
        let (pmt_channel, mut next_id) = self
            .streams
            .get(&pmt_pid)
            .map(|s| (s.channel, s.id))
            .unwrap_or((CHANNEL_UNSET, 0));

        for entry in &entries {
            if self.config.av_only && !is_av_stream_type(entry.stream_type) {
                continue;
            }
            let kind = StreamKind::classify(entry.stream_type, self.hdmv);
            let name = format!("{}{}", self.prefix, kind.extension());
            let path = match &self.config.output_dir {
                Some(dir) => dir.join(&name),
                None => PathBuf::from(&name),
            };
            let parse_only = self.config.parse_only;

            let stream = self
                .streams
                .entry(entry.pid)
                .or_insert_with(Stream::new);
            if stream.channel == pmt_channel && stream.stream_type == entry.stream_type {
                // repeated PMT, nothing changed
                continue;
            }
            stream.channel = pmt_channel;
            stream.stream_type = entry.stream_type;
            next_id += 1;
            stream.id = next_id;
            stream.counter = FrameCounter::for_stream_type(entry.stream_type);
            if !parse_only && stream.sink.is_none() {
                let file = File::create(&path).await?;
                stream.sink = Some(BufWriter::new(file));
                log::info!(
                    "pid {:#06x} ({:?}) -> {}",
                    entry.pid,
                    kind,
                    path.display()
                );
            }
        }

        // ordinals continue across PMT updates for this program
        self.streams
            .entry(pmt_pid)
            .or_insert_with(Stream::new)
            .id = next_id;
        Ok(())
    }

    /// Demuxes a whole capture file.
    ///
    /// Framing is sniffed from the first packet unless forced in the
    /// configuration; an empty output prefix is derived from the file name.
    /// The read loop insists on whole packets, so a file that ends
    /// mid-packet fails with [`DemuxError::TruncatedPacket`]. Sinks are
    /// flushed before returning.
    pub async fn demux_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let mut reader = BufReader::new(file);
        self.prefix = effective_prefix(&self.config.prefix, path);

        let mut first = [0u8; M2TS_PACKET_SIZE];
        let framing = match self.config.hdmv {
            Some(forced) => {
                let framing = if forced { Framing::M2ts } else { Framing::Ts };
                let n = read_full(&mut reader, &mut first[..framing.packet_size()]).await?;
                if n == 0 {
                    return Ok(());
                }
                if n < framing.packet_size() {
                    return Err(DemuxError::TruncatedPacket {
                        got: n,
                        want: framing.packet_size(),
                        packet: 1,
                    });
                }
                framing
            }
            None => {
                let n = read_full(&mut reader, &mut first[..TS_PACKET_SIZE]).await?;
                if n == 0 {
                    return Ok(());
                }
                if n < TS_PACKET_SIZE {
                    return Err(DemuxError::TruncatedPacket {
                        got: n,
                        want: TS_PACKET_SIZE,
                        packet: 1,
                    });
                }
                let framing = Framing::sniff(&first[..TS_PACKET_SIZE])?;
                if framing == Framing::M2ts {
                    // the sniffed 188 bytes were prefix + partial packet
                    let m = read_full(&mut reader, &mut first[TS_PACKET_SIZE..]).await?;
                    if m < M2TS_PACKET_SIZE - TS_PACKET_SIZE {
                        return Err(DemuxError::TruncatedPacket {
                            got: TS_PACKET_SIZE + m,
                            want: M2TS_PACKET_SIZE,
                            packet: 1,
                        });
                    }
                }
                framing
            }
        };
        self.hdmv = framing.is_hdmv();
        log::debug!(
            "{}: {:?} framing, {} byte packets",
            path.display(),
            framing,
            framing.packet_size()
        );

        self.feed(&first[..framing.packet_size()]).await?;

        let mut packet = vec![0u8; framing.packet_size()];
        loop {
            let n = read_full(&mut reader, &mut packet).await?;
            if n == 0 {
                break;
            }
            if n < packet.len() {
                return Err(DemuxError::TruncatedPacket {
                    got: n,
                    want: packet.len(),
                    packet: self.packets + 1,
                });
            }
            self.feed(&packet).await?;
        }

        self.finish().await
    }

    async fn feed(&mut self, raw: &[u8]) -> Result<()> {
        match self.demux_packet(raw).await {
            Err(DemuxError::Packet { packet, source }) if !self.config.strict => {
                log::warn!("dropping packet {packet}: {source}");
                Ok(())
            }
            other => other,
        }
    }

    /// Flushes every open output sink.
    pub async fn finish(&mut self) -> Result<()> {
        for stream in self.streams.values_mut() {
            if let Some(sink) = stream.sink.as_mut() {
                sink.flush().await?;
            }
        }
        Ok(())
    }

    /// Builds the per-track report over every resolved elementary stream,
    /// ordered by PID.
    pub fn summary(&self) -> Summary {
        let mut resolved: Vec<(u16, &Stream)> = self
            .streams
            .iter()
            .filter(|(_, s)| s.is_es())
            .map(|(&pid, s)| (pid, s))
            .collect();
        resolved.sort_unstable_by_key(|&(pid, _)| pid);

        // earliest start and latest end across tracks, for head/tail skew
        let mut begin = 0u64;
        let mut end = 0u64;
        for (_, s) in &resolved {
            if begin == 0 || (s.first_pts > 0 && s.first_pts < begin) {
                begin = s.first_pts;
            }
            let track_end = s.last_pts + s.frame_length;
            if track_end > end {
                end = track_end;
            }
        }

        let tracks = resolved
            .into_iter()
            .map(|(pid, s)| {
                let track_end = s.last_pts + s.frame_length;
                TrackSummary {
                    pid,
                    channel: s.channel,
                    id: s.id,
                    stream_type: s.stream_type,
                    extension: StreamKind::classify(s.stream_type, self.hdmv).extension(),
                    stream_id: s.stream_id,
                    fps: (is_video_stream_type(s.stream_type, self.hdmv)
                        && s.frame_length > 0)
                        .then(|| PTS_HZ as f64 / s.frame_length as f64),
                    duration_ms: (track_end > s.first_pts)
                        .then(|| ticks_to_ms(track_end - s.first_pts)),
                    frame_count: s.frame_count,
                    es_frame_count: (s.counter.frames() > 0).then(|| s.counter.frames()),
                    head_ms: (s.first_pts > begin).then(|| ticks_to_ms(s.first_pts - begin)),
                    tail_ms: (track_end > 0 && track_end < end)
                        .then(|| ticks_to_ms(end - track_end)),
                }
            })
            .collect();
        Summary { tracks }
    }

    /// Writes the per-frame timecode sequence for one track as millisecond
    /// values, one per line.
    pub async fn write_timecodes<W: AsyncWrite + Unpin>(
        &self,
        pid: u16,
        writer: &mut W,
    ) -> Result<()> {
        let stream = self
            .streams
            .get(&pid)
            .filter(|s| s.is_es())
            .ok_or(DemuxError::UnknownPid(pid))?;
        let ticks = timecode::for_track(
            self.base_time,
            stream.first_pts,
            stream.last_pts,
            stream.frame_length,
            stream.frame_count,
        );
        timecode::write_ms(writer, &ticks).await
    }
}

/// Reads until `buf` is full or the reader hits EOF; returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Output prefix: the configured one verbatim, or the input file's basename
/// up to its first dot, with a trailing dot.
fn effective_prefix(configured: &str, path: &Path) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n))
        .unwrap_or("");
    if stem.is_empty() {
        String::new()
    } else {
        format!("{stem}.")
    }
}
