//! End-to-end demux runs over synthetic capture files.

use bytes::{BufMut, BytesMut};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Mutex;
use tsdemux::{DemuxConfig, DemuxError, Demuxer, DumpLevel, PacketError};

const PID_PAT: u16 = 0x0000;
const PID_PMT: u16 = 0x0020;
const PID_VIDEO: u16 = 0x0101;
const PID_AUDIO: u16 = 0x0102;

/// One 188-byte packet whose payload area holds exactly `payload`, padded
/// with an adaptation field so output byte comparisons stay exact.
fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    let af = 188 - 4 - 1 - payload.len();
    let mut pkt = vec![0xffu8; 188];
    pkt[0] = 0x47;
    pkt[1] = ((pid >> 8) as u8 & 0x1f) | if pusi { 0x40 } else { 0x00 };
    pkt[2] = pid as u8;
    pkt[3] = 0x30 | (cc & 0x0f);
    pkt[4] = af as u8;
    if af > 0 {
        pkt[5] = 0x00;
    }
    let start = 5 + af;
    pkt[start..start + payload.len()].copy_from_slice(payload);
    pkt
}

fn m2ts_packet(arrival: u32, ts: &[u8]) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(192);
    pkt.put_u32(arrival & 0x3fff_ffff);
    pkt.extend_from_slice(ts);
    pkt
}

fn psi_payload(table_id: u8, body: &[u8]) -> Vec<u8> {
    let mut p = vec![0x00, table_id];
    p.put_u16(0x3000 | body.len() as u16);
    p.extend_from_slice(body);
    p
}

fn pat_body(programs: &[(u16, u16)]) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u16(0x0001);
    body.put_u8(0xc1);
    body.put_u8(0x00);
    body.put_u8(0x00);
    for &(channel, pid) in programs {
        body.put_u16(channel);
        body.put_u16(pid | 0xe000);
    }
    body.put_u32(0); // CRC, not validated
    body.to_vec()
}

fn pmt_body(streams: &[(u8, u16)]) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u16(0x0001);
    body.put_u8(0xc1);
    body.put_u8(0x00);
    body.put_u8(0x00);
    body.put_u16(0x1001 | 0xe000); // PCR PID
    body.put_u16(0xf000); // no program info descriptors
    for &(stream_type, pid) in streams {
        body.put_u8(stream_type);
        body.put_u16(pid | 0xe000);
        body.put_u16(0xf000);
    }
    body.put_u32(0);
    body.to_vec()
}

fn stamp(marker: u8, ts: u64) -> [u8; 5] {
    let ts = ts & 0x1_ffff_ffff;
    [
        marker | ((ts >> 29) & 0x0e) as u8 | 0x01,
        (ts >> 22) as u8,
        ((ts >> 14) as u8 & 0xfe) | 0x01,
        (ts >> 7) as u8,
        ((ts << 1) as u8 & 0xfe) | 0x01,
    ]
}

/// PES packet payload: 14-byte header (PTS only) followed by ES bytes.
fn pes_payload(stream_id: u8, pts: u64, es: &[u8]) -> Vec<u8> {
    let mut p = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    p.extend_from_slice(&stamp(0x20, pts));
    p.extend_from_slice(es);
    p
}

/// PES packet payload carrying both PTS and DTS.
fn pes_payload_with_dts(stream_id: u8, pts: u64, dts: u64, es: &[u8]) -> Vec<u8> {
    let mut p = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0xc0, 0x0a];
    p.extend_from_slice(&stamp(0x30, pts));
    p.extend_from_slice(&stamp(0x10, dts));
    p.extend_from_slice(es);
    p
}

/// A minimal two-track capture: PAT, PMT, two video PES packets and one
/// audio PES packet. Returns the file bytes plus the expected ES output
/// of each track.
fn two_track_capture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let video_es_1 = [0x00, 0x00, 0x00, 0x01, 0x09, 0xf0, 0x11, 0x22];
    let video_es_2 = [0x00, 0x00, 0x00, 0x01, 0x09, 0xf0, 0x33, 0x44];
    let audio_es = *b"mpeg audio frame";

    let mut file = Vec::new();
    file.extend(ts_packet(
        PID_PAT,
        true,
        0,
        &psi_payload(0x00, &pat_body(&[(1, PID_PMT)])),
    ));
    file.extend(ts_packet(
        PID_PMT,
        true,
        0,
        &psi_payload(0x02, &pmt_body(&[(0x1b, PID_VIDEO), (0x03, PID_AUDIO)])),
    ));
    file.extend(ts_packet(
        PID_VIDEO,
        true,
        0,
        &pes_payload(0xe0, 90_000, &video_es_1),
    ));
    file.extend(ts_packet(
        PID_AUDIO,
        true,
        0,
        &pes_payload(0xc0, 90_000, &audio_es),
    ));
    file.extend(ts_packet(
        PID_VIDEO,
        true,
        1,
        &pes_payload(0xe0, 93_000, &video_es_2),
    ));

    let mut video_es = video_es_1.to_vec();
    video_es.extend_from_slice(&video_es_2);
    (file, video_es, audio_es.to_vec())
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tsdemux_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn test_demux_file_writes_one_sink_per_track() {
    let dir = scratch_dir("tracks");
    let (file, video_es, audio_es) = two_track_capture();
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let config = DemuxConfig::new()
        .with_prefix("cap.")
        .with_output_dir(&dir)
        .with_es_parse(true);
    let mut demuxer = Demuxer::new(config);
    demuxer.demux_file(&input).await.unwrap();

    assert_eq!(tokio::fs::read(dir.join("cap.264")).await.unwrap(), video_es);
    assert_eq!(tokio::fs::read(dir.join("cap.mp3")).await.unwrap(), audio_es);

    let summary = demuxer.summary();
    assert_eq!(summary.tracks.len(), 2);
    assert_eq!(summary.tracks[0].pid, PID_VIDEO);
    assert_eq!(summary.tracks[0].extension, "264");
    assert_eq!(summary.tracks[0].frame_count, 2);
    assert_eq!(summary.tracks[0].fps, Some(30.0));
    // each video payload opens with an access unit delimiter
    assert_eq!(summary.tracks[0].es_frame_count, Some(2));
    assert_eq!(summary.tracks[1].pid, PID_AUDIO);
    assert_eq!(summary.tracks[1].extension, "mp3");
    assert_eq!(summary.tracks[1].frame_count, 1);
    assert_eq!(demuxer.video_fps(), Some(30.0));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_prefix_derived_from_input_name() {
    let dir = scratch_dir("prefix");
    let (file, _, _) = two_track_capture();
    let input = dir.join("movie.main.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().with_output_dir(&dir));
    demuxer.demux_file(&input).await.unwrap();

    assert!(dir.join("movie.264").exists());
    assert!(dir.join("movie.mp3").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_pes_output_keeps_headers() {
    let dir = scratch_dir("pes");
    let (file, _, _) = two_track_capture();
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let config = DemuxConfig::new()
        .with_prefix("cap.")
        .with_output_dir(&dir)
        .with_pes_output(true);
    let mut demuxer = Demuxer::new(config);
    demuxer.demux_file(&input).await.unwrap();

    // full PES packets: both headers and both payloads, in arrival order
    let video_es_1 = [0x00, 0x00, 0x00, 0x01, 0x09, 0xf0, 0x11, 0x22];
    let video_es_2 = [0x00, 0x00, 0x00, 0x01, 0x09, 0xf0, 0x33, 0x44];
    let mut expected = pes_payload(0xe0, 90_000, &video_es_1);
    expected.extend(pes_payload(0xe0, 93_000, &video_es_2));
    assert_eq!(tokio::fs::read(dir.join("cap.264")).await.unwrap(), expected);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_m2ts_framing_autodetected() {
    let dir = scratch_dir("m2ts");
    let mut file = Vec::new();
    file.extend(m2ts_packet(
        1000,
        &ts_packet(PID_PAT, true, 0, &psi_payload(0x00, &pat_body(&[(1, PID_PMT)]))),
    ));
    // 0x80 is LPCM under HDMV framing
    file.extend(m2ts_packet(
        2000,
        &ts_packet(PID_PMT, true, 0, &psi_payload(0x02, &pmt_body(&[(0x80, PID_VIDEO)]))),
    ));
    let input = dir.join("cap.m2ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    demuxer.demux_file(&input).await.unwrap();

    assert!(demuxer.is_hdmv());
    assert_eq!(demuxer.packets(), 2);
    let summary = demuxer.summary();
    assert_eq!(summary.tracks.len(), 1);
    assert_eq!(summary.tracks[0].extension, "pcm");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_channel_filter_selects_one_program() {
    let dir = scratch_dir("channel");
    let mut file = Vec::new();
    file.extend(ts_packet(
        PID_PAT,
        true,
        0,
        &psi_payload(0x00, &pat_body(&[(1, 0x0020), (2, 0x0021)])),
    ));
    // program 1's PMT must be ignored, program 2's applied
    file.extend(ts_packet(
        0x0020,
        true,
        0,
        &psi_payload(0x02, &pmt_body(&[(0x1b, 0x0101)])),
    ));
    file.extend(ts_packet(
        0x0021,
        true,
        0,
        &psi_payload(0x02, &pmt_body(&[(0x03, 0x0201)])),
    ));
    let input = dir.join("multi.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only().with_channel(2));
    demuxer.demux_file(&input).await.unwrap();

    assert!(demuxer.stream(0x0101).is_none());
    let audio = demuxer.stream(0x0201).unwrap();
    assert_eq!(audio.channel(), 2);
    assert_eq!(audio.stream_type(), 0x03);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_strict_aborts_on_corrupt_packet() {
    let dir = scratch_dir("strict");
    let (mut file, _, _) = two_track_capture();
    // wreck the second packet's sync byte
    file[188] = 0x00;
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    let err = demuxer.demux_file(&input).await.unwrap_err();
    assert!(matches!(
        err,
        DemuxError::Packet {
            packet: 2,
            source: PacketError::BadSync
        }
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_non_strict_drops_corrupt_packet_and_continues() {
    let dir = scratch_dir("lenient");
    let (good, video_es, audio_es) = two_track_capture();
    let mut file = Vec::new();
    file.extend_from_slice(&good[..188]);
    file.extend(std::iter::repeat(0u8).take(188)); // no sync byte at all
    file.extend_from_slice(&good[188..]);
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let config = DemuxConfig::new()
        .with_prefix("cap.")
        .with_output_dir(&dir)
        .with_strict(false);
    let mut demuxer = Demuxer::new(config);
    demuxer.demux_file(&input).await.unwrap();

    assert_eq!(tokio::fs::read(dir.join("cap.264")).await.unwrap(), video_es);
    assert_eq!(tokio::fs::read(dir.join("cap.mp3")).await.unwrap(), audio_es);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_truncated_file_rejected() {
    let dir = scratch_dir("trunc");
    let (file, _, _) = two_track_capture();
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file[..188 + 100]).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    let err = demuxer.demux_file(&input).await.unwrap_err();
    assert!(matches!(
        err,
        DemuxError::TruncatedPacket {
            got: 100,
            want: 188,
            ..
        }
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_empty_file_is_a_clean_run() {
    let dir = scratch_dir("empty");
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, b"").await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    demuxer.demux_file(&input).await.unwrap();
    assert_eq!(demuxer.packets(), 0);
    assert!(demuxer.summary().tracks.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_unrecognized_framing_rejected() {
    let dir = scratch_dir("framing");
    let input = dir.join("noise.bin");
    tokio::fs::write(&input, vec![0u8; 188 * 2]).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    let err = demuxer.demux_file(&input).await.unwrap_err();
    assert!(matches!(err, DemuxError::UnrecognizedFraming));

    let _ = std::fs::remove_dir_all(&dir);
}

struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        self.lines.lock().unwrap().push(record.args().to_string());
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};

#[tokio::test]
async fn test_track_dump_reports_both_timestamps() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);

    let config = DemuxConfig::new().parse_only().with_dump(DumpLevel::Tracks);
    let mut demuxer = Demuxer::new(config);
    demuxer
        .demux_packet(&ts_packet(
            PID_PAT,
            true,
            0,
            &psi_payload(0x00, &pat_body(&[(1, PID_PMT)])),
        ))
        .await
        .unwrap();
    demuxer
        .demux_packet(&ts_packet(
            PID_PMT,
            true,
            0,
            &psi_payload(0x02, &pmt_body(&[(0x1b, PID_VIDEO)])),
        ))
        .await
        .unwrap();
    demuxer
        .demux_packet(&ts_packet(
            PID_VIDEO,
            true,
            0,
            &pes_payload_with_dts(0xe0, 93_003, 90_000, &[0x00]),
        ))
        .await
        .unwrap();

    let lines = LOGGER.lines.lock().unwrap();
    assert!(
        lines
            .iter()
            .any(|l| l.contains("track=1.1") && l.contains("pts=1033ms") && l.contains("dts=1000ms")),
        "missing track line with both timestamps: {lines:?}"
    );
    // the per-packet flag trace belongs to the packet dump level only
    assert!(lines.iter().all(|l| !l.contains('[')), "{lines:?}");
}

#[tokio::test]
async fn test_timecodes_for_demuxed_track() {
    let dir = scratch_dir("timecodes");
    let (file, _, _) = two_track_capture();
    let input = dir.join("cap.ts");
    tokio::fs::write(&input, &file).await.unwrap();

    let mut demuxer = Demuxer::new(DemuxConfig::new().parse_only());
    demuxer.demux_file(&input).await.unwrap();

    let mut out = Vec::new();
    demuxer.write_timecodes(PID_VIDEO, &mut out).await.unwrap();
    // 2 frames from pts 90000, 3000 ticks apart
    assert_eq!(String::from_utf8(out).unwrap(), "1000\n1033\n");

    let err = demuxer.write_timecodes(0x0999, &mut Vec::new()).await.unwrap_err();
    assert!(matches!(err, DemuxError::UnknownPid(0x0999)));

    let _ = std::fs::remove_dir_all(&dir);
}
