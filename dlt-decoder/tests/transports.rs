// End-to-end decoding of storage, serial and network streams
mod common;

use chrono::DateTime;
use common::*;
use dlt_decoder::frame_cache::FrameCache;
use dlt_decoder::{
    DecodeStream, DecoderError, DltArg, LineBuilder, Payload, PayloadDecoder, Result, TraceRecord,
};
use std::time::Duration;

fn storage_trace() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(storage(
        &verbose_packet(b"ECU1", b"APP1", b"CTX1", 1234, "first"),
        1_700_000_000,
        250_000,
        b"STOR",
    ));
    data.extend(storage(&non_verbose_packet(42, &[1, 2, 3, 4]), 1_700_000_001, 0, b"STOR"));
    data.extend(storage(
        &verbose_packet(b"ECU2", b"APP2", b"CTX2", 5678, "third"),
        1_700_000_002,
        999_999,
        b"STOR",
    ));
    data
}

#[test]
fn test_storage_file_fields() {
    let data = storage_trace();
    let records = decode_chunked(&mut DecodeStream::storage(), &data, data.len());
    assert_eq!(records.len(), 3);
    assert_accounted(&records, data.len());

    let first = records[0].as_line().unwrap();
    assert_eq!(first.position, 0);
    assert_eq!(
        first.timestamp,
        DateTime::from_timestamp(1_700_000_000, 250_000_000)
    );
    // ECU id of the standard header wins over the storage header
    assert_eq!(first.ecu_id.as_deref(), Some("ECU1"));
    assert_eq!(first.device_timestamp, Some(Duration::from_micros(123_400)));
    assert_eq!(first.application_id.as_deref(), Some("APP1"));
    assert_eq!(
        first.payload,
        Payload::Verbose(vec![DltArg::String("first".to_string())])
    );

    let second = records[1].as_line().unwrap();
    assert_eq!(second.position, first.length as i64);
    assert_eq!(second.ecu_id.as_deref(), Some("STOR"));
    assert_eq!(second.device_timestamp, None);
    assert_eq!(
        second.payload,
        Payload::NonVerbose {
            message_id: 42,
            args: vec![DltArg::Raw(vec![1, 2, 3, 4])]
        }
    );
}

#[test]
fn test_storage_chunking_invariance() {
    let mut data = vec![0xAA; 7];
    data.extend(storage_trace());
    data.extend_from_slice(b"DLT");

    let reference = decode_chunked(&mut DecodeStream::storage(), &data, data.len());
    assert_accounted(&reference, data.len());
    for chunk in 1..data.len() {
        let records = decode_chunked(&mut DecodeStream::storage(), &data, chunk);
        assert_eq!(records, reference, "chunk size {}", chunk);
    }
}

#[test]
fn test_storage_resync_after_garbage() {
    let packet = non_verbose_packet(7, &[]);
    let mut data = vec![0xAA; 7];
    data.extend(storage(&packet, 1_700_000_000, 0, b"ECU1"));
    // A marker followed by garbage instead of a storage header
    data.extend_from_slice(b"DLT\x01");
    data.extend_from_slice(&[0xFF; 4]);
    data.extend(storage(&packet, 1_700_000_000, 0, b"ECU1"));

    let records = decode_chunked(&mut DecodeStream::storage(), &data, 5);
    assert_accounted(&records, data.len());
    assert_eq!(records.len(), 4);

    let skipped = records[0].as_skipped().unwrap();
    assert_eq!((skipped.position, skipped.bytes), (0, 7));
    assert_eq!(skipped.reason, "Searching for next packet");
    assert_eq!(skipped.timestamp, None);

    assert_eq!(records[1].position(), 7);

    let skipped = records[2].as_skipped().unwrap();
    assert_eq!((skipped.position, skipped.bytes), (31, 8));
    assert_eq!(skipped.reason, "Invalid packet standard header");
    // Context of the last decoded line
    assert_eq!(skipped.ecu_id.as_deref(), Some("ECU1"));
    assert!(skipped.timestamp.is_some());

    assert_eq!(records[3].position(), 39);
    assert!(!records[3].is_skipped());
}

#[test]
fn test_storage_microseconds_carry_into_seconds() {
    let packet = non_verbose_packet(1, &[]);
    let mut data = storage(&packet, 1_700_000_000, 0, b"ECU1");
    data.extend(storage(&packet, 1_700_000_000, 3_000_000, b"ECU1"));

    let records = decode_chunked(&mut DecodeStream::storage(), &data, data.len());
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].as_line().unwrap().timestamp,
        DateTime::from_timestamp(1_700_000_000, 0)
    );
    assert_eq!(
        records[1].as_line().unwrap().timestamp,
        DateTime::from_timestamp(1_700_000_003, 0)
    );
}

#[test]
fn test_corrupted_frame_costs_at_most_one_frame() {
    let frames: Vec<Vec<u8>> = ["first", "second", "third", "fourth"]
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let packet = verbose_packet(b"ECU1", b"APP1", b"CTX1", i as u32, text);
            storage(&packet, 1_700_000_000 + i as u32, 0, b"ECU1")
        })
        .collect();
    let starts: Vec<usize> = frames
        .iter()
        .scan(0, |offset, frame| {
            let start = *offset;
            *offset += frame.len();
            Some(start)
        })
        .collect();
    let clean = frames.concat();

    for flipped in starts[1]..starts[2] {
        let mut data = clean.clone();
        data[flipped] ^= 0xFF;

        let records = decode_chunked(&mut DecodeStream::storage(), &data, 13);
        assert_accounted(&records, data.len());

        let skipped: usize = records
            .iter()
            .filter_map(|r| r.as_skipped())
            .map(|s| s.bytes)
            .sum();
        assert!(
            skipped <= frames[1].len(),
            "byte {} flipped: {} bytes skipped",
            flipped,
            skipped
        );

        for &start in &[starts[0], starts[2], starts[3]] {
            let line = records
                .iter()
                .filter_map(|r| r.as_line())
                .find(|line| line.position == start as i64);
            assert!(line.is_some(), "byte {} flipped: no line at {}", flipped, start);
        }
    }
}

#[test]
fn test_largest_frame_across_chunks() {
    // Declared length 65535: 8 header bytes plus the payload
    let big = non_verbose_packet(0xBEEF, &vec![0x5A; 65_535 - 8]);
    let mut data = storage(&big, 1_700_000_000, 0, b"ECU1");
    let first_length = data.len();
    assert_eq!(first_length, 16 + 65_535);
    data.extend(storage(&non_verbose_packet(2, &[1]), 1_700_000_001, 0, b"ECU1"));
    assert!(data.len() <= FrameCache::for_dlt().capacity());

    for chunk in [1_000, 4_096, 65_537] {
        let mut stream = DecodeStream::storage();
        let mut records = Vec::new();
        for (i, part) in data.chunks(chunk).enumerate() {
            records.extend(stream.decode(part, (i * chunk) as i64).unwrap());
        }
        assert_eq!(stream.cached_bytes(), 0, "chunk size {}", chunk);
        records.extend(stream.flush().unwrap());

        assert_eq!(records.len(), 2, "chunk size {}", chunk);
        assert_accounted(&records, data.len());
        let line = records[0].as_line().unwrap();
        assert_eq!(line.length, first_length);
        match &line.payload {
            Payload::NonVerbose { message_id, args } => {
                assert_eq!(*message_id, 0xBEEF);
                assert_eq!(args, &vec![DltArg::Raw(vec![0x5A; 65_535 - 8])]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(records[1].position(), first_length as i64);
    }
}

#[test]
fn test_storage_truncated_tail() {
    let full = storage(&non_verbose_packet(1, &[0; 8]), 1, 0, b"ECU1");
    let mut data = full.clone();
    data.extend_from_slice(&full[..full.len() - 3]);

    let records = decode_chunked(&mut DecodeStream::storage(), &data, 64);
    assert_eq!(records.len(), 2);
    assert_accounted(&records, data.len());

    let skipped = records[1].as_skipped().unwrap();
    assert_eq!(skipped.position, full.len() as i64);
    assert_eq!(skipped.bytes, full.len() - 3);
    assert_eq!(skipped.reason, "Incomplete packet at end of stream");
}

#[test]
fn test_serial_stream() {
    let mut data = Vec::new();
    data.extend(serial(&verbose_packet(b"ECU1", b"APP1", b"CTX1", 10, "a")));
    data.extend_from_slice(&[0x00, 0x44, 0x4C]);
    data.extend(serial(&non_verbose_packet(3, &[9])));

    let reference = decode_chunked(&mut DecodeStream::serial(), &data, data.len());
    assert_accounted(&reference, data.len());
    assert_eq!(reference.len(), 3);
    assert_eq!(reference[1].as_skipped().unwrap().bytes, 3);

    let line = reference[2].as_line().unwrap();
    assert_eq!(line.timestamp, None);
    assert_eq!(line.ecu_id, None);

    for chunk in 1..data.len() {
        let records = decode_chunked(&mut DecodeStream::serial(), &data, chunk);
        assert_eq!(records, reference, "chunk size {}", chunk);
    }
}

#[test]
fn test_network_online_timestamps() {
    let packet = non_verbose_packet(1, &[]);
    let records = DecodeStream::network(true).decode(&packet, 0).unwrap();
    assert!(records[0].as_line().unwrap().timestamp.is_some());

    let records = DecodeStream::network(false).decode(&packet, 0).unwrap();
    assert!(records[0].as_line().unwrap().timestamp.is_none());
}

#[test]
fn test_positions_with_offset_start() {
    let data = storage_trace();
    let mut stream = DecodeStream::storage();
    let mut records = stream.decode(&data[..30], 1000).unwrap();
    records.extend(stream.decode(&data[30..], 1030).unwrap());
    records.extend(stream.flush().unwrap());

    let first_length = records[0].stream_length() as i64;
    assert_eq!(records[0].position(), 1000);
    assert_eq!(records[1].position(), 1000 + first_length);
}

/// Non-verbose decoder that rejects every message
struct Rejecting;

impl PayloadDecoder for Rejecting {
    fn decode(&mut self, _payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize> {
        builder.add_argument(DltArg::Bool(true));
        Ok(0)
    }
}

#[test]
fn test_non_verbose_fallback_to_raw_bytes() {
    let data = non_verbose_packet(0x10, &[0xAB, 0xCD]);
    let mut stream = DecodeStream::network(false).with_non_verbose_decoder(Rejecting);
    let records = decode_chunked(&mut stream, &data, data.len());

    assert_eq!(records.len(), 1);
    match &records[0] {
        TraceRecord::Line(line) => assert_eq!(
            line.payload,
            Payload::NonVerbose {
                message_id: 0x10,
                args: vec![DltArg::Raw(vec![0xAB, 0xCD])]
            }
        ),
        other => panic!("expected a line, got {:?}", other),
    }
}

/// Verbose decoder reporting the payload size instead of arguments
struct PayloadSize;

impl PayloadDecoder for PayloadSize {
    fn decode(&mut self, payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize> {
        builder.add_argument(DltArg::Unsigned(payload.len() as u64));
        Ok(payload.len())
    }
}

#[test]
fn test_custom_verbose_decoder() {
    let packet = verbose_packet(b"ECU1", b"APP1", b"CTX1", 0, "text");
    let mut stream = DecodeStream::network(false).with_verbose_decoder(PayloadSize);
    let records = decode_chunked(&mut stream, &packet, packet.len());

    assert_eq!(records.len(), 1);
    // Type info, string length, "text" and its terminator
    assert_eq!(
        records[0].as_line().unwrap().payload,
        Payload::Verbose(vec![DltArg::Unsigned(4 + 2 + 5)])
    );
}

/// Control decoder that fails on every payload
struct Failing;

impl PayloadDecoder for Failing {
    fn decode(&mut self, _payload: &[u8], _builder: &mut dyn LineBuilder) -> Result<usize> {
        Err(DecoderError::Payload("unsupported service".to_string()))
    }
}

#[test]
fn test_custom_control_decoder() {
    // get_default_log_level response
    let payload = [0x04, 0x00, 0x00, 0x00, 0x00, 0x04];
    let mut packet = vec![0x21, 0x00, 0x00, (4 + 10 + payload.len()) as u8, 0x26, 0x00];
    packet.extend_from_slice(b"DA1\0DC1\0");
    packet.extend_from_slice(&payload);

    let records = decode_chunked(&mut DecodeStream::network(false), &packet, packet.len());
    assert!(matches!(
        records[0].as_line().unwrap().payload,
        Payload::Control(_)
    ));

    let mut stream = DecodeStream::network(false).with_control_decoder(Failing);
    let records = decode_chunked(&mut stream, &packet, packet.len());
    assert!(records.iter().all(|r| r.is_skipped()));
    assert_accounted(&records, packet.len());
    assert_eq!(records[0].as_skipped().unwrap().reason, "Invalid packet");
}
