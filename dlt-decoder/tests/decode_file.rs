// Decoding files through the Decoder facade
mod common;

use common::*;
use dlt_decoder::{Decoder, DecoderConfig, InputFormat, TraceRecord};
use std::io::Write;

fn write_temp(suffix: &str, data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn trace() -> Vec<u8> {
    let mut data = Vec::new();
    for (i, app) in [b"APP1", b"APP2", b"APP1"].iter().enumerate() {
        let packet = verbose_packet(b"ECU1", app, b"CTX1", i as u32, "message");
        data.extend(storage(&packet, 1_700_000_000 + i as u32, 0, b"ECU1"));
    }
    data
}

#[test]
fn test_decode_dlt_file() {
    let _ = env_logger::builder().is_test(true).try_init();

    let data = trace();
    let file = write_temp(".dlt", &data);

    let config = DecoderConfig::new().with_chunk_size(7);
    let decoder = Decoder::with_config(config).unwrap();
    let mut records = decoder.decode_file(file.path()).unwrap();
    let decoded: Vec<TraceRecord> = records.by_ref().map(|r| r.unwrap()).collect();

    assert_eq!(decoded.len(), 3);
    assert_accounted(&decoded, data.len());
    assert_eq!(records.position(), data.len() as i64);
    assert_eq!(records.stats().lines, 3);
}

#[test]
fn test_format_guessed_from_extension() {
    let mut data = Vec::new();
    data.extend(serial(&non_verbose_packet(1, &[])));
    data.extend(serial(&non_verbose_packet(2, &[])));
    let file = write_temp(".dls", &data);

    let decoded: Vec<_> = Decoder::new()
        .decode_file(file.path())
        .unwrap()
        .collect::<dlt_decoder::Result<_>>()
        .unwrap();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.iter().all(|r| !r.is_skipped()));

    // Forcing the storage format finds no frame at all
    let config = DecoderConfig::new().with_format(InputFormat::File);
    let decoded: Vec<_> = Decoder::with_config(config)
        .unwrap()
        .decode_file(file.path())
        .unwrap()
        .collect::<dlt_decoder::Result<_>>()
        .unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].as_skipped().unwrap().bytes, data.len());
}

#[test]
fn test_application_filter() {
    let data = trace();
    let file = write_temp(".dlt", &data);

    let config = DecoderConfig::new().with_app_filter(vec!["APP1".to_string()]);
    let decoded: Vec<_> = Decoder::with_config(config)
        .unwrap()
        .decode_file(file.path())
        .unwrap()
        .collect::<dlt_decoder::Result<_>>()
        .unwrap();

    assert_eq!(decoded.len(), 2);
    for record in &decoded {
        assert_eq!(
            record.as_line().unwrap().application_id.as_deref(),
            Some("APP1")
        );
    }
    // Line numbers keep counting across filtered lines
    assert_eq!(decoded[1].line(), 2);
}

#[test]
fn test_empty_file() {
    let file = write_temp(".dlt", &[]);
    let mut records = Decoder::new().decode_file(file.path()).unwrap();
    assert!(records.next().is_none());
    assert_eq!(records.stats().bytes, 0);
}
