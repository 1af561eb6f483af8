// Packet builders shared by the integration tests
#![allow(dead_code)]

use dlt_decoder::{DecodeStream, TraceRecord};

/// Verbose log info packet with ECU id, device time stamp and one string argument
pub fn verbose_packet(ecu: &[u8; 4], app: &[u8; 4], ctx: &[u8; 4], ticks: u32, text: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0x0000_0200u32.to_le_bytes());
    payload.extend_from_slice(&((text.len() + 1) as u16).to_le_bytes());
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);

    let length = 4 + 4 + 4 + 10 + payload.len();
    // UEH | WEID | WTMS | version 1
    let mut packet = vec![0x35, 0x00];
    packet.extend_from_slice(&(length as u16).to_be_bytes());
    packet.extend_from_slice(ecu);
    packet.extend_from_slice(&ticks.to_be_bytes());
    packet.extend_from_slice(&[0x41, 0x01]);
    packet.extend_from_slice(app);
    packet.extend_from_slice(ctx);
    packet.extend_from_slice(&payload);
    packet
}

/// Non-verbose packet without extended header
pub fn non_verbose_packet(message_id: u32, data: &[u8]) -> Vec<u8> {
    let length = 4 + 4 + data.len();
    let mut packet = vec![0x20, 0x00];
    packet.extend_from_slice(&(length as u16).to_be_bytes());
    packet.extend_from_slice(&message_id.to_le_bytes());
    packet.extend_from_slice(data);
    packet
}

/// Prepend a storage header
pub fn storage(packet: &[u8], seconds: u32, microseconds: u32, ecu: &[u8; 4]) -> Vec<u8> {
    let mut frame = b"DLT\x01".to_vec();
    frame.extend_from_slice(&seconds.to_le_bytes());
    frame.extend_from_slice(&microseconds.to_le_bytes());
    frame.extend_from_slice(ecu);
    frame.extend_from_slice(packet);
    frame
}

/// Prepend the serial marker
pub fn serial(packet: &[u8]) -> Vec<u8> {
    let mut frame = b"DLS\x01".to_vec();
    frame.extend_from_slice(packet);
    frame
}

/// Feed `data` in chunks of `chunk` bytes, then flush
pub fn decode_chunked(stream: &mut DecodeStream, data: &[u8], chunk: usize) -> Vec<TraceRecord> {
    let mut records = Vec::new();
    for (i, part) in data.chunks(chunk).enumerate() {
        records.extend(stream.decode(part, (i * chunk) as i64).unwrap());
    }
    records.extend(stream.flush().unwrap());
    records
}

/// Every byte must be covered by exactly one record, in stream order
pub fn assert_accounted(records: &[TraceRecord], length: usize) {
    let mut expected = 0i64;
    for record in records {
        assert_eq!(record.position(), expected, "gap or overlap at {:?}", record);
        expected += record.stream_length() as i64;
    }
    assert_eq!(expected as usize, length);
}
