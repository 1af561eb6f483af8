//! Construction of trace records
//!
//! The stream decoder and the payload decoders never build records directly.
//! They feed fields into a [`LineBuilder`] as they are parsed, and collect the
//! finished record with [`LineBuilder::take_result`]. Skipped bytes are
//! accumulated on the same builder so they share the line numbering.

use crate::types::{
    id_to_string, ControlMessage, DltArg, DltLine, DltType, Payload, SkippedLine, Timestamp,
    TraceRecord,
};
use chrono::DateTime;
use std::time::Duration;

/// Incremental builder for decoded lines and skipped records
pub trait LineBuilder {
    /// Clear the fields of the current line
    ///
    /// The running line number and the accumulated skipped bytes survive a
    /// reset. The time stamp does not: the transport sets it again per frame.
    fn reset(&mut self);

    fn set_position(&mut self, position: i64);
    fn set_length(&mut self, length: usize);
    fn set_timestamp(&mut self, timestamp: Timestamp);
    /// ECU id of the storage header, used when the standard header has none
    fn set_storage_ecu_id(&mut self, id: [u8; 4]);
    fn set_ecu_id(&mut self, id: [u8; 4]);
    fn set_session_id(&mut self, id: u32);
    fn set_device_timestamp(&mut self, timestamp: Duration);
    fn set_count(&mut self, count: u8);
    fn set_big_endian(&mut self, big_endian: bool);
    fn big_endian(&self) -> bool;
    fn set_verbose(&mut self, verbose: bool);
    fn verbose(&self) -> bool;
    fn set_message_type(&mut self, message_type: DltType);
    fn message_type(&self) -> Option<DltType>;
    fn set_application_id(&mut self, id: [u8; 4]);
    fn set_context_id(&mut self, id: [u8; 4]);
    fn set_number_of_args(&mut self, count: u8);
    fn number_of_args(&self) -> u8;

    fn set_message_id(&mut self, message_id: u32);
    fn add_argument(&mut self, arg: DltArg);
    /// Drop arguments added so far, keeping the header fields
    fn reset_arguments(&mut self);
    fn set_control_message(&mut self, message: ControlMessage);

    /// Record why decoding the payload failed
    fn set_error_message(&mut self, message: String);
    fn error_message(&self) -> Option<&str>;

    /// Account for bytes that could not be decoded
    ///
    /// Consecutive calls extend one pending run; `position` and `reason` of the
    /// first call are kept.
    fn add_skipped_bytes(&mut self, position: i64, bytes: usize, reason: &str);
    /// Bytes in the pending skipped run
    fn skipped_bytes(&self) -> usize;

    /// Finish the current line
    fn take_result(&mut self) -> TraceRecord;
    /// Finish the pending skipped run, if any
    fn take_skipped_result(&mut self) -> Option<TraceRecord>;
}

/// Default builder producing [`TraceRecord`]s
#[derive(Debug, Clone, Default)]
pub struct DltLineBuilder {
    line: u64,

    position: i64,
    length: usize,
    timestamp: Option<Timestamp>,
    device_timestamp: Option<Duration>,
    ecu_id: Option<[u8; 4]>,
    storage_ecu_id: Option<[u8; 4]>,
    session_id: Option<u32>,
    count: u8,
    big_endian: bool,
    verbose: bool,
    message_type: Option<DltType>,
    application_id: Option<[u8; 4]>,
    context_id: Option<[u8; 4]>,
    number_of_args: u8,
    message_id: Option<u32>,
    args: Vec<DltArg>,
    control: Option<ControlMessage>,
    error_message: Option<String>,

    skipped_position: i64,
    skipped_bytes: usize,
    skipped_reason: Option<String>,

    last_timestamp: Option<Timestamp>,
    last_device_timestamp: Option<Duration>,
    last_ecu_id: Option<String>,
}

impl DltLineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of the next record
    pub fn line(&self) -> u64 {
        self.line
    }

    fn effective_ecu_id(&self) -> Option<String> {
        self.ecu_id.or(self.storage_ecu_id).map(id_to_string)
    }

    fn build_payload(&mut self) -> Payload {
        let args = std::mem::take(&mut self.args);
        if let Some(control) = self.control.take() {
            Payload::Control(control)
        } else if self.verbose {
            Payload::Verbose(args)
        } else {
            Payload::NonVerbose {
                message_id: self.message_id.unwrap_or(0),
                args,
            }
        }
    }
}

/// Convert a storage header time stamp (seconds and microseconds since the epoch)
///
/// Microseconds of a second or more carry into the seconds.
pub fn storage_timestamp(seconds: u32, microseconds: u32) -> Timestamp {
    let seconds = seconds as i64 + (microseconds / 1_000_000) as i64;
    let nanos = (microseconds % 1_000_000) * 1_000;
    // Always in range: at most u32::MAX + 4294 seconds
    DateTime::from_timestamp(seconds, nanos).unwrap_or_default()
}

impl LineBuilder for DltLineBuilder {
    fn reset(&mut self) {
        self.position = 0;
        self.length = 0;
        self.timestamp = None;
        self.device_timestamp = None;
        self.ecu_id = None;
        self.storage_ecu_id = None;
        self.session_id = None;
        self.count = 0;
        self.verbose = false;
        self.message_type = None;
        self.application_id = None;
        self.context_id = None;
        self.number_of_args = 0;
        self.message_id = None;
        self.args.clear();
        self.control = None;
        self.error_message = None;
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn set_length(&mut self, length: usize) {
        self.length = length;
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = Some(timestamp);
    }

    fn set_storage_ecu_id(&mut self, id: [u8; 4]) {
        self.storage_ecu_id = Some(id);
    }

    fn set_ecu_id(&mut self, id: [u8; 4]) {
        self.ecu_id = Some(id);
    }

    fn set_session_id(&mut self, id: u32) {
        self.session_id = Some(id);
    }

    fn set_device_timestamp(&mut self, timestamp: Duration) {
        self.device_timestamp = Some(timestamp);
    }

    fn set_count(&mut self, count: u8) {
        self.count = count;
    }

    fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    fn big_endian(&self) -> bool {
        self.big_endian
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn set_message_type(&mut self, message_type: DltType) {
        self.message_type = Some(message_type);
    }

    fn message_type(&self) -> Option<DltType> {
        self.message_type
    }

    fn set_application_id(&mut self, id: [u8; 4]) {
        self.application_id = Some(id);
    }

    fn set_context_id(&mut self, id: [u8; 4]) {
        self.context_id = Some(id);
    }

    fn set_number_of_args(&mut self, count: u8) {
        self.number_of_args = count;
    }

    fn number_of_args(&self) -> u8 {
        self.number_of_args
    }

    fn set_message_id(&mut self, message_id: u32) {
        self.message_id = Some(message_id);
    }

    fn add_argument(&mut self, arg: DltArg) {
        self.args.push(arg);
    }

    fn reset_arguments(&mut self) {
        self.args.clear();
        self.message_id = None;
        self.error_message = None;
    }

    fn set_control_message(&mut self, message: ControlMessage) {
        self.control = Some(message);
    }

    fn set_error_message(&mut self, message: String) {
        self.error_message = Some(message);
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn add_skipped_bytes(&mut self, position: i64, bytes: usize, reason: &str) {
        if bytes == 0 {
            return;
        }
        if self.skipped_bytes == 0 {
            self.skipped_position = position;
            self.skipped_reason = if reason.is_empty() {
                None
            } else {
                Some(reason.to_string())
            };
        }
        self.skipped_bytes += bytes;
    }

    fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }

    fn take_result(&mut self) -> TraceRecord {
        let payload = self.build_payload();
        let line = DltLine {
            line: self.line,
            position: self.position,
            length: self.length,
            timestamp: self.timestamp,
            device_timestamp: self.device_timestamp,
            ecu_id: self.effective_ecu_id(),
            session_id: self.session_id,
            count: self.count,
            big_endian: self.big_endian,
            verbose: self.verbose,
            message_type: self.message_type,
            application_id: self.application_id.map(id_to_string),
            context_id: self.context_id.map(id_to_string),
            number_of_args: self.number_of_args,
            payload,
        };

        self.last_timestamp = line.timestamp;
        self.last_device_timestamp = line.device_timestamp;
        self.last_ecu_id = line.ecu_id.clone();
        self.line += 1;
        TraceRecord::Line(line)
    }

    fn take_skipped_result(&mut self) -> Option<TraceRecord> {
        if self.skipped_bytes == 0 {
            return None;
        }

        let skipped = SkippedLine {
            line: self.line,
            position: self.skipped_position,
            bytes: self.skipped_bytes,
            reason: self.skipped_reason.take().unwrap_or_default(),
            timestamp: self.last_timestamp,
            device_timestamp: self.last_device_timestamp,
            ecu_id: self.last_ecu_id.clone(),
        };
        self.skipped_bytes = 0;
        self.line += 1;
        Some(TraceRecord::Skipped(skipped))
    }
}
