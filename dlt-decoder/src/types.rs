//! Core types for the DLT decoder library
//!
//! This module defines the records the decoder emits while processing a DLT byte
//! stream, the message type mapping of the extended header and the error type
//! shared by the whole crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur during decoding
///
/// Corrupted input is never reported through this type. Invalid frames are
/// discarded and surfaced as [`TraceRecord::Skipped`] records instead. The
/// variants here are either collaborator failures (which the stream decoder
/// turns into resynchronization) or resource/configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Frame cache overflow: {requested} bytes requested, capacity is {capacity}")]
    CacheOverflow { requested: usize, capacity: usize },

    #[error("Frame cache is locked after flush")]
    CacheLocked,

    #[error("Position map cannot grow beyond {0} entries")]
    PositionMapOverflow(usize),

    #[error("Payload decode error: {0}")]
    Payload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// DLT message type, from the MSTP and MTIN fields of the message info byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DltType {
    LogFatal,
    LogError,
    LogWarn,
    LogInfo,
    LogDebug,
    LogVerbose,
    AppTraceVariable,
    AppTraceFunctionIn,
    AppTraceFunctionOut,
    AppTraceState,
    AppTraceVfb,
    NwTraceIpc,
    NwTraceCan,
    NwTraceFlexray,
    NwTraceMost,
    NwTraceEthernet,
    NwTraceSomeIp,
    NwTraceUserDefined(u8),
    ControlRequest,
    ControlResponse,
    ControlTime,
    /// Combination of MSTP and MTIN not defined by the protocol (raw value kept)
    Unknown(u8),
}

impl DltType {
    /// Map the message info byte of the extended header (verbose bit ignored)
    pub fn from_message_info(message_info: u8) -> Self {
        match message_info & crate::header::MSIN_TYPE_INFO_MASK {
            0x10 => DltType::LogFatal,
            0x20 => DltType::LogError,
            0x30 => DltType::LogWarn,
            0x40 => DltType::LogInfo,
            0x50 => DltType::LogDebug,
            0x60 => DltType::LogVerbose,
            0x12 => DltType::AppTraceVariable,
            0x22 => DltType::AppTraceFunctionIn,
            0x32 => DltType::AppTraceFunctionOut,
            0x42 => DltType::AppTraceState,
            0x52 => DltType::AppTraceVfb,
            0x14 => DltType::NwTraceIpc,
            0x24 => DltType::NwTraceCan,
            0x34 => DltType::NwTraceFlexray,
            0x44 => DltType::NwTraceMost,
            0x54 => DltType::NwTraceEthernet,
            0x64 => DltType::NwTraceSomeIp,
            v @ 0x74..=0xF4 if v & 0x0F == 0x04 => DltType::NwTraceUserDefined((v >> 4) - 7),
            0x16 => DltType::ControlRequest,
            0x26 => DltType::ControlResponse,
            0x36 => DltType::ControlTime,
            v => DltType::Unknown(v),
        }
    }
}

impl fmt::Display for DltType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DltType::LogFatal => write!(f, "log fatal"),
            DltType::LogError => write!(f, "log error"),
            DltType::LogWarn => write!(f, "log warn"),
            DltType::LogInfo => write!(f, "log info"),
            DltType::LogDebug => write!(f, "log debug"),
            DltType::LogVerbose => write!(f, "log verbose"),
            DltType::AppTraceVariable => write!(f, "app_trace variable"),
            DltType::AppTraceFunctionIn => write!(f, "app_trace func_in"),
            DltType::AppTraceFunctionOut => write!(f, "app_trace func_out"),
            DltType::AppTraceState => write!(f, "app_trace state"),
            DltType::AppTraceVfb => write!(f, "app_trace vfb"),
            DltType::NwTraceIpc => write!(f, "nw_trace ipc"),
            DltType::NwTraceCan => write!(f, "nw_trace can"),
            DltType::NwTraceFlexray => write!(f, "nw_trace flexray"),
            DltType::NwTraceMost => write!(f, "nw_trace most"),
            DltType::NwTraceEthernet => write!(f, "nw_trace ethernet"),
            DltType::NwTraceSomeIp => write!(f, "nw_trace someip"),
            DltType::NwTraceUserDefined(n) => write!(f, "nw_trace user{}", n),
            DltType::ControlRequest => write!(f, "control request"),
            DltType::ControlResponse => write!(f, "control response"),
            DltType::ControlTime => write!(f, "control time"),
            DltType::Unknown(v) => write!(f, "unknown 0x{:02x}", v),
        }
    }
}

/// A single decoded verbose (or non-verbose raw) argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DltArg {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Raw(Vec<u8>),
}

impl fmt::Display for DltArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DltArg::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            DltArg::Signed(v) => write!(f, "{}", v),
            DltArg::Unsigned(v) => write!(f, "{}", v),
            DltArg::Float(v) => write!(f, "{}", v),
            DltArg::String(v) => write!(f, "{}", v),
            DltArg::Raw(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// Control message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlKind {
    Request,
    Response,
    Time,
}

/// A decoded control message
///
/// Only the envelope (service id, status) is interpreted. The service body is
/// kept as raw bytes, with a few well-known fields extracted into `detail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlMessage {
    pub kind: ControlKind,
    pub service_id: u32,
    /// Service name for known service ids
    pub service: Option<&'static str>,
    /// Response status (0 = ok, 1 = not supported, 2 = error)
    pub status: Option<u8>,
    /// Human readable rendering of interpreted fields
    pub detail: Option<String>,
    /// Service body following the service id (and status for responses)
    pub body: Vec<u8>,
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ControlKind::Time {
            return write!(f, "[time marker]");
        }
        match self.service {
            Some(name) => write!(f, "[{}", name)?,
            None => write!(f, "[service 0x{:x}", self.service_id)?,
        }
        match self.status {
            Some(0) => write!(f, " ok")?,
            Some(1) => write!(f, " not_supported")?,
            Some(2) => write!(f, " error")?,
            Some(s) => write!(f, " status={}", s)?,
            None => {}
        }
        if let Some(detail) = &self.detail {
            write!(f, " {}", detail)?;
        }
        write!(f, "]")
    }
}

/// Payload of a decoded DLT line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    /// Verbose arguments, in order
    Verbose(Vec<DltArg>),
    /// Non-verbose message id plus its decoded (or raw) arguments
    NonVerbose { message_id: u32, args: Vec<DltArg> },
    /// Control message
    Control(ControlMessage),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Verbose(args) => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                Ok(())
            }
            Payload::NonVerbose { message_id, args } => {
                write!(f, "[{}]", message_id)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Payload::Control(control) => write!(f, "{}", control),
        }
    }
}

/// A fully decoded DLT line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DltLine {
    /// Running line number of this decoder (shared with skipped records)
    pub line: u64,
    /// Absolute stream offset of the first byte of the frame (including any prefix)
    pub position: i64,
    /// Number of stream bytes the frame occupied
    pub length: usize,
    /// Storage header time stamp, or receive time in online mode
    pub timestamp: Option<Timestamp>,
    /// Device time stamp from the standard header (0.1ms resolution)
    pub device_timestamp: Option<Duration>,
    pub ecu_id: Option<String>,
    pub session_id: Option<u32>,
    pub count: u8,
    pub big_endian: bool,
    pub verbose: bool,
    pub message_type: Option<DltType>,
    pub application_id: Option<String>,
    pub context_id: Option<String>,
    pub number_of_args: u8,
    pub payload: Payload,
}

/// A diagnostic record covering bytes that could not be decoded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLine {
    pub line: u64,
    /// Absolute stream offset of the first skipped byte
    pub position: i64,
    /// Number of contiguous bytes skipped
    pub bytes: usize,
    /// Reason recorded for the first skip of this run
    pub reason: String,
    /// Last valid time stamp seen before the skip
    pub timestamp: Option<Timestamp>,
    /// Last valid device time stamp seen before the skip
    pub device_timestamp: Option<Duration>,
    /// Last ECU id seen before the skip
    pub ecu_id: Option<String>,
}

impl SkippedLine {
    /// Text rendering used for the skipped line
    pub fn text(&self) -> String {
        if self.reason.is_empty() {
            format!("Skipped: {}", self.bytes)
        } else {
            format!("Skipped: {} bytes; {}", self.bytes, self.reason)
        }
    }
}

/// The primary output of the decoder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceRecord {
    /// A successfully decoded frame
    Line(DltLine),
    /// A run of bytes that had to be discarded
    Skipped(SkippedLine),
}

impl TraceRecord {
    /// Stream offset where this record starts
    pub fn position(&self) -> i64 {
        match self {
            TraceRecord::Line(line) => line.position,
            TraceRecord::Skipped(skipped) => skipped.position,
        }
    }

    /// Number of stream bytes covered by this record
    pub fn stream_length(&self) -> usize {
        match self {
            TraceRecord::Line(line) => line.length,
            TraceRecord::Skipped(skipped) => skipped.bytes,
        }
    }

    /// Line number of this record
    pub fn line(&self) -> u64 {
        match self {
            TraceRecord::Line(line) => line.line,
            TraceRecord::Skipped(skipped) => skipped.line,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TraceRecord::Skipped(_))
    }

    /// Get the decoded line, if this record is one
    pub fn as_line(&self) -> Option<&DltLine> {
        match self {
            TraceRecord::Line(line) => Some(line),
            TraceRecord::Skipped(_) => None,
        }
    }

    /// Get the skipped record, if this record is one
    pub fn as_skipped(&self) -> Option<&SkippedLine> {
        match self {
            TraceRecord::Skipped(skipped) => Some(skipped),
            TraceRecord::Line(_) => None,
        }
    }
}

/// Convert a 4 byte DLT identifier to a string, stopping at the first NUL
///
/// Bytes are interpreted as ISO-8859-1, which makes every byte value printable
/// as a char.
pub fn id_to_string(id: [u8; 4]) -> String {
    id.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}
