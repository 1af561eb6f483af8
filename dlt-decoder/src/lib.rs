//! DLT Decoder Library
//!
//! A streaming decoder for AUTOSAR DLT (Diagnostic Log and Trace) traces.
//! Bytes can arrive in arbitrarily sized chunks; the decoder reassembles
//! frames, resynchronises after corruption and emits a stream of records.
//!
//! # Architecture
//!
//! The decoding pipeline is layered:
//! - A [`Transport`] finds frame starts (storage file, serial, raw network)
//!   and parses the transport prefix in front of each packet
//! - A [`FrameCache`](frame_cache::FrameCache) holds incomplete frames across
//!   calls, and a [`PositionMap`](position_map::PositionMap) maps every cached
//!   byte back to its position in the original stream
//! - Payload decoders turn verbose, non-verbose and control payloads into
//!   typed values
//! - A [`LineBuilder`] collects the fields of one record
//!
//! Each record is either a decoded [`DltLine`] or a [`SkippedLine`]
//! describing a run of bytes that could not be decoded. Every input byte is
//! accounted for by exactly one record.
//!
//! The library does NOT:
//! - Resolve non-verbose messages through FIBEX catalogues
//! - Read from sockets or serial ports
//! - Render or filter traces beyond simple id filters
//!
//! # Example Usage
//!
//! ```no_run
//! use dlt_decoder::{Decoder, DecoderConfig, TraceRecord};
//! use std::path::Path;
//!
//! let config = DecoderConfig::new()
//!     .with_chunk_size(16 * 1024)
//!     .with_app_filter(vec!["APP1".to_string()]);
//! let decoder = Decoder::with_config(config).unwrap();
//!
//! for record in decoder.decode_file(Path::new("trace.dlt")).unwrap() {
//!     match record {
//!         Ok(TraceRecord::Line(line)) => println!("{} @ {}", line.line, line.position),
//!         Ok(TraceRecord::Skipped(skipped)) => println!("{}", skipped.text()),
//!         Err(e) => eprintln!("Decode error: {}", e),
//!     }
//! }
//! ```
//!
//! For push-style decoding, feed chunks to a [`DecodeStream`] directly:
//!
//! ```
//! use dlt_decoder::DecodeStream;
//!
//! let mut stream = DecodeStream::network(false);
//! let frame = [0x20, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00];
//! let mut records = stream.decode(&frame[..5], 0).unwrap();
//! records.extend(stream.decode(&frame[5..], 5).unwrap());
//! records.extend(stream.flush().unwrap());
//! assert_eq!(records.len(), 1);
//! ```

// Public modules
pub mod builder;
pub mod config;
pub mod decoder;
pub mod frame_cache;
pub mod header;
pub mod payload;
pub mod position_map;
pub mod scanner;
pub mod stream;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use builder::{DltLineBuilder, LineBuilder};
pub use config::{DecoderConfig, InputFormat};
pub use decoder::{Decoder, DecodingIterator};
pub use payload::PayloadDecoder;
pub use stream::{DecodeStream, StreamStats};
pub use transport::{NetworkTransport, SerialTransport, StorageTransport, Transport};
pub use types::{
    ControlKind, ControlMessage, DecoderError, DltArg, DltLine, DltType, Payload, Result,
    SkippedLine, Timestamp, TraceRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
