//! Main decoder API
//!
//! This module provides the primary interface for the decoder library. The
//! [`Decoder`] reads a DLT source in chunks, feeds them to a [`DecodeStream`]
//! and yields the resulting records one at a time.

use crate::config::{DecoderConfig, InputFormat};
use crate::stream::{DecodeStream, StreamStats};
use crate::types::{Result, TraceRecord};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a new decoder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a specific configuration
    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode everything `reader` produces
    ///
    /// The format is taken from the configuration, defaulting to DLT files with
    /// storage headers.
    ///
    /// # Example
    /// ```
    /// use dlt_decoder::{Decoder, DecoderConfig, InputFormat};
    ///
    /// let config = DecoderConfig::new().with_format(InputFormat::Network);
    /// let decoder = Decoder::with_config(config).unwrap();
    /// let data: &[u8] = &[0x20, 0x00, 0x00, 0x08, 1, 0, 0, 0];
    /// let records: Vec<_> = decoder.decode_reader(data).collect();
    /// assert_eq!(records.len(), 1);
    /// ```
    pub fn decode_reader<R: Read>(&self, reader: R) -> DecodingIterator<R> {
        let format = self.config.format.unwrap_or_default();
        self.decode_reader_as(reader, format)
    }

    /// Decode `reader` with an explicit input format
    pub fn decode_reader_as<R: Read>(&self, reader: R, format: InputFormat) -> DecodingIterator<R> {
        log::debug!("Decoding {} input in chunks of {} bytes", format, self.config.chunk_size);
        DecodingIterator::new(reader, format.stream(self.config.online), self.config.clone())
    }

    /// Decode a file, returning an iterator over its records
    ///
    /// The input format is the configured one, or guessed from the extension.
    ///
    /// # Example
    /// ```no_run
    /// use dlt_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::new();
    /// for record in decoder.decode_file(Path::new("trace.dlt")).unwrap() {
    ///     match record {
    ///         Ok(record) => println!("{:?}", record),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// ```
    pub fn decode_file(&self, path: &Path) -> Result<DecodingIterator<BufReader<File>>> {
        let format = self.config.format_for(path);
        log::info!("Decoding log file: {:?} ({})", path, format);

        let file = File::open(path)?;
        Ok(self.decode_reader_as(BufReader::new(file), format))
    }
}

/// Iterator reading chunks from a source and yielding decoded records
///
/// The stream is flushed once the source reports end of file, so incomplete
/// frames at the end appear as skipped records. After an error the iterator
/// is finished.
pub struct DecodingIterator<R: Read> {
    reader: R,
    stream: DecodeStream,
    config: DecoderConfig,
    buffer: Vec<u8>,
    position: i64,
    pending: VecDeque<TraceRecord>,
    finished: bool,
}

impl<R: Read> DecodingIterator<R> {
    fn new(reader: R, stream: DecodeStream, config: DecoderConfig) -> Self {
        Self {
            reader,
            stream,
            buffer: vec![0; config.chunk_size.max(1)],
            config,
            position: 0,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Counters of the underlying stream decoder
    pub fn stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Bytes read from the source so far
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Read the next chunk and decode it; returns false at end of input
    fn fill(&mut self) -> Result<bool> {
        let read = loop {
            match self.reader.read(&mut self.buffer) {
                Ok(read) => break read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        let records = if read == 0 {
            log::debug!("End of input at {}, flushing", self.position);
            self.finished = true;
            self.stream.flush()?
        } else {
            let records = self.stream.decode(&self.buffer[..read], self.position)?;
            self.position += read as i64;
            records
        };

        let config = &self.config;
        self.pending
            .extend(records.into_iter().filter(|record| config.should_emit(record)));
        Ok(read > 0)
    }
}

impl<R: Read> Iterator for DecodingIterator<R> {
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.fill() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}
