//! Decoder configuration types
//!
//! This module defines the configuration used by the [`Decoder`](crate::Decoder)
//! facade: which transport framing the input uses, how large the read chunks
//! are, and which records are passed on to the caller.

use crate::stream::DecodeStream;
use crate::types::{DecoderError, Result, TraceRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Framing of the input bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// DLT file with a storage header in front of every packet
    #[default]
    File,
    /// Serial capture, packets preceded by `DLS\x01`
    Serial,
    /// Raw packets without any framing
    Network,
}

impl InputFormat {
    /// Guess the format from a file extension
    ///
    /// `.dlt` files carry storage headers, `.dls`/`.ser` are serial captures
    /// and `.bin`/`.raw`/`.tcp` are raw packet dumps.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "dlt" => Some(InputFormat::File),
            "dls" | "ser" => Some(InputFormat::Serial),
            "bin" | "raw" | "tcp" => Some(InputFormat::Network),
            _ => None,
        }
    }

    /// Build a stream decoder for this format
    pub fn stream(&self, online: bool) -> DecodeStream {
        match self {
            InputFormat::File => DecodeStream::storage(),
            InputFormat::Serial => DecodeStream::serial(),
            InputFormat::Network => DecodeStream::network(online),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::File => write!(f, "file"),
            InputFormat::Serial => write!(f, "serial"),
            InputFormat::Network => write!(f, "network"),
        }
    }
}

impl FromStr for InputFormat {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "dlt" | "storage" => Ok(InputFormat::File),
            "serial" => Ok(InputFormat::Serial),
            "network" | "net" | "tcp" => Ok(InputFormat::Network),
            other => Err(DecoderError::InvalidConfig(format!(
                "Unknown input format '{}'",
                other
            ))),
        }
    }
}

/// Configuration for the decoder library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Input framing; guessed from the file name when not set
    #[serde(default)]
    pub format: Option<InputFormat>,

    /// Stamp network records with the time they were decoded
    #[serde(default)]
    pub online: bool,

    /// Bytes read from the input per decode call (default: 64 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Whether skipped-bytes records are passed on
    #[serde(default = "default_true")]
    pub emit_skipped: bool,

    /// Optional: only emit lines from these ECU ids
    #[serde(default)]
    pub ecu_filter: Option<Vec<String>>,

    /// Optional: only emit lines from these application ids
    #[serde(default)]
    pub app_filter: Option<Vec<String>>,

    /// Optional: only emit lines from these context ids
    #[serde(default)]
    pub ctx_filter: Option<Vec<String>>,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            format: None,
            online: false,
            chunk_size: default_chunk_size(),
            emit_skipped: true,
            ecu_filter: None,
            app_filter: None,
            ctx_filter: None,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the input format
    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Builder method: enable online time stamps for network input
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Builder method: set the read chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Builder method: pass on or drop skipped records
    pub fn with_skipped(mut self, enabled: bool) -> Self {
        self.emit_skipped = enabled;
        self
    }

    /// Builder method: set ECU id filter
    pub fn with_ecu_filter(mut self, ids: Vec<String>) -> Self {
        self.ecu_filter = Some(ids);
        self
    }

    /// Builder method: set application id filter
    pub fn with_app_filter(mut self, ids: Vec<String>) -> Self {
        self.app_filter = Some(ids);
        self
    }

    /// Builder method: set context id filter
    pub fn with_ctx_filter(mut self, ids: Vec<String>) -> Self {
        self.ctx_filter = Some(ids);
        self
    }

    /// Check the configuration for values the decoder cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DecoderError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Format to use for `path`: the configured one, else guessed, else file
    pub fn format_for(&self, path: &Path) -> InputFormat {
        self.format
            .or_else(|| InputFormat::from_path(path))
            .unwrap_or_default()
    }

    /// Check if a record should be passed on based on the filters
    pub fn should_emit(&self, record: &TraceRecord) -> bool {
        match record {
            TraceRecord::Skipped(_) => self.emit_skipped,
            TraceRecord::Line(line) => {
                matches_filter(&self.ecu_filter, line.ecu_id.as_deref())
                    && matches_filter(&self.app_filter, line.application_id.as_deref())
                    && matches_filter(&self.ctx_filter, line.context_id.as_deref())
            }
        }
    }
}

fn matches_filter(filter: &Option<Vec<String>>, value: Option<&str>) -> bool {
    match filter {
        Some(ids) => value.map_or(false, |value| ids.iter().any(|id| id == value)),
        None => true,
    }
}
