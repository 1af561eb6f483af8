//! Configuration loading and parsing

use anyhow::{Context, Result};
use dlt_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Write JSON lines instead of text
    #[serde(default)]
    pub json: bool,
    /// Include the stream position in text output
    #[serde(default)]
    pub position: bool,
    /// Output file (default: stdout)
    pub file: Option<PathBuf>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .decoder
        .validate()
        .with_context(|| format!("Invalid decoder settings in {:?}", path))?;

    Ok(config)
}
