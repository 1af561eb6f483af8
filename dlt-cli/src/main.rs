//! DLT Trace Reader CLI Application
//!
//! This is the command-line interface for the DLT trace decoder.
//! It uses the dlt-decoder library and adds:
//! - Decoding of several inputs in parallel
//! - Text and JSON-lines output
//! - Configuration files merged with command-line options

use anyhow::{bail, Context, Result};
use clap::Parser;
use dlt_decoder::{Decoder, DecoderConfig, InputFormat, StreamStats};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod config;
mod render;

use config::AppConfig;
use render::{write_record, RenderOptions};

/// DLT Trace Reader - Decode AUTOSAR DLT files and captures
#[derive(Parser, Debug)]
#[command(name = "dlt-cli")]
#[command(about = "Decode AUTOSAR DLT traces (storage files, serial and raw captures)", long_about = None)]
#[command(version)]
struct Args {
    /// Input files to decode
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Input framing: file, serial or network (default: from extension)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<InputFormat>,

    /// Bytes read per decode call
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Stamp network records with the time they were decoded
    #[arg(long)]
    online: bool,

    /// Do not print skipped-bytes records
    #[arg(long)]
    no_skipped: bool,

    /// Print JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Include the stream position of each record in text output
    #[arg(long)]
    position: bool,

    /// Only show lines with this application id (can be repeated)
    #[arg(long, value_name = "ID")]
    app_id: Vec<String>,

    /// Only show lines with this context id (can be repeated)
    #[arg(long, value_name = "ID")]
    ctx_id: Vec<String>,

    /// Only show lines from this ECU (can be repeated)
    #[arg(long, value_name = "ID")]
    ecu_id: Vec<String>,

    /// Output file for decoded records (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("DLT Trace Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", dlt_decoder::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let app_config = merge_args(&args, app_config);

    if app_config.input.files.is_empty() {
        bail!("No input specified. Pass one or more files or set [input] files in the configuration");
    }

    let decoder = Decoder::with_config(app_config.decoder.clone())?;
    let options = RenderOptions {
        json: app_config.output.json,
        position: app_config.output.position,
    };

    let mut out: Box<dyn Write> = match &app_config.output.file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let total = decode_inputs(&decoder, &app_config.input.files, options, &mut out)?;
    out.flush()?;

    log::info!(
        "Total: {} bytes, {} lines, {} skipped records ({} bytes)",
        total.bytes,
        total.lines,
        total.skipped_records,
        total.skipped_bytes
    );
    Ok(())
}

/// Command-line options override the configuration file
fn merge_args(args: &Args, mut config: AppConfig) -> AppConfig {
    if !args.inputs.is_empty() {
        config.input.files = args.inputs.clone();
    }

    let decoder: &mut DecoderConfig = &mut config.decoder;
    if let Some(format) = args.format {
        decoder.format = Some(format);
    }
    if let Some(chunk_size) = args.chunk_size {
        decoder.chunk_size = chunk_size;
    }
    decoder.online |= args.online;
    if args.no_skipped {
        decoder.emit_skipped = false;
    }
    if !args.app_id.is_empty() {
        decoder.app_filter = Some(args.app_id.clone());
    }
    if !args.ctx_id.is_empty() {
        decoder.ctx_filter = Some(args.ctx_id.clone());
    }
    if !args.ecu_id.is_empty() {
        decoder.ecu_filter = Some(args.ecu_id.clone());
    }

    config.output.json |= args.json;
    config.output.position |= args.position;
    if args.output.is_some() {
        config.output.file = args.output.clone();
    }
    config
}

/// Decode all inputs, writing their records in input order
///
/// A single input is streamed straight to `out`. Several inputs are decoded in
/// parallel into per-file buffers first.
fn decode_inputs<W: Write>(
    decoder: &Decoder,
    inputs: &[PathBuf],
    options: RenderOptions,
    out: &mut W,
) -> Result<StreamStats> {
    if let [path] = inputs {
        return decode_input(decoder, path, options, out);
    }

    let results: Vec<Result<(Vec<u8>, StreamStats)>> = inputs
        .par_iter()
        .map(|path| {
            let mut buffer = Vec::new();
            let stats = decode_input(decoder, path, options, &mut buffer)?;
            Ok((buffer, stats))
        })
        .collect();

    let mut total = StreamStats::default();
    for result in results {
        let (buffer, stats) = result?;
        out.write_all(&buffer)?;
        total.bytes += stats.bytes;
        total.lines += stats.lines;
        total.skipped_records += stats.skipped_records;
        total.skipped_bytes += stats.skipped_bytes;
    }
    Ok(total)
}

fn decode_input<W: Write>(
    decoder: &Decoder,
    path: &Path,
    options: RenderOptions,
    out: &mut W,
) -> Result<StreamStats> {
    let mut records = decoder
        .decode_file(path)
        .with_context(|| format!("Failed to open input: {:?}", path))?;

    for record in records.by_ref() {
        let record = record.with_context(|| format!("Failed to decode {:?}", path))?;
        write_record(out, &record, options)?;
    }

    let stats = records.stats();
    log::info!(
        "{:?}: {} lines, {} skipped records ({} bytes)",
        path,
        stats.lines,
        stats.skipped_records,
        stats.skipped_bytes
    );
    Ok(stats)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
