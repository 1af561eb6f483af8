//! Text and JSON-lines rendering of trace records

use anyhow::Result;
use dlt_decoder::{DltLine, SkippedLine, Timestamp, TraceRecord};
use std::io::Write;
use std::time::Duration;

/// How records are written
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub json: bool,
    pub position: bool,
}

/// Write one record followed by a newline
pub fn write_record<W: Write>(out: &mut W, record: &TraceRecord, options: RenderOptions) -> Result<()> {
    if options.json {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
        return Ok(());
    }

    match record {
        TraceRecord::Line(line) => writeln!(out, "{}", format_line(line, options.position))?,
        TraceRecord::Skipped(skipped) => {
            writeln!(out, "{}", format_skipped(skipped, options.position))?
        }
    }
    Ok(())
}

fn format_timestamp(timestamp: Option<Timestamp>) -> String {
    match timestamp {
        Some(ts) => ts.format("%Y/%m/%d %H:%M:%S%.6f").to_string(),
        None => "-".to_string(),
    }
}

fn format_device_time(device_timestamp: Option<Duration>) -> String {
    match device_timestamp {
        Some(d) => format!("{}.{:04}", d.as_secs(), d.subsec_micros() / 100),
        None => "-".to_string(),
    }
}

fn prefix(line: u64, position: i64, with_position: bool) -> String {
    if with_position {
        format!("{} @{}", line, position)
    } else {
        line.to_string()
    }
}

pub fn format_line(line: &DltLine, with_position: bool) -> String {
    let message_type = line
        .message_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} {} {:03} {} {} {} {} {} {} {}",
        prefix(line.line, line.position, with_position),
        format_timestamp(line.timestamp),
        format_device_time(line.device_timestamp),
        line.count,
        line.ecu_id.as_deref().unwrap_or("-"),
        line.application_id.as_deref().unwrap_or("-"),
        line.context_id.as_deref().unwrap_or("-"),
        message_type,
        if line.verbose { "V" } else { "N" },
        line.number_of_args,
        line.payload
    )
}

pub fn format_skipped(skipped: &SkippedLine, with_position: bool) -> String {
    format!(
        "{} {} {} {} {}",
        prefix(skipped.line, skipped.position, with_position),
        format_timestamp(skipped.timestamp),
        format_device_time(skipped.device_timestamp),
        skipped.ecu_id.as_deref().unwrap_or("-"),
        skipped.text()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlt_decoder::{DltArg, DltType, Payload};

    fn sample_line() -> DltLine {
        DltLine {
            line: 3,
            position: 120,
            length: 30,
            timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 250_000_000),
            device_timestamp: Some(Duration::from_micros(123_400)),
            ecu_id: Some("ECU1".to_string()),
            session_id: None,
            count: 7,
            big_endian: false,
            verbose: true,
            message_type: Some(DltType::LogInfo),
            application_id: Some("APP1".to_string()),
            context_id: Some("CTX1".to_string()),
            number_of_args: 2,
            payload: Payload::Verbose(vec![
                DltArg::String("speed".to_string()),
                DltArg::Unsigned(42),
            ]),
        }
    }

    #[test]
    fn test_format_line() {
        let text = format_line(&sample_line(), false);
        assert_eq!(
            text,
            "3 2023/11/14 22:13:20.250000 0.1234 007 ECU1 APP1 CTX1 log info V 2 speed 42"
        );
        assert!(format_line(&sample_line(), true).starts_with("3 @120 "));
    }

    #[test]
    fn test_format_skipped() {
        let skipped = SkippedLine {
            line: 4,
            position: 150,
            bytes: 3,
            reason: "Searching for next packet".to_string(),
            timestamp: None,
            device_timestamp: None,
            ecu_id: None,
        };
        assert_eq!(
            format_skipped(&skipped, true),
            "4 @150 - - - Skipped: 3 bytes; Searching for next packet"
        );
    }

    #[test]
    fn test_json_lines() {
        let mut out = Vec::new();
        let options = RenderOptions {
            json: true,
            position: false,
        };
        write_record(&mut out, &TraceRecord::Line(sample_line()), options).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["kind"], "line");
        assert_eq!(value["position"], 120);
        assert_eq!(value["application_id"], "APP1");
    }
}
