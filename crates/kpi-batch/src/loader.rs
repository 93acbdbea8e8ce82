//! CSV recording loader
//!
//! Files carry a header row and three columns found by name, case
//! insensitively: one containing `timestamp`, one `ch1` and one `ch2`
//! (e.g. `Timestamp(HH:mm:ss.SSS),Ch1(uV),Ch2(uV)`). Samples are
//! microvolts. Timestamps are wall-clock `HH:MM:SS.fff` or plain seconds.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveTime, Timelike};
use kpi_core::{RawRecording, RecordingMeta};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Seconds represented by one timestamp cell
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.contains(':') {
        let time = NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok()?;
        Some(time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 * 1e-9)
    } else {
        text.parse::<f64>().ok().filter(|s| s.is_finite())
    }
}

struct Columns {
    timestamp: usize,
    ch1: usize,
    ch2: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |needle: &str| {
            headers
                .iter()
                .position(|h| h.to_ascii_lowercase().contains(needle))
        };
        match (find("timestamp"), find("ch1"), find("ch2")) {
            (Some(timestamp), Some(ch1), Some(ch2)) => Ok(Self { timestamp, ch1, ch2 }),
            _ => bail!(
                "expected timestamp, ch1 and ch2 columns, found [{}]",
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// Read a recording from any CSV source
pub fn read_recording<R: Read>(source: R, meta: RecordingMeta, nominal_rate: f64) -> Result<RawRecording> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers().context("cannot read header row")?.clone();
    let columns = Columns::locate(&headers)?;

    let mut timestamps = Vec::new();
    let mut ch1 = Vec::new();
    let mut ch2 = Vec::new();
    let mut day_offset = 0.0;
    let mut previous_clock: Option<f64> = None;

    for (index, record) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let record = record.with_context(|| format!("malformed CSV at line {}", line))?;
        let cell = |column: usize| {
            record
                .get(column)
                .ok_or_else(|| anyhow!("line {} has only {} fields", line, record.len()))
        };

        let stamp_text = cell(columns.timestamp)?;
        let mut stamp = parse_timestamp(stamp_text)
            .ok_or_else(|| anyhow!("line {}: cannot parse timestamp '{}'", line, stamp_text))?;
        if stamp_text.contains(':') {
            // wall-clock stamps restart at midnight
            if let Some(prev) = previous_clock {
                if stamp < prev - SECONDS_PER_DAY / 2.0 {
                    day_offset += SECONDS_PER_DAY;
                }
            }
            previous_clock = Some(stamp);
            stamp += day_offset;
        }

        let sample = |column: usize, name: &str| -> Result<f64> {
            let text = cell(column)?;
            text.parse::<f64>()
                .with_context(|| format!("line {}: cannot parse {} sample '{}'", line, name, text))
        };

        timestamps.push(stamp);
        ch1.push(sample(columns.ch1, "ch1")?);
        ch2.push(sample(columns.ch2, "ch2")?);
    }

    debug!(recording = %meta, samples = timestamps.len(), "recording loaded");
    Ok(RawRecording::new(meta, ch1, ch2, timestamps, nominal_rate)?)
}

/// Open and read the recording at `path`
pub fn load_recording(path: &Path, meta: RecordingMeta, nominal_rate: f64) -> Result<RawRecording> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    read_recording(BufReader::new(file), meta, nominal_rate).with_context(|| format!("cannot load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::Condition;

    fn meta() -> RecordingMeta {
        RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt")
    }

    #[test]
    fn test_parse_timestamp() {
        assert!((parse_timestamp("10:00:01.500").unwrap() - 36_001.5).abs() < 1e-9);
        assert!((parse_timestamp("00:00:02").unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(parse_timestamp("0.004"), Some(0.004));
        assert_eq!(parse_timestamp("25:00:00.000"), None);
        assert_eq!(parse_timestamp("abc"), None);
    }

    #[test]
    fn test_read_device_format() {
        let text = "Timestamp(HH:mm:ss.SSS),Ch1(uV),Ch2(uV)\n\
                    12:00:00.000,1.5,-2.0\n\
                    12:00:00.004,1.0,-1.0\n\
                    12:00:00.008,0.5,0.0\n";
        let recording = read_recording(text.as_bytes(), meta(), 250.0).unwrap();
        assert_eq!(recording.len(), 3);
        assert_eq!(recording.channels()[0], vec![1.5, 1.0, 0.5]);
        assert_eq!(recording.channels()[1], vec![-2.0, -1.0, 0.0]);
        assert!((recording.observed_sampling_rate().unwrap() - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_columns_in_any_order() {
        let text = "ch2,timestamp,ch1\n3,0.0,1\n4,0.5,2\n";
        let recording = read_recording(text.as_bytes(), meta(), 2.0).unwrap();
        assert_eq!(recording.channels()[0], vec![1.0, 2.0]);
        assert_eq!(recording.channels()[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_midnight_rollover() {
        let text = "timestamp,ch1,ch2\n23:59:59.996,0,0\n00:00:00.000,0,0\n00:00:00.004,0,0\n";
        let recording = read_recording(text.as_bytes(), meta(), 250.0).unwrap();
        assert!((recording.observed_sampling_rate().unwrap() - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_bad_input() {
        let missing = "time,ch1,ch2\n0,1,2\n";
        assert!(read_recording(missing.as_bytes(), meta(), 250.0).is_err());

        let bad_sample = "timestamp,ch1,ch2\n0.0,1,x\n";
        let err = read_recording(bad_sample.as_bytes(), meta(), 250.0).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
