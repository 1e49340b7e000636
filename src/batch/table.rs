use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::warn;

use super::{FeatureRecord, FeatureSet};

pub const FILENAME_COLUMN: &str = "filename";
pub const SAMPLING_RATE_COLUMN: &str = "sampling_rate";

/// One input row: the audio reference plus every column, kept verbatim for
/// the output record.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    pub filename: PathBuf,
    pub sampling_rate: Option<u32>,
    /// Set when the `sampling_rate` cell could not be parsed. The row is kept
    /// and its features come out empty.
    pub rate_error: Option<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub rows: Vec<InputRow>,
}

/// Read a CSV with a header row. A `filename` column is required; an empty
/// `sampling_rate` cell (or a missing column) leaves the rate to the caller,
/// and an unparseable one is recorded in `rate_error`.
pub fn read_table<R: Read>(reader: R) -> Result<InputTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let Some(filename_idx) = headers.iter().position(|h| h == FILENAME_COLUMN) else {
        bail!("input CSV has no '{}' column", FILENAME_COLUMN);
    };
    let rate_idx = headers.iter().position(|h| h == SAMPLING_RATE_COLUMN);

    let mut rows = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
        let values: Vec<String> = record.iter().map(str::to_string).collect();
        let filename = PathBuf::from(values.get(filename_idx).cloned().unwrap_or_default());
        let (sampling_rate, rate_error) = match rate_idx.and_then(|idx| values.get(idx)) {
            Some(raw) if !raw.trim().is_empty() => match parse_rate(raw) {
                Ok(rate) => (Some(rate), None),
                Err(err) => {
                    warn!(row = line + 1, value = %raw, error = %err, "invalid sampling_rate");
                    (None, Some(format!("invalid sampling_rate {:?}: {}", raw, err)))
                }
            },
            _ => (None, None),
        };
        rows.push(InputRow {
            filename,
            sampling_rate,
            rate_error,
            values,
        });
    }
    Ok(InputTable { headers, rows })
}

fn parse_rate(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let rate = match trimmed.parse::<u32>() {
        Ok(rate) => rate,
        // pandas writes integer columns with NaNs as floats ("48000.0")
        Err(_) => {
            let value: f64 = trimmed.parse()?;
            if value.fract() != 0.0 || value <= 0.0 || value > u32::MAX as f64 {
                bail!("not a positive integer rate");
            }
            value as u32
        }
    };
    if rate == 0 {
        bail!("rate must be positive");
    }
    Ok(rate)
}

/// Write input columns followed by the feature columns of `features`.
/// Failed extractions become empty cells.
pub fn write_table<W: Write>(
    writer: W,
    headers: &[String],
    records: &[FeatureRecord],
    features: FeatureSet,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    header_row.extend(features.columns().iter().copied());
    csv_writer
        .write_record(&header_row)
        .context("Failed to write CSV header")?;
    for record in records {
        let mut row = record.row.values.clone();
        row.resize(headers.len(), String::new());
        row.extend(record.feature_cells(features));
        csv_writer
            .write_record(&row)
            .context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}
