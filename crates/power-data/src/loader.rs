//! CSV loading for power logs.
//!
//! Reads the raw smart-plug and hardware-sensor logs, and the intermediate
//! fused and corrected tables, into typed records. Loading is lenient: a row
//! that fails to parse is skipped and counted, never fatal. A missing file or
//! a missing header column aborts the load.

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use power_core::error::{PowerError, Result};
use power_core::models::{CorrectedReading, FusedReading, LoadOutcome, Reading};
use power_core::timestamp::parse_timestamp;
use tracing::{debug, warn};

use crate::columns;

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the reference (smart-plug) log: `timestamp,power`.
pub fn load_reference_stream(path: &Path) -> Result<LoadOutcome<Reading>> {
    load_file(path, |reader| load_reference_from_reader(reader, path))
}

/// Load the secondary (hardware sensor) log: `timestamp,power,session`.
pub fn load_secondary_stream(path: &Path) -> Result<LoadOutcome<Reading>> {
    load_file(path, |reader| load_secondary_from_reader(reader, path))
}

/// Load a previously written fused table.
pub fn load_fused(path: &Path) -> Result<LoadOutcome<FusedReading>> {
    load_file(path, |reader| load_fused_from_reader(reader, path))
}

/// Load a previously written baseline-corrected table.
pub fn load_corrected(path: &Path) -> Result<LoadOutcome<CorrectedReading>> {
    load_file(path, |reader| load_corrected_from_reader(reader, path))
}

/// Parse reference readings from any reader. `source` only labels errors and
/// log lines.
pub fn load_reference_from_reader<R: Read>(reader: R, source: &Path) -> Result<LoadOutcome<Reading>> {
    read_records(
        reader,
        source,
        &[columns::TIMESTAMP, columns::POWER],
        |record, idx| {
            Ok(Reading::new(
                parse_timestamp_field(record, idx[0])?,
                parse_power_field(record, idx[1])?,
            ))
        },
    )
}

/// Parse secondary readings from any reader.
pub fn load_secondary_from_reader<R: Read>(reader: R, source: &Path) -> Result<LoadOutcome<Reading>> {
    read_records(
        reader,
        source,
        &[columns::TIMESTAMP, columns::POWER, columns::SESSION],
        |record, idx| {
            Ok(Reading::with_session(
                parse_timestamp_field(record, idx[0])?,
                parse_power_field(record, idx[1])?,
                session_field(record, idx[2])?,
            ))
        },
    )
}

/// Parse fused rows from any reader.
pub fn load_fused_from_reader<R: Read>(reader: R, source: &Path) -> Result<LoadOutcome<FusedReading>> {
    read_records(
        reader,
        source,
        &[
            columns::TIMESTAMP,
            columns::POWER_SHELLY,
            columns::POWER_HWMON,
            columns::SESSION,
        ],
        |record, idx| {
            Ok(FusedReading {
                timestamp: parse_timestamp_field(record, idx[0])?,
                power_reference: parse_power_field(record, idx[1])?,
                power_secondary: parse_power_field(record, idx[2])?,
                session: session_field(record, idx[3])?,
            })
        },
    )
}

/// Parse corrected rows from any reader.
pub fn load_corrected_from_reader<R: Read>(
    reader: R,
    source: &Path,
) -> Result<LoadOutcome<CorrectedReading>> {
    read_records(
        reader,
        source,
        &[
            columns::TIMESTAMP,
            columns::POWER_SHELLY_C,
            columns::POWER_HWMON_C,
            columns::SESSION,
        ],
        |record, idx| {
            Ok(CorrectedReading {
                timestamp: parse_timestamp_field(record, idx[0])?,
                power_reference_c: parse_power_field(record, idx[1])?,
                power_secondary_c: parse_power_field(record, idx[2])?,
                session: session_field(record, idx[3])?,
            })
        },
    )
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Open `path` and hand it to `parse`, mapping a missing file to
/// [`PowerError::MissingInput`].
fn load_file<T>(
    path: &Path,
    parse: impl FnOnce(std::fs::File) -> Result<LoadOutcome<T>>,
) -> Result<LoadOutcome<T>> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PowerError::MissingInput(path.to_path_buf()),
        _ => PowerError::FileRead {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    parse(file)
}

/// Generic lenient CSV driver.
///
/// Resolves every name in `required` to a header index, then calls `parse`
/// on each data row with those indices in the same order. Rows where
/// `parse` returns a record-level error, or which the CSV layer cannot
/// decode, are skipped.
fn read_records<R, T>(
    reader: R,
    source: &Path,
    required: &[&str],
    parse: impl Fn(&StringRecord, &[usize]) -> Result<T>,
) -> Result<LoadOutcome<T>>
where
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let indices = resolve_columns(&headers, required, source)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping row {} in {}: {}", row_idx + 1, source.display(), e);
                skipped += 1;
                continue;
            }
        };

        match parse(&record, &indices) {
            Ok(value) => records.push(value),
            Err(e) if e.is_record_level() => {
                debug!(
                    "Skipping row {} in {} due to parsing error: {} - Row: {:?}",
                    row_idx + 1,
                    source.display(),
                    e,
                    record
                );
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if skipped > 0 {
        warn!(
            "{}: skipped {} malformed row(s), kept {}",
            source.display(),
            skipped,
            records.len()
        );
    }
    debug!("Loaded {} rows from {}", records.len(), source.display());

    Ok(LoadOutcome { records, skipped })
}

fn resolve_columns(headers: &StringRecord, required: &[&str], source: &Path) -> Result<Vec<usize>> {
    required
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == *name)
                .ok_or_else(|| PowerError::MissingColumn {
                    path: PathBuf::from(source),
                    column: name.to_string(),
                })
        })
        .collect()
}

fn parse_timestamp_field(record: &StringRecord, idx: usize) -> Result<chrono::NaiveDateTime> {
    let raw = record
        .get(idx)
        .ok_or_else(|| PowerError::TimestampParse(String::new()))?;
    parse_timestamp(raw)
}

/// Parse a power column. Surrounding whitespace is tolerated; NaN and
/// infinities are rejected so every loaded power value is finite.
fn parse_power_field(record: &StringRecord, idx: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| PowerError::PowerParse(String::new()))?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PowerError::PowerParse(raw.to_string())),
    }
}

fn session_field(record: &StringRecord, idx: usize) -> Result<String> {
    match record.get(idx) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(PowerError::SessionMissing),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
