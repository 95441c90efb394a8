//! CSV and JSON output of pipeline results.
//!
//! Every table gets its header row even when it has no data rows, so a
//! downstream renderer can always rely on the column names.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use power_core::error::{PowerError, Result};
use power_core::models::{
    BaselineMeans, CorrectedReading, EnergyResult, FusedReading, PowerSource, SessionRatio,
};
use serde::Serialize;
use tracing::info;

use crate::columns;
use crate::period::PeriodRow;

// ── Record layouts ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FusedRecord<'a> {
    #[serde(with = "power_core::timestamp::serde_format")]
    timestamp: NaiveDateTime,
    power_shelly: f64,
    power_hwmon: f64,
    session: &'a str,
}

#[derive(Serialize)]
struct CorrectedRecord<'a> {
    #[serde(with = "power_core::timestamp::serde_format")]
    timestamp: NaiveDateTime,
    power_shelly_c: f64,
    power_hwmon_c: f64,
    session: &'a str,
}

#[derive(Serialize)]
struct MeansRecord {
    shelly_mean: f64,
    hwmon_mean: f64,
}

#[derive(Serialize)]
struct EnergyRecord<'a> {
    #[serde(rename = "Session")]
    session: &'a str,
    #[serde(rename = "Total Energy (Joules)")]
    joules: f64,
    #[serde(rename = "Total Energy (Wh)")]
    watt_hours: f64,
    #[serde(rename = "Total Energy (kWh)")]
    kilowatt_hours: f64,
}

#[derive(Serialize)]
struct RatioRecord<'a> {
    session: &'a str,
    percentage_hwmon_of_shelly: f64,
}

const ENERGY_HEADERS: [&str; 4] = [
    "Session",
    "Total Energy (Joules)",
    "Total Energy (Wh)",
    "Total Energy (kWh)",
];

// ── Public API ────────────────────────────────────────────────────────────────

/// Create `dir` (and parents) if it does not exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| PowerError::FileWrite {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Write `power_log_fusion.csv`.
pub fn write_fused(dir: &Path, rows: &[FusedReading]) -> Result<PathBuf> {
    let path = dir.join(columns::FUSED_FILE);
    write_records(
        &path,
        &[
            columns::TIMESTAMP,
            columns::POWER_SHELLY,
            columns::POWER_HWMON,
            columns::SESSION,
        ],
        rows.iter().map(|r| FusedRecord {
            timestamp: r.timestamp,
            power_shelly: r.power_reference,
            power_hwmon: r.power_secondary,
            session: &r.session,
        }),
    )?;
    Ok(path)
}

/// Write `power_log_corrected.csv`.
pub fn write_corrected(dir: &Path, rows: &[CorrectedReading]) -> Result<PathBuf> {
    let path = dir.join(columns::CORRECTED_FILE);
    write_records(
        &path,
        &[
            columns::TIMESTAMP,
            columns::POWER_SHELLY_C,
            columns::POWER_HWMON_C,
            columns::SESSION,
        ],
        rows.iter().map(|r| CorrectedRecord {
            timestamp: r.timestamp,
            power_shelly_c: r.power_reference_c,
            power_hwmon_c: r.power_secondary_c,
            session: &r.session,
        }),
    )?;
    Ok(path)
}

/// Write `mean.csv` with the single baseline row.
pub fn write_means(dir: &Path, means: &BaselineMeans) -> Result<PathBuf> {
    let path = dir.join(columns::MEANS_FILE);
    write_records(
        &path,
        &["shelly_mean", "hwmon_mean"],
        std::iter::once(MeansRecord {
            shelly_mean: means.reference_mean,
            hwmon_mean: means.secondary_mean,
        }),
    )?;
    Ok(path)
}

/// Write `energy_consumption_{shelly,hwmon}.csv`.
pub fn write_energy(dir: &Path, source: PowerSource, results: &[EnergyResult]) -> Result<PathBuf> {
    let path = dir.join(columns::energy_file(source));
    write_records(
        &path,
        &ENERGY_HEADERS,
        results.iter().map(|r| EnergyRecord {
            session: &r.session,
            joules: r.joules,
            watt_hours: r.watt_hours,
            kilowatt_hours: r.kilowatt_hours,
        }),
    )?;
    Ok(path)
}

/// Write `percentage.csv`.
pub fn write_ratios(dir: &Path, ratios: &[SessionRatio]) -> Result<PathBuf> {
    let path = dir.join(columns::RATIO_FILE);
    write_records(
        &path,
        &[columns::SESSION, "percentage_hwmon_of_shelly"],
        ratios.iter().map(|r| RatioRecord {
            session: &r.session,
            percentage_hwmon_of_shelly: r.mean_percentage,
        }),
    )?;
    Ok(path)
}

/// Write `period_{interval}.csv`.
pub fn write_period(dir: &Path, interval: usize, rows: &[PeriodRow]) -> Result<PathBuf> {
    let path = dir.join(columns::period_file(interval));
    write_records(
        &path,
        &["sample", columns::SESSION, columns::POWER_SHELLY, columns::POWER_HWMON],
        rows.iter(),
    )?;
    Ok(path)
}

/// Write `summary.json`, pretty-printed.
pub fn write_summary<T: Serialize>(dir: &Path, summary: &T) -> Result<PathBuf> {
    let path = dir.join(columns::SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json).map_err(|e| PowerError::FileWrite {
        path: path.clone(),
        source: e,
    })?;
    info!("Wrote {}", path.display());
    Ok(path)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn write_records<S, I>(path: &Path, headers: &[&str], rows: I) -> Result<()>
where
    S: Serialize,
    I: IntoIterator<Item = S>,
{
    let file = std::fs::File::create(path).map_err(|e| PowerError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(headers)?;
    let mut count = 0usize;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush().map_err(|e| PowerError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!("Wrote {} rows to {}", count, path.display());
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_corrected, load_fused};
    use power_core::timestamp::parse_timestamp;
    use tempfile::TempDir;

    fn fused_rows() -> Vec<FusedReading> {
        let t = parse_timestamp("20240115T10:00:00").unwrap();
        vec![
            FusedReading {
                timestamp: t,
                power_reference: 30.5,
                power_secondary: 12.25,
                session: "Background".into(),
            },
            FusedReading {
                timestamp: t + chrono::Duration::seconds(1),
                power_reference: 41.0,
                power_secondary: 19.0,
                session: "Mail, inbox".into(),
            },
        ]
    }

    #[test]
    fn test_write_fused_layout() {
        let dir = TempDir::new().unwrap();
        let path = write_fused(dir.path(), &fused_rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(path.file_name().unwrap(), "power_log_fusion.csv");
        assert_eq!(lines[0], "timestamp,power_shelly,power_hwmon,session");
        assert_eq!(lines[1], "20240115T10:00:00,30.5,12.25,Background");
        assert_eq!(lines[2], "20240115T10:00:01,41.0,19.0,\"Mail, inbox\"");
    }

    #[test]
    fn test_fused_file_reloads() {
        let dir = TempDir::new().unwrap();
        let rows = fused_rows();
        let path = write_fused(dir.path(), &rows).unwrap();
        let loaded = load_fused(&path).unwrap();
        assert_eq!(loaded.records, rows);
        assert_eq!(loaded.skipped, 0);
    }

    #[test]
    fn test_corrected_file_reloads() {
        let dir = TempDir::new().unwrap();
        let t = parse_timestamp("20240115T10:00:00").unwrap();
        let rows = vec![CorrectedReading {
            timestamp: t,
            power_reference_c: -0.75,
            power_secondary_c: 0.125,
            session: "Background".into(),
        }];
        let path = write_corrected(dir.path(), &rows).unwrap();
        assert_eq!(load_corrected(&path).unwrap().records, rows);
    }

    #[test]
    fn test_write_energy_headers() {
        let dir = TempDir::new().unwrap();
        let results = vec![EnergyResult::from_joules("News", 7_200.0)];
        let path = write_energy(dir.path(), PowerSource::Reference, &results).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert_eq!(path.file_name().unwrap(), "energy_consumption_shelly.csv");
        assert!(text.starts_with(
            "Session,Total Energy (Joules),Total Energy (Wh),Total Energy (kWh)\n"
        ));
        assert!(text.contains("News,7200.0,2.0,0.002"));
    }

    #[test]
    fn test_write_empty_table_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = write_ratios(dir.path(), &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "session,percentage_hwmon_of_shelly\n");
    }

    #[test]
    fn test_write_means_single_row() {
        let dir = TempDir::new().unwrap();
        let means = BaselineMeans {
            reference_mean: 32.0,
            secondary_mean: 11.5,
        };
        let path = write_means(dir.path(), &means).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "shelly_mean,hwmon_mean\n32.0,11.5\n");
    }

    #[test]
    fn test_write_period_file_name() {
        let dir = TempDir::new().unwrap();
        let rows = vec![PeriodRow {
            sample: 0,
            session: "A".into(),
            power_shelly: 1.5,
            power_hwmon: 0.5,
        }];
        let path = write_period(dir.path(), 60, &rows).unwrap();
        assert_eq!(path.file_name().unwrap(), "period_60.csv");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "sample,session,power_shelly,power_hwmon\n0,A,1.5,0.5\n");
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = write_ratios(&missing, &[]).unwrap_err();
        assert!(matches!(err, PowerError::FileWrite { .. }));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
