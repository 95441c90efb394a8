//! Per-session ratio of hardware-sensor power to smart-plug power.
//!
//! A calibration metric: how much of the wall power the internal sensor
//! accounts for. It runs on the raw fused rows and never applies the
//! baseline correction.

use std::collections::BTreeMap;

use power_core::formatting::percent_of;
use power_core::models::{FusedReading, SessionRatio};

/// `secondary / reference × 100` for one row, `0.0` when reference is zero.
pub fn row_percentage(row: &FusedReading) -> f64 {
    percent_of(row.power_secondary, row.power_reference)
}

/// Mean per-row percentage for each session other than `idle_session`,
/// ordered by session label.
pub fn mean_ratio_by_session(rows: &[FusedReading], idle_session: &str) -> Vec<SessionRatio> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.session != idle_session) {
        let entry = sums.entry(row.session.as_str()).or_insert((0.0, 0));
        entry.0 += row_percentage(row);
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(session, (sum, count))| SessionRatio {
            session: session.to_string(),
            mean_percentage: sum / count as f64,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
