//! Fixed-length per-session windows of the fused stream.
//!
//! Each window holds the first `interval` samples of every session, indexed
//! from zero, so sessions can be overlaid on a common sample axis.

use std::collections::BTreeMap;

use power_core::models::FusedReading;
use serde::Serialize;

/// One sample of a period window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRow {
    pub sample: usize,
    pub session: String,
    pub power_shelly: f64,
    pub power_hwmon: f64,
}

/// The first `interval` rows of every session, sessions ordered by label and
/// rows by timestamp (stable for equal timestamps).
pub fn period_window(rows: &[FusedReading], interval: usize) -> Vec<PeriodRow> {
    let mut by_session: BTreeMap<&str, Vec<&FusedReading>> = BTreeMap::new();
    for row in rows {
        by_session.entry(row.session.as_str()).or_default().push(row);
    }

    let mut out = Vec::new();
    for (session, mut session_rows) in by_session {
        session_rows.sort_by_key(|r| r.timestamp);
        out.extend(
            session_rows
                .into_iter()
                .take(interval)
                .enumerate()
                .map(|(sample, r)| PeriodRow {
                    sample,
                    session: session.to_string(),
                    power_shelly: r.power_reference,
                    power_hwmon: r.power_secondary,
                }),
        );
    }
    out
}
