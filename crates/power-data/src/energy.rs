//! Per-session energy integration.
//!
//! Each row's power is multiplied by the time since the previous row of the
//! same session (zero-order hold). The first row has no predecessor and
//! borrows the delta of the second row, so a session of `n` evenly spaced
//! samples integrates over `n` intervals. A session with a single row
//! integrates to zero.

use power_core::error::{PowerError, Result};
use power_core::models::{EnergyResult, PowerSource, SessionSample};
use power_core::timestamp::seconds_between;
use tracing::{debug, info};

/// Time deltas in seconds for rows already sorted by timestamp.
///
/// `deltas[i] = t[i] - t[i-1]` for `i >= 1`, `deltas[0] = deltas[1]`, and a
/// lone row gets `0.0`.
pub fn time_deltas<T: SessionSample>(sorted: &[&T]) -> Vec<f64> {
    let mut deltas: Vec<f64> = Vec::with_capacity(sorted.len());
    for (i, row) in sorted.iter().enumerate() {
        if i == 0 {
            deltas.push(0.0);
        } else {
            deltas.push(seconds_between(&sorted[i - 1].timestamp(), &row.timestamp()));
        }
    }
    if deltas.len() >= 2 {
        deltas[0] = deltas[1];
    }
    deltas
}

/// Total energy in joules for the rows of a single session.
///
/// Rows are stable-sorted by timestamp first, so equal timestamps keep
/// their input order.
pub fn session_joules<T: SessionSample>(rows: &[&T], source: PowerSource) -> f64 {
    let mut sorted: Vec<&T> = rows.to_vec();
    sorted.sort_by_key(|r| r.timestamp());

    let deltas = time_deltas(&sorted);
    sorted
        .iter()
        .zip(deltas.iter())
        .map(|(row, dt)| row.power(source) * dt)
        .sum()
}

/// Energy per session for one power column, idle session excluded.
///
/// Sessions are returned in the order they are first encountered in `rows`.
/// Returns [`PowerError::EmptyResult`] when no non-idle session exists.
pub fn integrate_sessions<T: SessionSample>(
    rows: &[T],
    source: PowerSource,
    idle_session: &str,
) -> Result<Vec<EnergyResult>> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: std::collections::HashMap<&str, Vec<&T>> = std::collections::HashMap::new();

    for row in rows {
        let session = row.session();
        if session == idle_session {
            continue;
        }
        let bucket = grouped.entry(session).or_insert_with(|| {
            order.push(session);
            Vec::new()
        });
        bucket.push(row);
    }

    if order.is_empty() {
        return Err(PowerError::EmptyResult(format!(
            "no sessions other than '{}' to integrate",
            idle_session
        )));
    }

    debug!("Integrating {} energy over {} sessions", source, order.len());

    let results: Vec<EnergyResult> = order
        .into_iter()
        .map(|session| {
            let session_rows = grouped.get(session).map(Vec::as_slice).unwrap_or(&[]);
            let result = EnergyResult::from_joules(session, session_joules(session_rows, source));
            info!(
                "Session '{}' ({}): {:.2} J, {:.4} Wh, {:.6} kWh",
                result.session, source, result.joules, result.watt_hours, result.kilowatt_hours
            );
            result
        })
        .collect();

    Ok(results)
}

/// Presentation order: highest watt-hours first, ties keep their order.
pub fn sort_by_energy_desc(results: &mut [EnergyResult]) {
    results.sort_by(|a, b| b.watt_hours.total_cmp(&a.watt_hours));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
