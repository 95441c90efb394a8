//! Idle baseline subtraction.
//!
//! The idle session records what the machine draws with nothing but the
//! desktop running. Its mean power per source is subtracted from every row so
//! that session totals measure only the extra load of the visited page.

use power_core::error::{PowerError, Result};
use power_core::models::{BaselineMeans, CorrectedReading, FusedReading};
use tracing::info;

/// Mean power of each source over the rows labelled `idle_session`.
///
/// Fails with [`PowerError::MissingBaseline`] when no row carries the label;
/// substituting zero would silently bias every energy total.
pub fn compute_baseline(rows: &[FusedReading], idle_session: &str) -> Result<BaselineMeans> {
    let (count, reference_sum, secondary_sum) = rows
        .iter()
        .filter(|r| r.session == idle_session)
        .fold((0usize, 0.0f64, 0.0f64), |(n, a, b), r| {
            (n + 1, a + r.power_reference, b + r.power_secondary)
        });

    if count == 0 {
        return Err(PowerError::MissingBaseline {
            session: idle_session.to_string(),
        });
    }

    Ok(BaselineMeans {
        reference_mean: reference_sum / count as f64,
        secondary_mean: secondary_sum / count as f64,
    })
}

/// Subtract `means` from every row, idle rows included.
pub fn subtract_baseline(rows: Vec<FusedReading>, means: &BaselineMeans) -> Vec<CorrectedReading> {
    rows.into_iter()
        .map(|r| CorrectedReading {
            timestamp: r.timestamp,
            power_reference_c: r.power_reference - means.reference_mean,
            power_secondary_c: r.power_secondary - means.secondary_mean,
            session: r.session,
        })
        .collect()
}

/// Compute the idle baseline and apply it, returning the corrected rows and
/// the means that were subtracted.
pub fn correct_baseline(
    rows: Vec<FusedReading>,
    idle_session: &str,
) -> Result<(Vec<CorrectedReading>, BaselineMeans)> {
    let means = compute_baseline(&rows, idle_session)?;
    info!(
        "Baseline '{}': reference {:.3} W, secondary {:.3} W",
        idle_session, means.reference_mean, means.secondary_mean
    );
    Ok((subtract_baseline(rows, &means), means))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
