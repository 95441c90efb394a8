//! Time join of the reference and secondary power streams.
//!
//! Every reference reading is paired with the *first* secondary reading, in
//! secondary-stream order, whose timestamp lies within the tolerance. This is
//! deliberately not a closest-match join: historical outputs were produced
//! with first-acceptable-match semantics and must stay reproducible.
//! Reference readings without a partner are dropped.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use power_core::models::{FusedReading, Reading};
use power_core::settings::MatchStrategyKind;
use tracing::{debug, info};

// ── MatchStrategy ─────────────────────────────────────────────────────────────

/// Looks up the secondary reading a reference reading should be paired with.
///
/// Implementations must return the earliest reading *in secondary-stream
/// order* among all readings within tolerance, not the chronologically
/// closest one.
pub trait MatchStrategy<'s> {
    fn find_match(&self, reference: &Reading) -> Option<&'s Reading>;
}

/// Whether `a` and `b` are at most `tolerance` apart (inclusive).
pub fn within_tolerance(a: NaiveDateTime, b: NaiveDateTime, tolerance: Duration) -> bool {
    let delta = if a >= b { a - b } else { b - a };
    delta <= tolerance
}

/// Unindexed nested scan: O(R×S) over the whole fusion.
pub struct LinearScan<'s> {
    secondary: &'s [Reading],
    tolerance: Duration,
}

impl<'s> LinearScan<'s> {
    pub fn new(secondary: &'s [Reading], tolerance: Duration) -> Self {
        Self {
            secondary,
            tolerance,
        }
    }
}

impl<'s> MatchStrategy<'s> for LinearScan<'s> {
    fn find_match(&self, reference: &Reading) -> Option<&'s Reading> {
        self.secondary
            .iter()
            .find(|s| within_tolerance(reference.timestamp, s.timestamp, self.tolerance))
    }
}

/// Secondary stream indexed by fixed-width time buckets.
///
/// Buckets are at least as wide as the tolerance, so every candidate for a
/// reference reading lives in one of three neighbouring buckets. Each bucket
/// keeps stream positions in ascending order and the smallest qualifying
/// position across buckets wins, which keeps the result identical to
/// [`LinearScan`] even when several candidates fall within tolerance.
pub struct BucketIndex<'s> {
    secondary: &'s [Reading],
    tolerance: Duration,
    width_ms: i64,
    buckets: HashMap<i64, Vec<usize>>,
}

impl<'s> BucketIndex<'s> {
    /// Minimum bucket width; keeps the index small for sub-second tolerances.
    const MIN_WIDTH_MS: i64 = 1_000;

    pub fn new(secondary: &'s [Reading], tolerance: Duration) -> Self {
        let width_ms = tolerance.num_milliseconds().max(Self::MIN_WIDTH_MS);
        let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
        for (pos, reading) in secondary.iter().enumerate() {
            buckets
                .entry(bucket_key(reading.timestamp, width_ms))
                .or_default()
                .push(pos);
        }
        debug!(
            "BucketIndex: {} readings in {} buckets of {} ms",
            secondary.len(),
            buckets.len(),
            width_ms
        );
        Self {
            secondary,
            tolerance,
            width_ms,
            buckets,
        }
    }
}

impl<'s> MatchStrategy<'s> for BucketIndex<'s> {
    fn find_match(&self, reference: &Reading) -> Option<&'s Reading> {
        let ts = reference.timestamp;
        let lo = ts
            .checked_sub_signed(self.tolerance)
            .unwrap_or(NaiveDateTime::MIN);
        let hi = ts
            .checked_add_signed(self.tolerance)
            .unwrap_or(NaiveDateTime::MAX);

        let mut best: Option<usize> = None;
        for key in bucket_key(lo, self.width_ms)..=bucket_key(hi, self.width_ms) {
            let Some(positions) = self.buckets.get(&key) else {
                continue;
            };
            // Positions are ascending, so the first hit is this bucket's earliest.
            let hit = positions.iter().copied().find(|&pos| {
                within_tolerance(ts, self.secondary[pos].timestamp, self.tolerance)
            });
            if let Some(pos) = hit {
                best = Some(best.map_or(pos, |b| b.min(pos)));
            }
        }
        best.map(|pos| &self.secondary[pos])
    }
}

fn bucket_key(ts: NaiveDateTime, width_ms: i64) -> i64 {
    ts.and_utc().timestamp_millis().div_euclid(width_ms)
}

// ── Fusion ────────────────────────────────────────────────────────────────────

/// Output of [`fuse`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutcome {
    /// One row per matched reference reading, in reference-stream order.
    pub fused: Vec<FusedReading>,
    /// Reference readings that found no partner within tolerance.
    pub dropped: usize,
}

/// Pair every reference reading with its secondary match.
///
/// The fused row takes the reference timestamp and the secondary session.
pub fn fuse<'s, M>(reference: &[Reading], strategy: &M) -> FusionOutcome
where
    M: MatchStrategy<'s>,
{
    let mut fused = Vec::with_capacity(reference.len());
    let mut dropped = 0usize;

    for r in reference {
        match strategy.find_match(r) {
            Some(s) => fused.push(FusedReading {
                timestamp: r.timestamp,
                power_reference: r.power,
                power_secondary: s.power,
                session: s.session.clone().unwrap_or_default(),
            }),
            None => dropped += 1,
        }
    }

    FusionOutcome { fused, dropped }
}

/// Build the strategy selected by `kind` over `secondary` and run [`fuse`].
pub fn fuse_streams(
    reference: &[Reading],
    secondary: &[Reading],
    tolerance: Duration,
    kind: MatchStrategyKind,
) -> FusionOutcome {
    let outcome = match kind {
        MatchStrategyKind::Linear => fuse(reference, &LinearScan::new(secondary, tolerance)),
        MatchStrategyKind::Bucket => fuse(reference, &BucketIndex::new(secondary, tolerance)),
    };
    info!(
        "Fused {} of {} reference readings ({} dropped, {:?} strategy)",
        outcome.fused.len(),
        reference.len(),
        outcome.dropped,
        kind
    );
    outcome
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use power_core::timestamp::parse_timestamp;

    fn t0() -> NaiveDateTime {
        parse_timestamp("20240115T10:00:00").unwrap()
    }

    fn at(offset_ms: i64) -> NaiveDateTime {
        t0() + Duration::milliseconds(offset_ms)
    }

    fn ref_reading(offset_ms: i64, power: f64) -> Reading {
        Reading::new(at(offset_ms), power)
    }

    fn sec_reading(offset_ms: i64, power: f64, session: &str) -> Reading {
        Reading::with_session(at(offset_ms), power, session)
    }

    fn both(reference: &[Reading], secondary: &[Reading], tol: Duration) -> [FusionOutcome; 2] {
        [
            fuse_streams(reference, secondary, tol, MatchStrategyKind::Linear),
            fuse_streams(reference, secondary, tol, MatchStrategyKind::Bucket),
        ]
    }

    // ── tolerance ─────────────────────────────────────────────────────────────

    #[test]
    fn test_match_at_exactly_one_second() {
        let reference = [ref_reading(0, 10.0)];
        let secondary = [sec_reading(1_000, 4.0, "A")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused.len(), 1);
            assert_eq!(out.dropped, 0);
        }
    }

    #[test]
    fn test_no_match_just_past_one_second() {
        let reference = [ref_reading(0, 10.0)];
        let secondary = [sec_reading(1_001, 4.0, "A")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert!(out.fused.is_empty());
            assert_eq!(out.dropped, 1);
        }
    }

    #[test]
    fn test_match_when_secondary_is_earlier() {
        let reference = [ref_reading(5_000, 10.0)];
        let secondary = [sec_reading(4_000, 4.0, "A")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused.len(), 1);
        }
    }

    #[test]
    fn test_zero_tolerance_requires_equal_timestamps() {
        let reference = [ref_reading(0, 1.0), ref_reading(2_000, 2.0)];
        let secondary = [sec_reading(0, 3.0, "A"), sec_reading(2_500, 4.0, "A")];
        for out in both(&reference, &secondary, Duration::zero()) {
            assert_eq!(out.fused.len(), 1);
            assert_eq!(out.fused[0].power_reference, 1.0);
        }
    }

    // ── tie-break ─────────────────────────────────────────────────────────────

    #[test]
    fn test_first_acceptable_match_not_closest() {
        let reference = [ref_reading(0, 10.0)];
        // Earlier in the list but further away in time.
        let secondary = [sec_reading(900, 7.0, "First"), sec_reading(0, 9.0, "Closest")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused[0].power_secondary, 7.0);
            assert_eq!(out.fused[0].session, "First");
        }
    }

    #[test]
    fn test_tie_break_across_buckets_uses_stream_order() {
        // Candidates land in different one-second buckets; the later bucket's
        // reading comes first in the stream.
        let reference = [ref_reading(1_500, 10.0)];
        let secondary = [sec_reading(2_400, 1.0, "Later bucket"), sec_reading(600, 2.0, "Earlier bucket")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused[0].session, "Later bucket");
        }
    }

    // ── output shape ──────────────────────────────────────────────────────────

    #[test]
    fn test_fused_rows_follow_reference_order_and_timestamps() {
        let reference = [ref_reading(2_000, 12.0), ref_reading(0, 10.0), ref_reading(9_000, 99.0)];
        let secondary = [sec_reading(0, 4.0, "A"), sec_reading(2_000, 5.0, "B")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused.len(), 2);
            assert_eq!(out.dropped, 1);
            assert_eq!(out.fused[0].timestamp, at(2_000));
            assert_eq!(out.fused[0].power_reference, 12.0);
            assert_eq!(out.fused[0].power_secondary, 5.0);
            assert_eq!(out.fused[0].session, "B");
            assert_eq!(out.fused[1].timestamp, at(0));
            assert_eq!(out.fused[1].session, "A");
        }
    }

    #[test]
    fn test_secondary_reading_may_match_many_references() {
        let reference = [ref_reading(0, 1.0), ref_reading(500, 2.0), ref_reading(1_000, 3.0)];
        let secondary = [sec_reading(500, 4.0, "A")];
        for out in both(&reference, &secondary, Duration::seconds(1)) {
            assert_eq!(out.fused.len(), 3);
            assert!(out.fused.iter().all(|f| f.power_secondary == 4.0));
        }
    }

    #[test]
    fn test_empty_inputs() {
        let secondary = [sec_reading(0, 4.0, "A")];
        for out in both(&[], &secondary, Duration::seconds(1)) {
            assert!(out.fused.is_empty());
            assert_eq!(out.dropped, 0);
        }
        let reference = [ref_reading(0, 1.0)];
        for out in both(&reference, &[], Duration::seconds(1)) {
            assert!(out.fused.is_empty());
            assert_eq!(out.dropped, 1);
        }
    }

    // ── strategy equivalence ──────────────────────────────────────────────────

    #[test]
    fn test_bucket_index_agrees_with_linear_scan() {
        // Deterministic pseudo-random jitter around a one-second cadence, with
        // the secondary stream deliberately shuffled.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move |modulo: i64| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as i64).rem_euclid(modulo)
        };

        let reference: Vec<Reading> = (0..300)
            .map(|i| ref_reading(i * 1_000 + next(400), i as f64))
            .collect();
        let mut secondary: Vec<Reading> = (0..300)
            .map(|i| sec_reading(i * 1_000 + next(1_500), i as f64, &format!("S{}", i % 7)))
            .collect();
        for i in (1..secondary.len()).rev() {
            let j = next(i as i64 + 1) as usize;
            secondary.swap(i, j);
        }

        for tol_ms in [0, 250, 1_000, 2_500] {
            let tol = Duration::milliseconds(tol_ms);
            let linear = fuse(&reference, &LinearScan::new(&secondary, tol));
            let bucket = fuse(&reference, &BucketIndex::new(&secondary, tol));
            assert_eq!(linear, bucket, "strategies diverged at tolerance {} ms", tol_ms);
        }
    }
}
