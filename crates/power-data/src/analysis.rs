//! Pipeline driver.
//!
//! Composes loading, fusion, baseline correction, energy integration, ratio
//! aggregation and period windows, and writes every table into the output
//! directory. Each stage can also run on its own against the files a
//! previous run left behind.

use std::path::Path;

use chrono::Utc;
use power_core::error::{PowerError, Result};
use power_core::models::{
    BaselineMeans, CorrectedReading, EnergyResult, FusedReading, LoadOutcome, PowerSource, Reading,
    SessionRatio,
};
use power_core::settings::{PipelineConfig, RunMode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::correct_baseline;
use crate::columns;
use crate::energy::integrate_sessions;
use crate::fusion::fuse_streams;
use crate::loader::{load_corrected, load_fused, load_reference_stream, load_secondary_stream};
use crate::period::period_window;
use crate::ratio::mean_ratio_by_session;
use crate::writer;

// ── Public types ──────────────────────────────────────────────────────────────

/// Row counts for one loaded input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    pub path: String,
    pub loaded: usize,
    pub skipped: usize,
}

impl LoadStats {
    fn of<T>(path: &Path, outcome: &LoadOutcome<T>) -> Self {
        Self {
            path: path.display().to_string(),
            loaded: outcome.loaded(),
            skipped: outcome.skipped,
        }
    }
}

/// Metadata produced alongside the analysis result, persisted as
/// `summary.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Stage selection of the run.
    pub mode: String,
    /// Every file read, with loaded and skipped row counts.
    pub inputs: Vec<LoadStats>,
    /// Rows in the fused stream.
    pub fused_rows: usize,
    /// Reference readings without a secondary partner.
    pub dropped_reference: usize,
    pub tolerance_seconds: f64,
    pub strategy: String,
    pub idle_session: String,
    /// Distinct sessions other than the idle one.
    pub sessions: usize,
    /// Every file written.
    pub outputs: Vec<String>,
    /// Wall-clock seconds spent reading inputs.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent in the computing stages.
    pub process_time_seconds: f64,
}

/// Everything a run produced. A `None` stage result means the stage had
/// nothing to work with (or was not part of the selected mode).
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub fused: Option<Vec<FusedReading>>,
    pub corrected: Option<Vec<CorrectedReading>>,
    pub baseline: Option<BaselineMeans>,
    pub energy_reference: Option<Vec<EnergyResult>>,
    pub energy_secondary: Option<Vec<EnergyResult>>,
    pub ratios: Option<Vec<SessionRatio>>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Energy table for `source`, if it was computed.
    pub fn energy(&self, source: PowerSource) -> Option<&[EnergyResult]> {
        match source {
            PowerSource::Reference => self.energy_reference.as_deref(),
            PowerSource::Secondary => self.energy_secondary.as_deref(),
        }
    }
}

// ── Pure pipeline ─────────────────────────────────────────────────────────────

/// Run every computing stage over already-loaded streams.
///
/// 1. Fuse reference and secondary readings.
/// 2. Subtract the idle baseline (fatal if the idle session is absent).
/// 3. Integrate energy per session for both columns of the corrected rows.
/// 4. Average the raw fused power ratio per session.
///
/// An empty fused stream short-circuits the remaining stages.
pub fn analyze(
    reference: &[Reading],
    secondary: &[Reading],
    config: &PipelineConfig,
) -> Result<AnalysisResult> {
    let mut result = AnalysisResult {
        metadata: base_metadata(config, "all"),
        ..Default::default()
    };

    // ── Step 1: Fuse ──────────────────────────────────────────────────────────
    let outcome = fuse_streams(reference, secondary, config.tolerance, config.strategy);
    result.metadata.fused_rows = outcome.fused.len();
    result.metadata.dropped_reference = outcome.dropped;

    let Some(fused) = absent_on_empty("fusion", non_empty(outcome.fused, "no reference reading matched"))? else {
        return Ok(result);
    };
    result.metadata.sessions = count_sessions(&fused, &config.idle_session);

    // ── Step 2: Baseline ──────────────────────────────────────────────────────
    let (corrected, means) = correct_baseline(fused.clone(), &config.idle_session)?;

    // ── Step 3: Energy ────────────────────────────────────────────────────────
    let (energy_reference, energy_secondary) = energy_tables(&corrected, &config.idle_session)?;

    // ── Step 4: Ratio ─────────────────────────────────────────────────────────
    let ratios = ratio_table(&fused, &config.idle_session);

    result.fused = Some(fused);
    result.corrected = Some(corrected);
    result.baseline = Some(means);
    result.energy_reference = energy_reference;
    result.energy_secondary = energy_secondary;
    result.ratios = ratios;
    Ok(result)
}

// ── Stage runners ─────────────────────────────────────────────────────────────

/// Run the stage(s) selected by `mode`, reading inputs from and writing
/// outputs to the locations in `config`.
pub fn run(mode: RunMode, config: &PipelineConfig) -> Result<AnalysisResult> {
    match mode {
        RunMode::All => run_pipeline(config),
        RunMode::Fuse => run_fuse(config),
        RunMode::Correct => run_correct(config),
        RunMode::Energy => run_energy(config),
        RunMode::Ratio => run_ratio(config),
        RunMode::Period => run_period(config),
    }
}

/// Load both raw logs, run every stage and write every table plus
/// `summary.json`.
pub fn run_pipeline(config: &PipelineConfig) -> Result<AnalysisResult> {
    let load_start = std::time::Instant::now();
    let reference = load_reference_stream(&config.reference_path)?;
    let secondary = load_secondary_stream(&config.secondary_path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let process_start = std::time::Instant::now();
    let mut result = analyze(&reference.records, &secondary.records, config)?;
    result.metadata.inputs = vec![
        LoadStats::of(&config.reference_path, &reference),
        LoadStats::of(&config.secondary_path, &secondary),
    ];

    writer::ensure_dir(&config.output_dir)?;
    let dir = config.output_dir.as_path();
    let mut outputs = Vec::new();

    if let Some(fused) = &result.fused {
        outputs.push(writer::write_fused(dir, fused)?);
        for &interval in &config.period_intervals {
            outputs.push(writer::write_period(dir, interval, &period_window(fused, interval))?);
        }
    }
    if let Some(corrected) = &result.corrected {
        outputs.push(writer::write_corrected(dir, corrected)?);
    }
    if let Some(means) = &result.baseline {
        outputs.push(writer::write_means(dir, means)?);
    }
    for source in [PowerSource::Reference, PowerSource::Secondary] {
        if let Some(table) = result.energy(source) {
            outputs.push(writer::write_energy(dir, source, table)?);
        }
    }
    if let Some(ratios) = &result.ratios {
        outputs.push(writer::write_ratios(dir, ratios)?);
    }

    result.metadata.load_time_seconds = load_time;
    result.metadata.process_time_seconds = process_start.elapsed().as_secs_f64();
    result.metadata.outputs = outputs.iter().map(|p| p.display().to_string()).collect();
    writer::write_summary(dir, &result.metadata)?;

    Ok(result)
}

/// Load both raw logs and write only the fused table.
pub fn run_fuse(config: &PipelineConfig) -> Result<AnalysisResult> {
    let reference = load_reference_stream(&config.reference_path)?;
    let secondary = load_secondary_stream(&config.secondary_path)?;

    let mut result = AnalysisResult {
        metadata: base_metadata(config, "fuse"),
        ..Default::default()
    };
    result.metadata.inputs = vec![
        LoadStats::of(&config.reference_path, &reference),
        LoadStats::of(&config.secondary_path, &secondary),
    ];

    let outcome = fuse_streams(
        &reference.records,
        &secondary.records,
        config.tolerance,
        config.strategy,
    );
    result.metadata.fused_rows = outcome.fused.len();
    result.metadata.dropped_reference = outcome.dropped;

    if let Some(fused) = absent_on_empty("fusion", non_empty(outcome.fused, "no reference reading matched"))? {
        writer::ensure_dir(&config.output_dir)?;
        let path = writer::write_fused(&config.output_dir, &fused)?;
        result.metadata.outputs.push(path.display().to_string());
        result.metadata.sessions = count_sessions(&fused, &config.idle_session);
        result.fused = Some(fused);
    }
    Ok(result)
}

/// Read the fused table and write the corrected table and baseline means.
pub fn run_correct(config: &PipelineConfig) -> Result<AnalysisResult> {
    let (mut result, fused) = load_fused_stage(config, "correct")?;
    let Some(fused) = fused else {
        return Ok(result);
    };

    let (corrected, means) = correct_baseline(fused, &config.idle_session)?;
    let dir = config.output_dir.as_path();
    result.metadata.outputs.push(writer::write_corrected(dir, &corrected)?.display().to_string());
    result.metadata.outputs.push(writer::write_means(dir, &means)?.display().to_string());
    result.corrected = Some(corrected);
    result.baseline = Some(means);
    Ok(result)
}

/// Read the corrected table and write both energy tables.
pub fn run_energy(config: &PipelineConfig) -> Result<AnalysisResult> {
    let path = config.output_dir.join(columns::CORRECTED_FILE);
    let loaded = load_corrected(&path)?;

    let mut result = AnalysisResult {
        metadata: base_metadata(config, "energy"),
        ..Default::default()
    };
    result.metadata.inputs.push(LoadStats::of(&path, &loaded));

    let Some(corrected) = absent_on_empty("energy", non_empty(loaded.records, "corrected table has no rows"))? else {
        return Ok(result);
    };
    result.metadata.sessions = count_sessions(&corrected, &config.idle_session);

    let (energy_reference, energy_secondary) = energy_tables(&corrected, &config.idle_session)?;
    result.energy_reference = energy_reference;
    result.energy_secondary = energy_secondary;

    for source in [PowerSource::Reference, PowerSource::Secondary] {
        if let Some(table) = result.energy(source) {
            let written = writer::write_energy(&config.output_dir, source, table)?;
            result.metadata.outputs.push(written.display().to_string());
        }
    }
    result.corrected = Some(corrected);
    Ok(result)
}

/// Read the fused table and write the ratio table.
pub fn run_ratio(config: &PipelineConfig) -> Result<AnalysisResult> {
    let (mut result, fused) = load_fused_stage(config, "ratio")?;
    let Some(fused) = fused else {
        return Ok(result);
    };

    if let Some(ratios) = ratio_table(&fused, &config.idle_session) {
        let written = writer::write_ratios(&config.output_dir, &ratios)?;
        result.metadata.outputs.push(written.display().to_string());
        result.ratios = Some(ratios);
    }
    result.fused = Some(fused);
    Ok(result)
}

/// Read the fused table and write one period window per configured interval.
pub fn run_period(config: &PipelineConfig) -> Result<AnalysisResult> {
    let (mut result, fused) = load_fused_stage(config, "period")?;
    let Some(fused) = fused else {
        return Ok(result);
    };

    for &interval in &config.period_intervals {
        let window = period_window(&fused, interval);
        let written = writer::write_period(&config.output_dir, interval, &window)?;
        result.metadata.outputs.push(written.display().to_string());
    }
    result.fused = Some(fused);
    Ok(result)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn base_metadata(config: &PipelineConfig, mode: &str) -> AnalysisMetadata {
    AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        mode: mode.to_string(),
        tolerance_seconds: config.tolerance_secs(),
        strategy: format!("{:?}", config.strategy).to_lowercase(),
        idle_session: config.idle_session.clone(),
        ..Default::default()
    }
}

/// Load `power_log_fusion.csv` from the output directory for a single-stage
/// run. `None` when the file has no usable rows.
fn load_fused_stage(
    config: &PipelineConfig,
    mode: &str,
) -> Result<(AnalysisResult, Option<Vec<FusedReading>>)> {
    let path = config.output_dir.join(columns::FUSED_FILE);
    let loaded = load_fused(&path)?;

    let mut result = AnalysisResult {
        metadata: base_metadata(config, mode),
        ..Default::default()
    };
    result.metadata.inputs.push(LoadStats::of(&path, &loaded));
    result.metadata.fused_rows = loaded.loaded();

    let fused = absent_on_empty(mode, non_empty(loaded.records, "fused table has no rows"))?;
    if let Some(rows) = &fused {
        result.metadata.sessions = count_sessions(rows, &config.idle_session);
    }
    Ok((result, fused))
}

fn energy_tables(
    corrected: &[CorrectedReading],
    idle_session: &str,
) -> Result<(Option<Vec<EnergyResult>>, Option<Vec<EnergyResult>>)> {
    let reference = absent_on_empty(
        "energy (shelly)",
        integrate_sessions(corrected, PowerSource::Reference, idle_session),
    )?;
    let secondary = absent_on_empty(
        "energy (hwmon)",
        integrate_sessions(corrected, PowerSource::Secondary, idle_session),
    )?;
    Ok((reference, secondary))
}

fn ratio_table(fused: &[FusedReading], idle_session: &str) -> Option<Vec<SessionRatio>> {
    let ratios = mean_ratio_by_session(fused, idle_session);
    if ratios.is_empty() {
        warn!("Ratio stage: no sessions other than '{}'", idle_session);
        return None;
    }
    info!("Computed ratios for {} sessions", ratios.len());
    Some(ratios)
}

fn count_sessions<T: power_core::models::SessionSample>(rows: &[T], idle_session: &str) -> usize {
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for row in rows {
        if row.session() != idle_session {
            seen.insert(row.session());
        }
    }
    seen.len()
}

fn non_empty<T>(rows: Vec<T>, reason: &str) -> Result<Vec<T>> {
    if rows.is_empty() {
        Err(PowerError::EmptyResult(reason.to_string()))
    } else {
        Ok(rows)
    }
}

/// Turn an [`PowerError::EmptyResult`] into an absent stage result, logging
/// it. Every other error still propagates.
fn absent_on_empty<T>(stage: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PowerError::EmptyResult(reason)) => {
            warn!("{} stage produced no result: {}", stage, reason);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
