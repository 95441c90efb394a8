//! Plain-text summary printed after a run.

use std::fmt;

use power_core::formatting::{format_energy, format_number, format_percent, format_watts};
use power_core::models::{EnergyResult, PowerSource};
use power_data::analysis::AnalysisResult;
use power_data::energy::sort_by_energy_desc;

/// Terminal report for one run. Sections for stages that produced nothing
/// are left out.
pub struct Report<'a>(pub &'a AnalysisResult);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        let meta = &result.metadata;

        writeln!(f, "Power comparison ({})", meta.mode)?;

        for input in &meta.inputs {
            writeln!(
                f,
                "  {}: {} rows loaded, {} skipped",
                input.path, input.loaded, input.skipped
            )?;
        }

        if result.fused.is_some() {
            writeln!(
                f,
                "  Fused rows: {} ({} unmatched reference readings, tolerance {} s, {} lookup)",
                meta.fused_rows,
                meta.dropped_reference,
                format_number(meta.tolerance_seconds, 3),
                meta.strategy
            )?;
        }

        if let Some(means) = &result.baseline {
            writeln!(
                f,
                "  Baseline '{}': {} shelly, {} hwmon",
                meta.idle_session,
                format_watts(means.reference_mean),
                format_watts(means.secondary_mean)
            )?;
        }

        for source in [PowerSource::Reference, PowerSource::Secondary] {
            if let Some(table) = result.energy(source) {
                writeln!(f)?;
                write_energy(f, source, table)?;
            }
        }

        if let Some(ratios) = &result.ratios {
            writeln!(f)?;
            writeln!(f, "hwmon / shelly by session:")?;
            let width = label_width(ratios.iter().map(|r| r.session.as_str()));
            for ratio in ratios {
                writeln!(
                    f,
                    "  {:<width$}  {:>8}",
                    ratio.session,
                    format_percent(ratio.mean_percentage),
                    width = width
                )?;
            }
        }

        if !meta.outputs.is_empty() {
            writeln!(f)?;
            writeln!(f, "Written:")?;
            for path in &meta.outputs {
                writeln!(f, "  {}", path)?;
            }
        }

        Ok(())
    }
}

/// Render the report for `result` into a string.
pub fn render(result: &AnalysisResult) -> String {
    Report(result).to_string()
}

fn write_energy(f: &mut fmt::Formatter<'_>, source: PowerSource, table: &[EnergyResult]) -> fmt::Result {
    let mut sorted = table.to_vec();
    sort_by_energy_desc(&mut sorted);

    writeln!(f, "Energy by session ({}):", source)?;
    let width = label_width(sorted.iter().map(|r| r.session.as_str()));
    for result in &sorted {
        writeln!(
            f,
            "  {:<width$}  {}",
            result.session,
            format_energy(result.joules),
            width = width
        )?;
    }
    Ok(())
}

fn label_width<'a>(labels: impl Iterator<Item = &'a str>) -> usize {
    labels.map(|l| l.chars().count()).max().unwrap_or(0)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
