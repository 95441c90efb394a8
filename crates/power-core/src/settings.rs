use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PowerError, Result};
use crate::models::BACKGROUND_SESSION;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Compare browsing energy measured by a smart plug and a hardware sensor
#[derive(Parser, Debug, Clone)]
#[command(
    name = "power-compare",
    about = "Compare browsing energy measured by a smart plug and a hardware sensor",
    version
)]
pub struct Settings {
    /// Reference (smart-plug) log: timestamp,power
    #[arg(long, env = "POWER_COMPARE_REFERENCE", default_value = "power_log_shelly.csv")]
    pub reference: PathBuf,

    /// Secondary (hardware sensor) log: timestamp,power,session
    #[arg(long, env = "POWER_COMPARE_SECONDARY", default_value = "power_log_hwmon.csv")]
    pub secondary: PathBuf,

    /// Directory receiving every generated table
    #[arg(long, env = "POWER_COMPARE_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    /// Maximum timestamp distance in seconds for two readings to be paired
    #[arg(long, default_value = "1.0")]
    pub tolerance: f64,

    /// Session label of the idle calibration interval
    #[arg(long, default_value = BACKGROUND_SESSION)]
    pub idle_session: String,

    /// Matching strategy used by the time join
    #[arg(long, default_value = "linear", value_parser = ["linear", "bucket"])]
    pub strategy: String,

    /// Pipeline stage(s) to run
    #[arg(long, default_value = "all", value_parser = ["all", "fuse", "correct", "energy", "ratio", "period"])]
    pub mode: String,

    /// Sample counts for the per-session period windows
    #[arg(long, value_delimiter = ',', default_value = "60,120,240")]
    pub period_intervals: Vec<usize>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Typed options ──────────────────────────────────────────────────────────────

/// How the fuser looks up a secondary reading for each reference reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategyKind {
    /// Scan the whole secondary stream in order.
    Linear,
    /// Look only at neighbouring time buckets of an index.
    Bucket,
}

impl std::str::FromStr for MatchStrategyKind {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(MatchStrategyKind::Linear),
            "bucket" => Ok(MatchStrategyKind::Bucket),
            other => Err(PowerError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

/// Which stage(s) of the pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    All,
    Fuse,
    Correct,
    Energy,
    Ratio,
    Period,
}

impl std::str::FromStr for RunMode {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(RunMode::All),
            "fuse" => Ok(RunMode::Fuse),
            "correct" => Ok(RunMode::Correct),
            "energy" => Ok(RunMode::Energy),
            "ratio" => Ok(RunMode::Ratio),
            "period" => Ok(RunMode::Period),
            other => Err(PowerError::Config(format!("unknown mode: {}", other))),
        }
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Validated options handed to every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub reference_path: PathBuf,
    pub secondary_path: PathBuf,
    pub output_dir: PathBuf,
    pub tolerance: chrono::Duration,
    pub idle_session: String,
    pub strategy: MatchStrategyKind,
    pub period_intervals: Vec<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_path: PathBuf::from("power_log_shelly.csv"),
            secondary_path: PathBuf::from("power_log_hwmon.csv"),
            output_dir: PathBuf::from("results"),
            tolerance: chrono::Duration::seconds(1),
            idle_session: BACKGROUND_SESSION.to_string(),
            strategy: MatchStrategyKind::Linear,
            period_intervals: vec![60, 120, 240],
        }
    }
}

impl PipelineConfig {
    /// Tolerance expressed in fractional seconds.
    pub fn tolerance_secs(&self) -> f64 {
        match self.tolerance.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => self.tolerance.num_milliseconds() as f64 / 1_000.0,
        }
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] but from an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The stage selection as a typed value.
    pub fn run_mode(&self) -> Result<RunMode> {
        self.mode.parse()
    }

    /// Validate the CLI values and build the stage configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PowerError::Config(format!(
                "tolerance must be a non-negative number of seconds, got {}",
                self.tolerance
            )));
        }
        // One day is far beyond any sensible pairing window.
        if self.tolerance > 86_400.0 {
            return Err(PowerError::Config(format!(
                "tolerance of {} s is larger than one day",
                self.tolerance
            )));
        }

        let idle_session = self.idle_session.trim();
        if idle_session.is_empty() {
            return Err(PowerError::Config("idle session label is empty".to_string()));
        }

        if self.period_intervals.iter().any(|&n| n == 0) {
            return Err(PowerError::Config(
                "period intervals must be greater than zero".to_string(),
            ));
        }

        let tolerance = chrono::Duration::microseconds((self.tolerance * 1_000_000.0).round() as i64);

        Ok(PipelineConfig {
            reference_path: self.reference.clone(),
            secondary_path: self.secondary.clone(),
            output_dir: self.output_dir.clone(),
            tolerance,
            idle_session: idle_session.to_string(),
            strategy: self.strategy.parse()?,
            period_intervals: self.period_intervals.clone(),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["power-compare"]);

        assert_eq!(settings.reference, PathBuf::from("power_log_shelly.csv"));
        assert_eq!(settings.secondary, PathBuf::from("power_log_hwmon.csv"));
        assert_eq!(settings.output_dir, PathBuf::from("results"));
        assert!((settings.tolerance - 1.0).abs() < f64::EPSILON);
        assert_eq!(settings.idle_session, "Background");
        assert_eq!(settings.strategy, "linear");
        assert_eq!(settings.mode, "all");
        assert_eq!(settings.period_intervals, vec![60, 120, 240]);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_cli_paths() {
        let settings = Settings::parse_from([
            "power-compare",
            "--reference",
            "/data/shelly.csv",
            "--secondary",
            "/data/hwmon.csv",
            "--output-dir",
            "/tmp/out",
        ]);
        assert_eq!(settings.reference, PathBuf::from("/data/shelly.csv"));
        assert_eq!(settings.secondary, PathBuf::from("/data/hwmon.csv"));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_settings_period_intervals_comma_list() {
        let settings = Settings::parse_from(["power-compare", "--period-intervals", "10,20"]);
        assert_eq!(settings.period_intervals, vec![10, 20]);
    }

    #[test]
    fn test_settings_rejects_unknown_mode() {
        let parsed = Settings::try_parse_from(["power-compare", "--mode", "plot"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_debug_overrides_log_level() {
        let settings = Settings::load_from_args(["power-compare", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_pipeline_config_from_defaults() {
        let settings = Settings::parse_from(["power-compare"]);
        let config = settings.pipeline_config().unwrap();
        assert_eq!(config.tolerance, chrono::Duration::seconds(1));
        assert_eq!(config.idle_session, "Background");
        assert_eq!(config.strategy, MatchStrategyKind::Linear);
        assert!((config.tolerance_secs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pipeline_config_fractional_tolerance() {
        let settings = Settings::parse_from(["power-compare", "--tolerance", "0.5", "--strategy", "bucket"]);
        let config = settings.pipeline_config().unwrap();
        assert_eq!(config.tolerance, chrono::Duration::milliseconds(500));
        assert_eq!(config.strategy, MatchStrategyKind::Bucket);
    }

    #[test]
    fn test_pipeline_config_rejects_negative_tolerance() {
        let settings = Settings::parse_from(["power-compare", "--tolerance=-1"]);
        assert!(matches!(settings.pipeline_config(), Err(PowerError::Config(_))));
    }

    #[test]
    fn test_pipeline_config_rejects_blank_idle_label() {
        let settings = Settings::parse_from(["power-compare", "--idle-session", "  "]);
        assert!(matches!(settings.pipeline_config(), Err(PowerError::Config(_))));
    }

    #[test]
    fn test_pipeline_config_rejects_zero_interval() {
        let settings = Settings::parse_from(["power-compare", "--period-intervals", "60,0"]);
        assert!(matches!(settings.pipeline_config(), Err(PowerError::Config(_))));
    }

    #[test]
    fn test_run_mode_parsing() {
        let settings = Settings::parse_from(["power-compare", "--mode", "energy"]);
        assert_eq!(settings.run_mode().unwrap(), RunMode::Energy);
        assert!("bogus".parse::<RunMode>().is_err());
    }
}
