use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Session label reserved for the idle calibration interval.
pub const BACKGROUND_SESSION: &str = "Background";

/// A single power sample from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock time the sample was taken.
    pub timestamp: NaiveDateTime,
    /// Instantaneous power in watts. Always finite.
    pub power: f64,
    /// Session label. Only the secondary source carries one.
    #[serde(default)]
    pub session: Option<String>,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, power: f64) -> Self {
        Self {
            timestamp,
            power,
            session: None,
        }
    }

    pub fn with_session(timestamp: NaiveDateTime, power: f64, session: impl Into<String>) -> Self {
        Self {
            timestamp,
            power,
            session: Some(session.into()),
        }
    }
}

/// A reference sample paired with the secondary sample it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedReading {
    /// Timestamp of the reference sample.
    pub timestamp: NaiveDateTime,
    /// Smart-plug power in watts.
    pub power_reference: f64,
    /// Hardware sensor power in watts.
    pub power_secondary: f64,
    /// Session inherited from the matched secondary sample.
    pub session: String,
}

/// A fused row with the idle baseline subtracted from both power columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedReading {
    pub timestamp: NaiveDateTime,
    pub power_reference_c: f64,
    pub power_secondary_c: f64,
    pub session: String,
}

/// Mean idle power of each source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineMeans {
    pub reference_mean: f64,
    pub secondary_mean: f64,
}

/// Energy consumed during one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyResult {
    pub session: String,
    pub joules: f64,
    pub watt_hours: f64,
    pub kilowatt_hours: f64,
}

impl EnergyResult {
    /// Build a result from a joule total, deriving Wh and kWh.
    pub fn from_joules(session: impl Into<String>, joules: f64) -> Self {
        let watt_hours = joules / 3_600.0;
        Self {
            session: session.into(),
            joules,
            watt_hours,
            kilowatt_hours: joules / 3_600_000.0,
        }
    }
}

/// Mean percentage of secondary power relative to reference power in one
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRatio {
    pub session: String,
    pub mean_percentage: f64,
}

/// Which of the two power columns an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSource {
    /// The external smart-plug meter (Shelly).
    Reference,
    /// The internal hardware power sensor (hwmon).
    Secondary,
}

impl PowerSource {
    /// Short name used in file names and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            PowerSource::Reference => "shelly",
            PowerSource::Secondary => "hwmon",
        }
    }
}

impl std::fmt::Display for PowerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Rows that carry a timestamp, a session and both power columns.
///
/// Lets the integrator and the period windows run over either raw fused rows
/// or baseline-corrected rows.
pub trait SessionSample {
    fn timestamp(&self) -> NaiveDateTime;
    fn session(&self) -> &str;
    fn power(&self, source: PowerSource) -> f64;
}

impl SessionSample for FusedReading {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn session(&self) -> &str {
        &self.session
    }

    fn power(&self, source: PowerSource) -> f64 {
        match source {
            PowerSource::Reference => self.power_reference,
            PowerSource::Secondary => self.power_secondary,
        }
    }
}

impl SessionSample for CorrectedReading {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn session(&self) -> &str {
        &self.session
    }

    fn power(&self, source: PowerSource) -> f64 {
        match source {
            PowerSource::Reference => self.power_reference_c,
            PowerSource::Secondary => self.power_secondary_c,
        }
    }
}

/// Records produced by a lenient load, plus how many rows were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> LoadOutcome<T> {
    pub fn loaded(&self) -> usize {
        self.records.len()
    }
}
