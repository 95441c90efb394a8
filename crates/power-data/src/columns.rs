//! Column and file names shared by the loader and the writer.

pub const TIMESTAMP: &str = "timestamp";
pub const POWER: &str = "power";
pub const SESSION: &str = "session";

pub const POWER_SHELLY: &str = "power_shelly";
pub const POWER_HWMON: &str = "power_hwmon";
pub const POWER_SHELLY_C: &str = "power_shelly_c";
pub const POWER_HWMON_C: &str = "power_hwmon_c";

pub const FUSED_FILE: &str = "power_log_fusion.csv";
pub const CORRECTED_FILE: &str = "power_log_corrected.csv";
pub const MEANS_FILE: &str = "mean.csv";
pub const RATIO_FILE: &str = "percentage.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// `energy_consumption_shelly.csv` / `energy_consumption_hwmon.csv`.
pub fn energy_file(source: power_core::models::PowerSource) -> String {
    format!("energy_consumption_{}.csv", source.label())
}

/// `period_60.csv` and friends.
pub fn period_file(interval: usize) -> String {
    format!("period_{}.csv", interval)
}
