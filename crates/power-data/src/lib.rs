//! Data layer for power-compare.
//!
//! Loads smart-plug and hardware-sensor power logs, fuses them on time,
//! removes the idle baseline, integrates energy per session and writes the
//! resulting tables.

pub mod analysis;
pub mod baseline;
pub mod columns;
pub mod energy;
pub mod fusion;
pub mod loader;
pub mod period;
pub mod ratio;
pub mod writer;

pub use power_core as core;
