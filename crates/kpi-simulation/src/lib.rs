//! KPI-Simulation: synthetic dual-channel EEG recordings
//!
//! Seeded generators for tests, benchmarks and demo data sets.

pub mod eeg_simulator;
pub mod signal_patterns;

pub use eeg_simulator::*;
pub use signal_patterns::*;
