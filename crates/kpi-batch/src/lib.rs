//! KPI-Batch: directory in, KPI table out
//!
//! Scans a directory for recordings, runs every file through the
//! [`kpi_processing::KpiPipeline`] on a bounded worker pool and writes one
//! row per retained recording plus a run summary.

pub mod loader;
pub mod scanner;
pub mod service;
pub mod summary;
pub mod synth;
pub mod writer;

pub use loader::{load_recording, parse_timestamp, read_recording};
pub use scanner::{scan_directory, FilenameParser, ScanResult, ScannedFile};
pub use service::{BatchOutcome, BatchRunner, FileOutcome};
pub use summary::{BatchSummary, ColumnMissing};
pub use synth::{write_recording, SynthPlan};
pub use writer::TableWriter;
