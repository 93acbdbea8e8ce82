//! KPI-Core: Foundation types for the EEG KPI pipeline
//!
//! Recordings, the KPI catalog and capability table, aggregated output
//! rows, pipeline events and the shared error type.

pub mod error;
pub mod event;
pub mod kpi;
pub mod record;
pub mod recording;

pub use error::{KpiError, KpiResult};
pub use event::PipelineEvent;
pub use kpi::*;
pub use record::*;
pub use recording::*;
