//! KPI-Processing: offline EEG feature pipeline
//!
//! Zero-phase filtering, epoching, artifact gating, per-epoch feature
//! extraction and per-recording aggregation.

pub mod aggregate;
pub mod config;
pub mod epoch;
pub mod features;
pub mod filters;
pub mod gate;
pub mod pipeline;
pub mod preprocess;
pub mod spectrum;

pub use aggregate::Aggregator;
pub use config::{
    AperiodicConfig, BandRange, BandTable, CrossConfig, EpochConfig, FilterConfig, GateConfig, KpiSelection,
    NonlinearConfig, PeakExclusion, PipelineConfig, SamplingConfig, SpectralConfig, TimeConfig,
};
pub use epoch::{Epoch, EpochStatus, Epocher, RejectionReason};
pub use features::{
    ChannelCalculator, CrossChannelCalculator, FeatureBank, NonlinearCalculator, PairCalculator,
    SpectralCalculator, TimeDomainCalculator,
};
pub use filters::{ButterworthFilter, FilterBank, NotchFilter, SosFilter};
pub use gate::{ArtifactGate, EpochTally, FlatChannels};
pub use pipeline::{KpiPipeline, RecordingReport};
pub use preprocess::{resolve_sampling_rate, PreprocessedRecording, Preprocessor, RateCheck};
pub use spectrum::{CrossSpectrum, Psd, Welch};
