//! Whole-recording KPI pipeline
//!
//! `RawRecording -> Preprocessor -> Epocher -> ArtifactGate -> FeatureBank
//! -> Aggregator`, one call per recording with no state carried between
//! calls.

use crate::aggregate::Aggregator;
use crate::config::PipelineConfig;
use crate::epoch::Epocher;
use crate::features::FeatureBank;
use crate::gate::{ArtifactGate, EpochTally};
use crate::preprocess::{resolve_sampling_rate, Preprocessor};
use kpi_core::{AggregatedRecord, FeatureVector, KpiResult, KpiSchema, PipelineEvent, RawRecording, RecordingMeta};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of one recording
#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub record: AggregatedRecord,
    /// Events in the order they were raised; each was also logged
    pub events: Vec<PipelineEvent>,
    pub epochs: EpochTally,
    pub observed_rate: f64,
    pub elapsed: Duration,
}

pub struct KpiPipeline {
    config: PipelineConfig,
    schema: KpiSchema,
    epocher: Epocher,
    gate: ArtifactGate,
    bank: FeatureBank,
    aggregator: Aggregator,
}

impl KpiPipeline {
    /// Validate `config` and resolve the capability table. Any error here
    /// is a setup error; no recording has been touched yet.
    pub fn new(config: PipelineConfig) -> KpiResult<Self> {
        let schema = config.validate()?;
        let epocher = Epocher::new(&config.epoch)?;
        let gate = ArtifactGate::new(&config.gate);
        let bank = FeatureBank::from_config(&config, &schema);
        let aggregator = Aggregator::new(&schema);

        info!(
            columns = schema.columns().len(),
            groups = ?schema.groups(),
            calculators = bank.len(),
            "KPI pipeline ready"
        );

        Ok(Self {
            config,
            schema,
            epocher,
            gate,
            bank,
            aggregator,
        })
    }

    /// Replace the calculators derived from the configuration
    pub fn with_feature_bank(mut self, bank: FeatureBank) -> Self {
        self.bank = bank;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &KpiSchema {
        &self.schema
    }

    /// Process one recording.
    ///
    /// Errors are fatal for this recording only (bad timestamps, a rate no
    /// filter can be designed for). Disqualification is not an error: it
    /// yields an all-not-computable record.
    pub fn process(&self, raw: &RawRecording) -> KpiResult<RecordingReport> {
        let start = Instant::now();
        let meta = raw.meta();
        let mut events = Vec::new();

        // Fewer than two samples imply no rate; the nominal one sizes the duration check
        let fs = if raw.len() < 2 {
            raw.nominal_rate()
        } else {
            let rate = resolve_sampling_rate(raw, &self.config.sampling)?;
            if let Some(event) = rate.deviation {
                raise(&mut events, meta, event);
            }
            rate.observed
        };

        if let Some((reason, event)) = self.gate.check_duration(raw.len(), fs) {
            raise(&mut events, meta, event);
            return Ok(RecordingReport {
                record: AggregatedRecord::disqualified(meta.clone(), &self.schema, reason),
                events,
                epochs: EpochTally::default(),
                observed_rate: fs,
                elapsed: start.elapsed(),
            });
        }

        let (flat, flat_events) = self.gate.flat_channels(raw.channels());
        for event in flat_events {
            raise(&mut events, meta, event);
        }

        let preprocessed = Preprocessor::design(&self.config.filter, fs)?.apply_recording(raw);
        let mut epochs = self.epocher.segment(&preprocessed.channels, fs);
        let tally = self.gate.screen(&mut epochs);
        debug!(
            recording = %meta,
            total = tally.total,
            rejected = tally.rejected,
            accepted = tally.accepted,
            "epochs screened"
        );

        if let Some((reason, event)) = self.gate.check_clean_epochs(&tally) {
            raise(&mut events, meta, event);
            return Ok(RecordingReport {
                record: AggregatedRecord::disqualified(meta.clone(), &self.schema, reason),
                events,
                epochs: tally,
                observed_rate: fs,
                elapsed: start.elapsed(),
            });
        }

        let features: Vec<FeatureVector> = epochs
            .iter()
            .filter(|epoch| epoch.is_clean())
            .map(|epoch| self.bank.compute(epoch, fs, flat))
            .collect();
        let record = self.aggregator.aggregate(meta.clone(), &features, flat);

        let elapsed = start.elapsed();
        info!(
            recording = %meta,
            accepted = tally.accepted,
            rejected = tally.rejected,
            computable = record.computable_count(),
            retained = record.retained,
            elapsed_ms = elapsed.as_millis() as u64,
            "recording processed"
        );

        Ok(RecordingReport {
            record,
            events,
            epochs: tally,
            observed_rate: fs,
            elapsed,
        })
    }
}

fn raise(events: &mut Vec<PipelineEvent>, meta: &RecordingMeta, event: PipelineEvent) {
    event.emit(meta);
    events.push(event);
}
