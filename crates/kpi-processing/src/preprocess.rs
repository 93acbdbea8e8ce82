//! Per-channel denoising and sampling-rate resolution

use crate::config::{FilterConfig, SamplingConfig};
use crate::filters::FilterBank;
use kpi_core::{ChannelId, KpiResult, PipelineEvent, RawRecording};
use tracing::debug;

/// Sampling rate used for every frequency-dependent step of one recording
#[derive(Debug, Clone, PartialEq)]
pub struct RateCheck {
    /// Rate derived from the timestamps
    pub observed: f64,
    /// Set when the observed rate deviates beyond tolerance
    pub deviation: Option<PipelineEvent>,
}

/// Derive the observed rate and compare it with the nominal one.
///
/// Non-monotonic timestamps or a non-positive rate are fatal for the
/// recording. A deviation beyond tolerance is only reported; the observed
/// rate is used either way.
pub fn resolve_sampling_rate(raw: &RawRecording, config: &SamplingConfig) -> KpiResult<RateCheck> {
    let observed = raw.observed_sampling_rate()?;
    let deviation = raw.rate_deviation(observed);

    let event = (deviation > config.deviation_tolerance).then(|| PipelineEvent::SamplingRateDeviation {
        nominal: raw.nominal_rate(),
        observed,
        deviation,
    });

    Ok(RateCheck { observed, deviation: event })
}

/// Filtered copy of a recording, same shape as the raw channels
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedRecording {
    pub channels: [Vec<f64>; 2],
    pub sampling_rate: f64,
}

impl PreprocessedRecording {
    pub fn channel(&self, channel: ChannelId) -> &[f64] {
        &self.channels[channel.index()]
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }
}

/// Mains notch followed by the band-limiting filter, both zero phase
#[derive(Debug, Clone)]
pub struct Preprocessor {
    bank: FilterBank,
    sampling_rate: f64,
}

impl Preprocessor {
    /// Design filters for the observed rate of one recording
    pub fn design(config: &FilterConfig, sampling_rate: f64) -> KpiResult<Self> {
        let bank = FilterBank::eeg_preprocessing(config, sampling_rate)?;
        for filter in bank.filters() {
            debug!(
                filter = filter.name(),
                sections = filter.sections().len(),
                sampling_rate,
                "designed preprocessing filter"
            );
        }
        Ok(Self { bank, sampling_rate })
    }

    pub fn apply(&self, channel: &[f64]) -> Vec<f64> {
        self.bank.apply(channel)
    }

    pub fn apply_recording(&self, raw: &RawRecording) -> PreprocessedRecording {
        PreprocessedRecording {
            channels: [
                self.apply(raw.channel(ChannelId::Ch1)),
                self.apply(raw.channel(ChannelId::Ch2)),
            ],
            sampling_rate: self.sampling_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::{Condition, KpiError, RecordingMeta};

    fn recording(rate: f64, nominal: f64, n: usize) -> RawRecording {
        let meta = RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt");
        let ts = (0..n).map(|i| i as f64 / rate).collect();
        RawRecording::new(meta, vec![0.0; n], vec![0.0; n], ts, nominal).unwrap()
    }

    #[test]
    fn test_rate_within_tolerance() {
        let check = resolve_sampling_rate(&recording(240.0, 250.0, 1000), &SamplingConfig::default()).unwrap();
        assert!((check.observed - 240.0).abs() < 1e-6);
        assert!(check.deviation.is_none());
    }

    #[test]
    fn test_rate_deviation_warns_and_uses_observed() {
        let check = resolve_sampling_rate(&recording(200.0, 250.0, 1000), &SamplingConfig::default()).unwrap();
        assert!((check.observed - 200.0).abs() < 1e-6);
        let event = check.deviation.unwrap();
        assert_eq!(event.code(), "sampling-rate-deviation-warning");
    }

    #[test]
    fn test_non_monotonic_is_fatal() {
        let meta = RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt");
        let ts = vec![0.0, 0.004, 0.008, 0.006, 0.010];
        let raw = RawRecording::new(meta, vec![0.0; 5], vec![0.0; 5], ts, 250.0).unwrap();
        assert!(matches!(
            resolve_sampling_rate(&raw, &SamplingConfig::default()),
            Err(KpiError::NonMonotonicTimestamps { index: 3 })
        ));
    }

    #[test]
    fn test_preprocess_keeps_length() {
        let raw = recording(250.0, 250.0, 3000);
        let pre = Preprocessor::design(&FilterConfig::default(), 250.0).unwrap();
        let out = pre.apply_recording(&raw);
        assert_eq!(out.len(), 3000);
        assert_eq!(out.channel(ChannelId::Ch2).len(), 3000);
    }
}
