//! Raw two-channel recordings and their metadata

use crate::error::{KpiError, KpiResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Listening condition of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    /// `G` in file names, code 1
    Positive,
    /// `B` in file names, code 2
    Negative,
}

impl Condition {
    /// Parse the single-letter condition tag used in file names
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'G' => Some(Condition::Positive),
            'B' => Some(Condition::Negative),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Condition::Positive => 'G',
            Condition::Negative => 'B',
        }
    }

    /// Numeric code written to the KPI table
    pub fn code(self) -> u8 {
        match self {
            Condition::Positive => 1,
            Condition::Negative => 2,
        }
    }
}

/// One of the two recorded channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelId {
    Ch1,
    Ch2,
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId::Ch1, ChannelId::Ch2];

    pub fn index(self) -> usize {
        match self {
            ChannelId::Ch1 => 0,
            ChannelId::Ch2 => 1,
        }
    }

    /// Column prefix used in the KPI table
    pub fn label(self) -> &'static str {
        match self {
            ChannelId::Ch1 => "Ch1",
            ChannelId::Ch2 => "Ch2",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of a recording, parsed from its file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub subject: String,
    pub condition: Condition,
    pub trial: u32,
    pub filename: String,
}

impl RecordingMeta {
    pub fn new(subject: impl Into<String>, condition: Condition, trial: u32, filename: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            condition,
            trial,
            filename: filename.into(),
        }
    }

    /// Sort key giving a deterministic table order
    pub fn sort_key(&self) -> (&str, Condition, u32) {
        (&self.subject, self.condition, self.trial)
    }
}

impl fmt::Display for RecordingMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{:03}", self.subject, self.condition.letter(), self.trial)
    }
}

/// Dual-channel recording as delivered by the loader, in microvolts.
///
/// Immutable once constructed. Timestamps are in seconds and are only used
/// to derive the observed sampling rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecording {
    meta: RecordingMeta,
    channels: [Vec<f64>; 2],
    timestamps: Vec<f64>,
    nominal_rate: f64,
}

impl RawRecording {
    pub fn new(
        meta: RecordingMeta,
        ch1: Vec<f64>,
        ch2: Vec<f64>,
        timestamps: Vec<f64>,
        nominal_rate: f64,
    ) -> KpiResult<Self> {
        if ch1.len() != ch2.len() || ch1.len() != timestamps.len() {
            return Err(KpiError::ChannelLengthMismatch {
                ch1: ch1.len(),
                ch2: ch2.len(),
                timestamps: timestamps.len(),
            });
        }
        if !(nominal_rate.is_finite() && nominal_rate > 0.0) {
            return Err(KpiError::InvalidSamplingRate { rate: nominal_rate });
        }

        Ok(Self {
            meta,
            channels: [ch1, ch2],
            timestamps,
            nominal_rate,
        })
    }

    pub fn meta(&self) -> &RecordingMeta {
        &self.meta
    }

    pub fn channel(&self, channel: ChannelId) -> &[f64] {
        &self.channels[channel.index()]
    }

    pub fn channels(&self) -> &[Vec<f64>; 2] {
        &self.channels
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn nominal_rate(&self) -> f64 {
        self.nominal_rate
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sampling rate implied by the mean timestamp increment.
    ///
    /// Fails when fewer than two samples exist, when a timestamp goes
    /// backwards, or when the derived rate is not a positive finite number.
    pub fn observed_sampling_rate(&self) -> KpiResult<f64> {
        let n = self.timestamps.len();
        if n < 2 {
            return Err(KpiError::InsufficientSamples { available: n, required: 2 });
        }

        if let Some(index) = self
            .timestamps
            .windows(2)
            .position(|w| w[1] < w[0] || w[1].is_nan())
        {
            return Err(KpiError::NonMonotonicTimestamps { index: index + 1 });
        }

        let span = self.timestamps[n - 1] - self.timestamps[0];
        let rate = (n - 1) as f64 / span;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(KpiError::InvalidSamplingRate { rate });
        }
        Ok(rate)
    }

    /// Relative deviation of `observed` from the nominal rate
    pub fn rate_deviation(&self, observed: f64) -> f64 {
        (observed - self.nominal_rate).abs() / self.nominal_rate
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();

        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> RecordingMeta {
        RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt")
    }

    fn timestamps(n: usize, rate: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 / rate).collect()
    }

    #[test]
    fn test_condition_letters() {
        assert_eq!(Condition::from_letter('g'), Some(Condition::Positive));
        assert_eq!(Condition::from_letter('B'), Some(Condition::Negative));
        assert_eq!(Condition::from_letter('x'), None);
        assert_eq!(Condition::Negative.code(), 2);
    }

    #[test]
    fn test_meta_display() {
        assert_eq!(meta().to_string(), "S01_G_001");
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = RawRecording::new(meta(), vec![0.0; 10], vec![0.0; 9], timestamps(10, 250.0), 250.0);
        assert!(matches!(result, Err(KpiError::ChannelLengthMismatch { .. })));
    }

    #[test]
    fn test_observed_rate() {
        let rec = RawRecording::new(meta(), vec![0.0; 500], vec![0.0; 500], timestamps(500, 200.0), 250.0).unwrap();
        let rate = rec.observed_sampling_rate().unwrap();
        assert!((rate - 200.0).abs() < 1e-9);
        assert!((rec.rate_deviation(rate) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_non_monotonic_timestamps() {
        let mut ts = timestamps(100, 250.0);
        ts[40] = ts[38];
        let rec = RawRecording::new(meta(), vec![0.0; 100], vec![0.0; 100], ts, 250.0).unwrap();
        assert_eq!(
            rec.observed_sampling_rate(),
            Err(KpiError::NonMonotonicTimestamps { index: 40 })
        );
    }

    #[test]
    fn test_repeated_timestamp_accepted() {
        let mut ts = timestamps(100, 250.0);
        ts[41] = ts[40];
        let rec = RawRecording::new(meta(), vec![0.0; 100], vec![0.0; 100], ts, 250.0).unwrap();
        let rate = rec.observed_sampling_rate().unwrap();
        assert!((rate - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_timestamps_invalid_rate() {
        let rec = RawRecording::new(meta(), vec![0.0; 10], vec![0.0; 10], vec![1.0; 10], 250.0).unwrap();
        assert!(matches!(
            rec.observed_sampling_rate(),
            Err(KpiError::InvalidSamplingRate { .. })
        ));
    }

    #[test]
    fn test_channel_stats() {
        let stats = ChannelStats::calculate(&[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.rms, 1.0);
        assert_eq!(stats.std_dev, 1.0);
        assert_eq!(stats.peak_to_peak, 2.0);
    }
}
