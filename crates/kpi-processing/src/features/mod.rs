//! Feature extraction over accepted epochs
//!
//! Each calculator is a pure function of one epoch and the sampling rate.
//! Failures degrade single metrics to [`KpiValue::NotComputable`]; a
//! calculator never returns an error.

pub mod cross;
pub mod nonlinear;
pub mod spectral;
pub mod time;

use crate::config::PipelineConfig;
use crate::epoch::Epoch;
use crate::gate::FlatChannels;
use kpi_core::{ChannelId, FeatureGroup, FeatureVector, KpiKey, KpiSchema, KpiValue, Metric};

pub use cross::CrossChannelCalculator;
pub use nonlinear::NonlinearCalculator;
pub use spectral::SpectralCalculator;
pub use time::TimeDomainCalculator;

/// Per-channel calculator
pub trait ChannelCalculator: Send + Sync {
    fn compute(&self, data: &[f64], fs: f64) -> Vec<(Metric, KpiValue)>;
}

/// Calculator over the channel pair
pub trait PairCalculator: Send + Sync {
    fn compute(&self, ch1: &[f64], ch2: &[f64], fs: f64) -> Vec<(Metric, KpiValue)>;
}

/// The set of calculators run on every accepted epoch
#[derive(Default)]
pub struct FeatureBank {
    channel: Vec<Box<dyn ChannelCalculator>>,
    pair: Vec<Box<dyn PairCalculator>>,
}

impl FeatureBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculators for every group enabled in `schema`
    pub fn from_config(config: &PipelineConfig, schema: &KpiSchema) -> Self {
        let mut bank = Self::new();
        if schema.is_enabled(FeatureGroup::Time) {
            bank.add_channel_calculator(Box::new(TimeDomainCalculator::new(&config.time)));
        }
        if schema.is_enabled(FeatureGroup::Spectral) {
            bank.add_channel_calculator(Box::new(SpectralCalculator::new(&config.spectral, &config.bands)));
        }
        if schema.is_enabled(FeatureGroup::Nonlinear) {
            bank.add_channel_calculator(Box::new(NonlinearCalculator::new(&config.nonlinear)));
        }
        if schema.is_enabled(FeatureGroup::Cross) {
            bank.add_pair_calculator(Box::new(CrossChannelCalculator::new(&config.cross, &config.bands)));
        }
        bank
    }

    pub fn add_channel_calculator(&mut self, calculator: Box<dyn ChannelCalculator>) {
        self.channel.push(calculator);
    }

    pub fn add_pair_calculator(&mut self, calculator: Box<dyn PairCalculator>) {
        self.pair.push(calculator);
    }

    pub fn len(&self) -> usize {
        self.channel.len() + self.pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// KPIs of one epoch. Rejected epochs yield an empty vector; flat
    /// channels (and the pair, if either is flat) are skipped.
    pub fn compute(&self, epoch: &Epoch<'_>, fs: f64, flat: FlatChannels) -> FeatureVector {
        let mut features = FeatureVector::new();
        if !epoch.is_clean() {
            return features;
        }

        for channel in ChannelId::ALL {
            if flat.is_flat(channel) {
                continue;
            }
            let data = epoch.channel(channel);
            for calculator in &self.channel {
                for (metric, value) in calculator.compute(data, fs) {
                    features.insert(KpiKey::channel(channel, metric), value);
                }
            }
        }

        if !flat.any() {
            let (ch1, ch2) = (epoch.channel(ChannelId::Ch1), epoch.channel(ChannelId::Ch2));
            for calculator in &self.pair {
                for (metric, value) in calculator.compute(ch1, ch2, fs) {
                    features.insert(KpiKey::cross(metric), value);
                }
            }
        }

        features
    }
}

pub(crate) fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance
pub(crate) fn variance(data: &[f64]) -> f64 {
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

pub(crate) fn diff(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Ordinary least squares `y = slope * x + intercept`
pub(crate) fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for i in 0..n {
        sxy += (x[i] - mx) * (y[i] - my);
        sxx += (x[i] - mx).powi(2);
    }
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

/// Ratio that is only defined for a positive denominator
pub(crate) fn ratio(numerator: f64, denominator: f64) -> KpiValue {
    if denominator > 0.0 {
        KpiValue::from_f64(numerator / denominator)
    } else {
        KpiValue::NotComputable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EpochConfig;
    use crate::epoch::{Epocher, RejectionReason};
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_fit() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let (slope, intercept) = linear_fit(&x, &y).unwrap();
        assert_relative_eq!(slope, 2.0);
        assert_relative_eq!(intercept, 1.0);
        assert!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[test]
    fn test_bank_from_config_respects_groups() {
        let mut config = PipelineConfig::default();
        config.kpi.groups = vec![FeatureGroup::Time, FeatureGroup::Cross];
        config.kpi.core = vec!["stat_mean".to_string()];
        let schema = config.validate().unwrap();
        assert_eq!(FeatureBank::from_config(&config, &schema).len(), 2);
    }

    #[test]
    fn test_flat_channel_and_rejected_epoch_skipped() {
        let config = PipelineConfig::default();
        let schema = config.validate().unwrap();
        let bank = FeatureBank::from_config(&config, &schema);

        let fs = 250.0;
        let ch1: Vec<f64> = (0..1000).map(|i| 10.0 * (i as f64 * 0.3).sin()).collect();
        let channels = [ch1, vec![0.0; 1000]];
        let epocher = Epocher::new(&EpochConfig { window_secs: 4.0, overlap_secs: 0.0 }).unwrap();
        let mut epochs = epocher.segment(&channels, fs);

        let flat = {
            let gate = crate::gate::ArtifactGate::new(&config.gate);
            gate.flat_channels(&channels).0
        };
        let features = bank.compute(&epochs[0], fs, flat);
        assert!(features.get(&KpiKey::channel(ChannelId::Ch1, Metric::StatStd)).is_computable());
        assert!(features.iter().all(|(k, _)| k.scope == kpi_core::Scope::Channel(ChannelId::Ch1)));

        epochs[0].reject(RejectionReason::AmplitudeArtifact {
            channel: ChannelId::Ch1,
            peak_to_peak: 500.0,
        });
        assert!(bank.compute(&epochs[0], fs, flat).is_empty());
    }
}
