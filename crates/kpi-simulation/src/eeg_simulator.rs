//! Dual-channel EEG simulator producing loader-shaped recordings

use crate::signal_patterns::SignalPattern;
use kpi_core::{config_error, KpiError, KpiResult, RawRecording, RecordingMeta};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Components and independent noise of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub components: Vec<SignalPattern>,
    /// Standard deviation of white noise private to this channel (µV)
    pub noise_std: f64,
}

impl ChannelProfile {
    /// Resting EEG: alpha-dominant with some theta and beta
    pub fn resting() -> Self {
        Self {
            components: vec![
                SignalPattern::Rhythm { frequency: 10.0, amplitude: 20.0, phase: 0.0 },
                SignalPattern::Rhythm { frequency: 6.0, amplitude: 6.0, phase: 0.7 },
                SignalPattern::Rhythm { frequency: 21.0, amplitude: 3.0, phase: 1.3 },
            ],
            noise_std: 4.0,
        }
    }

    /// Disconnected electrode: a constant level and nothing else
    pub fn flat(level: f64) -> Self {
        Self {
            components: vec![SignalPattern::Constant { level }],
            noise_std: 0.0,
        }
    }

    pub fn with_component(mut self, pattern: SignalPattern) -> Self {
        self.components.push(pattern);
        self
    }
}

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegConfig {
    /// Rate the samples are actually generated at (Hz)
    pub sampling_rate: f64,
    /// Rate reported as the device setting; may differ from the actual one
    pub nominal_rate: f64,
    pub channels: [ChannelProfile; 2],
    /// Standard deviation of a noise source common to both channels (µV)
    pub shared_noise_std: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 250.0,
            nominal_rate: 250.0,
            channels: [ChannelProfile::resting(), ChannelProfile::resting()],
            shared_noise_std: 2.0,
            seed: None,
        }
    }
}

impl EegConfig {
    fn validate(&self) -> KpiResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(KpiError::InvalidSamplingRate { rate: self.sampling_rate });
        }
        if !(self.nominal_rate.is_finite() && self.nominal_rate > 0.0) {
            return Err(KpiError::InvalidSamplingRate { rate: self.nominal_rate });
        }
        Ok(())
    }
}

pub struct EegSimulator {
    config: EegConfig,
    rng: StdRng,
    channel_noise: [Normal<f64>; 2],
    shared_noise: Normal<f64>,
}

fn normal(std_dev: f64) -> KpiResult<Normal<f64>> {
    Normal::new(0.0, std_dev).map_err(|e| config_error!("invalid noise level {}: {}", std_dev, e))
}

impl EegSimulator {
    pub fn new(config: EegConfig) -> KpiResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });

        let channel_noise = [normal(config.channels[0].noise_std)?, normal(config.channels[1].noise_std)?];
        let shared_noise = normal(config.shared_noise_std)?;

        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            channel_noise,
            shared_noise,
        })
    }

    /// Generate a recording of `duration_secs` seconds starting at t = 0
    pub fn generate(&mut self, meta: RecordingMeta, duration_secs: f64) -> KpiResult<RawRecording> {
        let fs = self.config.sampling_rate;
        let n = (duration_secs.max(0.0) * fs).round() as usize;
        let dt = 1.0 / fs;

        let mut timestamps = Vec::with_capacity(n);
        let mut ch1 = Vec::with_capacity(n);
        let mut ch2 = Vec::with_capacity(n);

        for i in 0..n {
            let time = i as f64 * dt;
            let shared = self.shared_noise.sample(&mut self.rng);
            timestamps.push(time);
            ch1.push(self.sample(0, time, dt) + shared);
            ch2.push(self.sample(1, time, dt) + shared);
        }

        RawRecording::new(meta, ch1, ch2, timestamps, self.config.nominal_rate)
    }

    fn sample(&mut self, channel: usize, time: f64, dt: f64) -> f64 {
        let profile = &self.config.channels[channel];
        let deterministic: f64 = profile.components.iter().map(|p| p.value_at(time, dt)).sum();
        deterministic + self.channel_noise[channel].sample(&mut self.rng)
    }

    pub fn config(&self) -> &EegConfig {
        &self.config
    }
}
