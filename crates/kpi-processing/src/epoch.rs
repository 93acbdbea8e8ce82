//! Fixed-length, overlapping windows over a preprocessed recording

use crate::config::EpochConfig;
use kpi_core::{config_error, ChannelId, KpiResult};

/// Why an epoch was excluded from feature extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectionReason {
    AmplitudeArtifact {
        channel: ChannelId,
        peak_to_peak: f64,
    },
}

impl RejectionReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::AmplitudeArtifact { .. } => "amplitude artifact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpochStatus {
    Clean,
    Rejected(RejectionReason),
}

/// One window of both channels, borrowed from the filtered recording
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch<'a> {
    pub index: usize,
    /// Offset of the first sample in the recording
    pub start: usize,
    pub channels: [&'a [f64]; 2],
    pub status: EpochStatus,
}

impl<'a> Epoch<'a> {
    pub fn channel(&self, channel: ChannelId) -> &'a [f64] {
        self.channels[channel.index()]
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.status == EpochStatus::Clean
    }

    pub fn reject(&mut self, reason: RejectionReason) {
        self.status = EpochStatus::Rejected(reason);
    }
}

/// Window and step lengths in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epocher {
    window_secs: f64,
    overlap_secs: f64,
}

impl Epocher {
    /// Requires `window > overlap >= 0`
    pub fn new(config: &EpochConfig) -> KpiResult<Self> {
        let (window, overlap) = (config.window_secs, config.overlap_secs);
        if !(window.is_finite() && window > 0.0 && overlap >= 0.0 && overlap < window) {
            return Err(config_error!(
                "epoch window {}s must exceed overlap {}s >= 0",
                window,
                overlap
            ));
        }
        Ok(Self {
            window_secs: window,
            overlap_secs: overlap,
        })
    }

    /// Samples per epoch at `fs`
    pub fn window_samples(&self, fs: f64) -> usize {
        (self.window_secs * fs).round() as usize
    }

    /// Samples between consecutive epoch starts at `fs`
    pub fn step_samples(&self, fs: f64) -> usize {
        (((self.window_secs - self.overlap_secs) * fs).round() as usize).max(1)
    }

    /// Number of whole windows that fit in `n_samples`
    pub fn epoch_count(&self, n_samples: usize, fs: f64) -> usize {
        let window = self.window_samples(fs);
        if window == 0 || n_samples < window {
            return 0;
        }
        (n_samples - window) / self.step_samples(fs) + 1
    }

    /// Slice both channels into clean epochs, start-time ascending.
    ///
    /// A trailing window shorter than the epoch length is dropped.
    pub fn segment<'a>(&self, channels: &'a [Vec<f64>; 2], fs: f64) -> Vec<Epoch<'a>> {
        let n = channels[0].len().min(channels[1].len());
        let window = self.window_samples(fs);
        let step = self.step_samples(fs);

        (0..self.epoch_count(n, fs))
            .map(|index| {
                let start = index * step;
                Epoch {
                    index,
                    start,
                    channels: [
                        &channels[0][start..start + window],
                        &channels[1][start..start + window],
                    ],
                    status: EpochStatus::Clean,
                }
            })
            .collect()
    }
}
