//! Artifact rejection and recording-level quality gates

use crate::config::GateConfig;
use crate::epoch::{Epoch, RejectionReason};
use kpi_core::{ChannelId, ChannelStats, Disqualification, PipelineEvent};

/// Channels whose whole-recording standard deviation is below epsilon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlatChannels([bool; 2]);

impl FlatChannels {
    pub fn from_flags(flags: [bool; 2]) -> Self {
        Self(flags)
    }

    pub fn is_flat(&self, channel: ChannelId) -> bool {
        self.0[channel.index()]
    }

    pub fn any(&self) -> bool {
        self.0[0] || self.0[1]
    }

    pub fn all(&self) -> bool {
        self.0[0] && self.0[1]
    }
}

/// Outcome of screening the epochs of one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochTally {
    pub total: usize,
    pub rejected: usize,
    pub accepted: usize,
}

impl EpochTally {
    /// Fraction of epochs rejected
    pub fn drop_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactGate {
    config: GateConfig,
}

impl ArtifactGate {
    pub fn new(config: &GateConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Recording too short to epoch
    pub fn check_duration(&self, n_samples: usize, fs: f64) -> Option<(Disqualification, PipelineEvent)> {
        let duration_secs = n_samples as f64 / fs;
        (duration_secs < self.config.min_duration_secs).then(|| {
            (
                Disqualification::ShortRecording,
                PipelineEvent::ShortRecording {
                    duration_secs,
                    min_secs: self.config.min_duration_secs,
                },
            )
        })
    }

    /// Flatline check over the whole raw recording
    pub fn flat_channels(&self, channels: &[Vec<f64>; 2]) -> (FlatChannels, Vec<PipelineEvent>) {
        let mut flags = [false; 2];
        let mut events = Vec::new();
        for channel in ChannelId::ALL {
            let std_dev = ChannelStats::calculate(&channels[channel.index()]).std_dev;
            if !(std_dev >= self.config.flatline_epsilon) {
                flags[channel.index()] = true;
                events.push(PipelineEvent::ChannelFlatline { channel, std_dev });
            }
        }
        (FlatChannels::from_flags(flags), events)
    }

    /// Mark every epoch in which any channel exceeds the peak-to-peak limit
    pub fn screen(&self, epochs: &mut [Epoch<'_>]) -> EpochTally {
        let mut tally = EpochTally {
            total: epochs.len(),
            ..EpochTally::default()
        };

        for epoch in epochs.iter_mut() {
            let offending = ChannelId::ALL.iter().find_map(|&channel| {
                let peak_to_peak = ChannelStats::calculate(epoch.channel(channel)).peak_to_peak;
                (peak_to_peak > self.config.artifact_threshold_uv).then_some(
                    RejectionReason::AmplitudeArtifact {
                        channel,
                        peak_to_peak,
                    },
                )
            });

            match offending {
                Some(reason) => {
                    epoch.reject(reason);
                    tally.rejected += 1;
                }
                None => tally.accepted += 1,
            }
        }
        tally
    }

    /// Too few epochs survived screening
    pub fn check_clean_epochs(&self, tally: &EpochTally) -> Option<(Disqualification, PipelineEvent)> {
        (tally.accepted < self.config.min_clean_epochs).then(|| {
            (
                Disqualification::InsufficientCleanEpochs,
                PipelineEvent::InsufficientCleanEpochs {
                    accepted: tally.accepted,
                    required: self.config.min_clean_epochs,
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EpochConfig;
    use crate::epoch::{EpochStatus, Epocher};

    fn gate() -> ArtifactGate {
        ArtifactGate::new(&GateConfig::default())
    }

    fn sine(n: usize, amp: f64) -> Vec<f64> {
        (0..n).map(|i| amp * (i as f64 * 0.25).sin()).collect()
    }

    #[test]
    fn test_short_recording() {
        assert!(gate().check_duration(2499, 250.0).is_some());
        assert!(gate().check_duration(2500, 250.0).is_none());
    }

    #[test]
    fn test_flatline_detection() {
        let channels = [sine(1000, 20.0), vec![12.5; 1000]];
        let (flat, events) = gate().flat_channels(&channels);
        assert!(!flat.is_flat(ChannelId::Ch1));
        assert!(flat.is_flat(ChannelId::Ch2));
        assert!(flat.any() && !flat.all());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code(), "channel-flatline-warning");
    }

    #[test]
    fn test_amplitude_artifact_rejects_epoch() {
        let fs = 100.0;
        let mut ch2 = sine(1000, 20.0);
        ch2[450] = 400.0;
        let channels = [sine(1000, 20.0), ch2];
        let epocher = Epocher::new(&EpochConfig { window_secs: 2.0, overlap_secs: 0.0 }).unwrap();
        let mut epochs = epocher.segment(&channels, fs);

        let tally = gate().screen(&mut epochs);
        assert_eq!(tally, EpochTally { total: 5, rejected: 1, accepted: 4 });
        assert!((tally.drop_rate() - 0.2).abs() < 1e-12);

        match epochs[2].status {
            EpochStatus::Rejected(RejectionReason::AmplitudeArtifact { channel, .. }) => {
                assert_eq!(channel, ChannelId::Ch2);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(epochs.iter().enumerate().all(|(i, e)| i == 2 || e.is_clean()));
    }

    #[test]
    fn test_clean_epoch_threshold() {
        let two = EpochTally { total: 5, rejected: 3, accepted: 2 };
        let three = EpochTally { total: 5, rejected: 2, accepted: 3 };
        assert_eq!(
            gate().check_clean_epochs(&two).map(|(d, _)| d),
            Some(Disqualification::InsufficientCleanEpochs)
        );
        assert!(gate().check_clean_epochs(&three).is_none());
    }
}
