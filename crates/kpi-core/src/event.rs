//! Per-recording pipeline events and their log codes

use crate::recording::{ChannelId, RecordingMeta};
use std::fmt;
use tracing::{error, warn};

/// Noteworthy condition raised while processing one recording
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SamplingRateDeviation {
        nominal: f64,
        observed: f64,
        deviation: f64,
    },
    ChannelFlatline {
        channel: ChannelId,
        std_dev: f64,
    },
    ShortRecording {
        duration_secs: f64,
        min_secs: f64,
    },
    InsufficientCleanEpochs {
        accepted: usize,
        required: usize,
    },
}

impl PipelineEvent {
    /// Stable code for log consumers
    pub fn code(&self) -> &'static str {
        match self {
            PipelineEvent::SamplingRateDeviation { .. } => "sampling-rate-deviation-warning",
            PipelineEvent::ChannelFlatline { .. } => "channel-flatline-warning",
            PipelineEvent::ShortRecording { .. } => "short-recording-error",
            PipelineEvent::InsufficientCleanEpochs { .. } => "insufficient-clean-epochs",
        }
    }

    /// Log the event against its recording
    pub fn emit(&self, meta: &RecordingMeta) {
        match self {
            PipelineEvent::ShortRecording { .. } => {
                error!(recording = %meta, code = self.code(), reason = %self, "recording disqualified");
            }
            PipelineEvent::InsufficientCleanEpochs { .. } => {
                warn!(recording = %meta, code = self.code(), reason = %self, "recording disqualified");
            }
            _ => {
                warn!(recording = %meta, code = self.code(), reason = %self, "quality warning");
            }
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::SamplingRateDeviation { nominal, observed, deviation } => {
                write!(f, "observed sampling rate {:.2}Hz deviates {:.1}% from nominal {:.2}Hz",
                       observed, deviation * 100.0, nominal)
            }
            PipelineEvent::ChannelFlatline { channel, std_dev } => {
                write!(f, "{} is flat (std {:.3e})", channel, std_dev)
            }
            PipelineEvent::ShortRecording { duration_secs, min_secs } => {
                write!(f, "short recording: {:.2}s < {:.2}s", duration_secs, min_secs)
            }
            PipelineEvent::InsufficientCleanEpochs { accepted, required } => {
                write!(f, "insufficient clean epochs: {} < {}", accepted, required)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_codes() {
        let short = PipelineEvent::ShortRecording { duration_secs: 8.0, min_secs: 10.0 };
        assert_eq!(short.code(), "short-recording-error");
        assert!(short.to_string().contains("8.00s"));

        let flat = PipelineEvent::ChannelFlatline { channel: ChannelId::Ch2, std_dev: 0.0 };
        assert_eq!(flat.code(), "channel-flatline-warning");
        assert!(flat.to_string().starts_with("Ch2"));
    }
}
