//! Error handling for the KPI pipeline
//!
//! Only setup and per-recording fatal conditions are errors. A metric that
//! cannot be computed is a value (`KpiValue::NotComputable`), never an error.

use core::fmt;

/// Result type alias for KPI pipeline operations
pub type KpiResult<T> = Result<T, KpiError>;

/// Error type for configuration and per-recording fatal failures
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum KpiError {
    /// Configuration rejected at startup
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// Sampling rate derived from timestamps is unusable
    InvalidSamplingRate {
        /// Derived rate in Hz
        rate: f64,
    },

    /// A timestamp decreases (or is NaN); repeated stamps are accepted
    NonMonotonicTimestamps {
        /// Index of the first sample earlier than its predecessor
        index: usize,
    },

    /// The two channels (or the timestamp column) differ in length
    ChannelLengthMismatch {
        /// Channel 1 sample count
        ch1: usize,
        /// Channel 2 sample count
        ch2: usize,
        /// Timestamp count
        timestamps: usize,
    },

    /// Not enough samples to derive a sampling rate
    InsufficientSamples {
        /// Samples available
        available: usize,
        /// Samples required
        required: usize,
    },

    /// Filter cannot be designed for the observed sampling rate
    FilterDesign {
        /// Description of the design failure
        message: String,
    },

    /// Metric name in the configuration does not exist in the catalog
    UnknownMetric {
        /// Name as written in the configuration
        name: String,
    },
}

impl fmt::Display for KpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiError::InvalidConfig { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            KpiError::InvalidSamplingRate { rate } => {
                write!(f, "Invalid sampling rate: {:.3}Hz", rate)
            }
            KpiError::NonMonotonicTimestamps { index } => {
                write!(f, "Non-monotonic timestamps at sample {}", index)
            }
            KpiError::ChannelLengthMismatch { ch1, ch2, timestamps } => {
                write!(f, "Channel length mismatch: ch1 {}, ch2 {}, timestamps {}",
                       ch1, ch2, timestamps)
            }
            KpiError::InsufficientSamples { available, required } => {
                write!(f, "Insufficient samples: {} available, {} required",
                       available, required)
            }
            KpiError::FilterDesign { message } => {
                write!(f, "Filter design error: {}", message)
            }
            KpiError::UnknownMetric { name } => {
                write!(f, "Unknown metric '{}'", name)
            }
        }
    }
}

impl std::error::Error for KpiError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::KpiError::InvalidConfig {
            message: format!($($arg)*),
        }
    };
}
