//! Deterministic signal components for synthetic EEG

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One additive component of a simulated channel, in microvolts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPattern {
    /// DC offset
    Constant { level: f64 },
    /// Continuous oscillation, e.g. an alpha rhythm
    Rhythm {
        frequency: f64,
        amplitude: f64,
        phase: f64,
    },
    /// Oscillation gated on and off, e.g. alpha bursts
    Burst {
        frequency: f64,
        amplitude: f64,
        on_secs: f64,
        off_secs: f64,
    },
    /// Slow baseline wander
    Drift { frequency: f64, amplitude: f64 },
    /// Mains interference
    Powerline { frequency: f64, amplitude: f64 },
    /// Single-sample artifact at `at_secs`
    Spike { at_secs: f64, amplitude: f64 },
}

impl SignalPattern {
    /// Value at `time` for a signal sampled every `sample_period` seconds
    pub fn value_at(&self, time: f64, sample_period: f64) -> f64 {
        match *self {
            SignalPattern::Constant { level } => level,

            SignalPattern::Rhythm { frequency, amplitude, phase } => {
                amplitude * (2.0 * PI * frequency * time + phase).sin()
            }

            SignalPattern::Burst { frequency, amplitude, on_secs, off_secs } => {
                let cycle = on_secs + off_secs;
                if cycle > 0.0 && time % cycle < on_secs {
                    amplitude * (2.0 * PI * frequency * time).sin()
                } else {
                    0.0
                }
            }

            SignalPattern::Drift { frequency, amplitude } | SignalPattern::Powerline { frequency, amplitude } => {
                amplitude * (2.0 * PI * frequency * time).sin()
            }

            SignalPattern::Spike { at_secs, amplitude } => {
                if (time - at_secs).abs() < sample_period / 2.0 {
                    amplitude
                } else {
                    0.0
                }
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SignalPattern::Constant { .. } => "DC offset",
            SignalPattern::Rhythm { .. } => "Continuous rhythm",
            SignalPattern::Burst { .. } => "Rhythmic bursts",
            SignalPattern::Drift { .. } => "Baseline drift",
            SignalPattern::Powerline { .. } => "Mains interference",
            SignalPattern::Spike { .. } => "Amplitude artifact",
        }
    }

    /// Common building blocks
    pub fn presets() -> Vec<(&'static str, SignalPattern)> {
        vec![
            ("Alpha", SignalPattern::Rhythm { frequency: 10.0, amplitude: 20.0, phase: 0.0 }),
            ("Theta", SignalPattern::Rhythm { frequency: 6.0, amplitude: 8.0, phase: 0.0 }),
            ("Beta", SignalPattern::Rhythm { frequency: 20.0, amplitude: 5.0, phase: 0.0 }),
            (
                "Alpha Bursts",
                SignalPattern::Burst { frequency: 10.0, amplitude: 25.0, on_secs: 1.5, off_secs: 1.0 },
            ),
            ("Sweat Drift", SignalPattern::Drift { frequency: 0.2, amplitude: 10.0 }),
            ("Mains 60Hz", SignalPattern::Powerline { frequency: 60.0, amplitude: 15.0 }),
            ("Mains 50Hz", SignalPattern::Powerline { frequency: 50.0, amplitude: 15.0 }),
        ]
    }
}
