//! Digital filters for offline EEG preprocessing
//!
//! All filters are cascades of second-order sections designed with the
//! bilinear transform and applied forward and backward (zero phase).

use crate::config::FilterConfig;
use kpi_core::{KpiError, KpiResult};
use std::f64::consts::PI;

/// Single biquad section (2nd order)
///
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSection {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadSection {
    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        }
    }

    /// Second-order lowpass with quality factor `q`
    pub fn lowpass(cutoff: f64, q: f64, fs: f64) -> Self {
        let omega = 2.0 * PI * cutoff / fs;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Second-order highpass with quality factor `q`
    pub fn highpass(cutoff: f64, q: f64, fs: f64) -> Self {
        let omega = 2.0 * PI * cutoff / fs;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Band-reject section centered on `freq`
    pub fn notch(freq: f64, q: f64, fs: f64) -> Self {
        let omega = 2.0 * PI * freq / fs;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            [1.0, -2.0 * cos, 1.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Filter `data` in place, starting from the steady state of a
    /// constant input equal to the first sample.
    fn run(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let settled = first * self.dc_gain();
        let (mut x1, mut x2) = (first, first);
        let (mut y1, mut y2) = (settled, settled);

        for sample in data.iter_mut() {
            let input = *sample;
            let output = self.b0 * input + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = input;
            y2 = y1;
            y1 = output;
            *sample = output;
        }
    }
}

/// Quality factors of the biquads forming an even-order Butterworth filter
fn butterworth_q(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

/// Cascade of biquad sections with zero-phase application
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    name: &'static str,
    sections: Vec<BiquadSection>,
    /// Reflection padding on each side before filtering (samples)
    pad_len: usize,
}

impl SosFilter {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Forward-backward pass with odd reflection padding.
    ///
    /// Output has the same length as the input and zero net phase.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n < 2 {
            return data.to_vec();
        }

        let pad = self.pad_len.min(n - 1);
        let mut ext = odd_reflect_pad(data, pad);

        for section in &self.sections {
            section.run(&mut ext);
        }
        ext.reverse();
        for section in &self.sections {
            section.run(&mut ext);
        }
        ext.reverse();

        ext.drain(..pad);
        ext.truncate(n);
        ext
    }
}

/// Extend `data` by `pad` samples on each side, reflected through the
/// end points (`2*x[0] - x[i]`), which keeps value and slope continuous.
pub fn odd_reflect_pad(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let pad = pad.min(n - 1);
    let mut ext = Vec::with_capacity(n + 2 * pad);

    let first = data[0];
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
    ext.extend_from_slice(data);
    let last = data[n - 1];
    ext.extend((1..=pad).map(|i| 2.0 * last - data[n - 1 - i]));
    ext
}

fn check_frequency(freq: f64, fs: f64, what: &str) -> KpiResult<()> {
    let nyquist = fs / 2.0;
    if !(freq > 0.0 && freq < nyquist) {
        return Err(KpiError::FilterDesign {
            message: format!(
                "{} {:.2}Hz must lie strictly between 0 and Nyquist {:.2}Hz",
                what, freq, nyquist
            ),
        });
    }
    Ok(())
}

/// Butterworth filter designs
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Bandpass as a highpass cascade at `low` followed by a lowpass
    /// cascade at `high`, each of the given even order.
    pub fn bandpass(low: f64, high: f64, order: usize, fs: f64) -> KpiResult<SosFilter> {
        check_frequency(low, fs, "Bandpass low edge")?;
        check_frequency(high, fs, "Bandpass high edge")?;
        if low >= high {
            return Err(KpiError::FilterDesign {
                message: format!("Bandpass edges {}..{}Hz are inverted", low, high),
            });
        }
        if order == 0 || order % 2 != 0 {
            return Err(KpiError::FilterDesign {
                message: format!("Butterworth order must be even, got {}", order),
            });
        }

        let qs = butterworth_q(order);
        let mut sections: Vec<BiquadSection> = qs.iter().map(|&q| BiquadSection::highpass(low, q, fs)).collect();
        sections.extend(qs.iter().map(|&q| BiquadSection::lowpass(high, q, fs)));

        // The low edge sets the longest transient.
        let pad_len = ((3.0 * fs / low).ceil() as usize).max(3 * (2 * sections.len() + 1));

        Ok(SosFilter {
            name: "butterworth_bandpass",
            sections,
            pad_len,
        })
    }
}

/// Notch filter for powerline interference removal
pub struct NotchFilter;

impl NotchFilter {
    pub fn design(freq: f64, q: f64, fs: f64) -> KpiResult<SosFilter> {
        check_frequency(freq, fs, "Notch frequency")?;
        if !(q > 0.0) {
            return Err(KpiError::FilterDesign {
                message: format!("Notch quality factor must be positive, got {}", q),
            });
        }

        // Envelope decay time of the notch is about q / (pi * freq) seconds.
        let pad_len = ((3.0 * q * fs / (PI * freq)).ceil() as usize).max(9);

        Ok(SosFilter {
            name: "notch",
            sections: vec![BiquadSection::notch(freq, q, fs)],
            pad_len,
        })
    }
}

/// Ordered chain of zero-phase filters
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    filters: Vec<SosFilter>,
}

impl FilterBank {
    /// Notch at the mains frequency followed by the Butterworth bandpass
    pub fn eeg_preprocessing(config: &FilterConfig, fs: f64) -> KpiResult<Self> {
        Ok(Self {
            filters: vec![
                NotchFilter::design(config.notch_freq, config.notch_q, fs)?,
                ButterworthFilter::bandpass(config.band_low, config.band_high, config.order, fs)?,
            ],
        })
    }

    pub fn filters(&self) -> &[SosFilter] {
        &self.filters
    }

    /// Apply every filter in order, zero phase
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        self.filters
            .iter()
            .fold(data.to_vec(), |signal, filter| filter.filtfilt(&signal))
    }
}
