//! Welch spectral estimates for short epochs
//!
//! Periodic Hann window, 50% overlap, per-segment mean removal and
//! one-sided density scaling (units²/Hz).

use crate::config::BandRange;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq)]
pub struct Psd {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
    /// Bin spacing (Hz)
    pub resolution: f64,
}

impl Psd {
    /// `(freq, power)` pairs with `freq` inside `range`
    pub fn bins_in(&self, range: BandRange) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.freqs
            .iter()
            .zip(&self.power)
            .filter(move |(f, _)| range.contains(**f))
            .map(|(&f, &p)| (f, p))
    }

    /// Power integrated over `range` (rectangle rule on the bin grid)
    pub fn band_power(&self, range: BandRange) -> f64 {
        self.bins_in(range).map(|(_, p)| p).sum::<f64>() * self.resolution
    }
}

/// Auto and cross spectra of a channel pair
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSpectrum {
    pub freqs: Vec<f64>,
    pub pxx: Vec<f64>,
    pub pyy: Vec<f64>,
    pub pxy: Vec<Complex64>,
    /// Segments averaged
    pub segments: usize,
}

impl CrossSpectrum {
    /// Magnitude-squared coherence per bin; NaN where either power is zero
    pub fn coherence(&self) -> Vec<f64> {
        self.pxy
            .iter()
            .zip(self.pxx.iter().zip(&self.pyy))
            .map(|(pxy, (&pxx, &pyy))| pxy.norm_sqr() / (pxx * pyy))
            .collect()
    }

    pub fn psd_x(&self, resolution: f64) -> Psd {
        Psd {
            freqs: self.freqs.clone(),
            power: self.pxx.clone(),
            resolution,
        }
    }

    pub fn psd_y(&self, resolution: f64) -> Psd {
        Psd {
            freqs: self.freqs.clone(),
            power: self.pyy.clone(),
            resolution,
        }
    }
}

/// Welch estimator for a fixed segment length and sampling rate
pub struct Welch {
    nperseg: usize,
    step: usize,
    fs: f64,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl Welch {
    /// `None` when the segment is too short to be meaningful
    pub fn new(nperseg: usize, fs: f64) -> Option<Self> {
        if nperseg < 4 || !(fs > 0.0) {
            return None;
        }

        let window: Vec<f64> = (0..nperseg)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / nperseg as f64).cos())
            .collect();
        let window_energy: f64 = window.iter().map(|w| w * w).sum();

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nperseg);

        Some(Self {
            nperseg,
            step: nperseg - nperseg / 2,
            fs,
            window,
            scale: 1.0 / (fs * window_energy),
            fft,
        })
    }

    /// Segment of `secs` seconds, capped at `available` samples
    pub fn with_duration(secs: f64, fs: f64, available: usize) -> Option<Self> {
        let nperseg = ((secs * fs).round() as usize).min(available);
        Self::new(nperseg, fs)
    }

    pub fn resolution(&self) -> f64 {
        self.fs / self.nperseg as f64
    }

    pub fn segment_count(&self, n: usize) -> usize {
        if n < self.nperseg {
            0
        } else {
            (n - self.nperseg) / self.step + 1
        }
    }

    fn freqs(&self) -> Vec<f64> {
        let df = self.resolution();
        (0..self.nperseg / 2 + 1).map(|k| k as f64 * df).collect()
    }

    /// Detrended, windowed spectrum of one segment
    fn segment_spectrum(&self, segment: &[f64]) -> Option<Vec<Complex64>> {
        let mean = segment.iter().sum::<f64>() / segment.len() as f64;
        let mut input: Vec<f64> = segment
            .iter()
            .zip(&self.window)
            .map(|(x, w)| (x - mean) * w)
            .collect();
        let mut output = self.fft.make_output_vec();
        self.fft.process(&mut input, &mut output).ok()?;
        Some(output)
    }

    /// Density scaling plus doubling of the bins mirrored in the
    /// discarded negative-frequency half
    fn one_sided_factor(&self, k: usize) -> f64 {
        let last = self.nperseg / 2;
        let mirrored = k > 0 && (k < last || self.nperseg % 2 == 1);
        if mirrored {
            2.0 * self.scale
        } else {
            self.scale
        }
    }

    pub fn psd(&self, x: &[f64]) -> Option<Psd> {
        let segments = self.segment_count(x.len());
        if segments == 0 {
            return None;
        }

        let mut power = vec![0.0; self.nperseg / 2 + 1];
        for s in 0..segments {
            let start = s * self.step;
            let spectrum = self.segment_spectrum(&x[start..start + self.nperseg])?;
            for (k, (acc, c)) in power.iter_mut().zip(&spectrum).enumerate() {
                *acc += c.norm_sqr() * self.one_sided_factor(k);
            }
        }
        power.iter_mut().for_each(|p| *p /= segments as f64);

        Some(Psd {
            freqs: self.freqs(),
            power,
            resolution: self.resolution(),
        })
    }

    pub fn csd(&self, x: &[f64], y: &[f64]) -> Option<CrossSpectrum> {
        let n = x.len().min(y.len());
        let segments = self.segment_count(n);
        if segments == 0 {
            return None;
        }

        let bins = self.nperseg / 2 + 1;
        let mut pxx = vec![0.0; bins];
        let mut pyy = vec![0.0; bins];
        let mut pxy = vec![Complex64::new(0.0, 0.0); bins];

        for s in 0..segments {
            let start = s * self.step;
            let fx = self.segment_spectrum(&x[start..start + self.nperseg])?;
            let fy = self.segment_spectrum(&y[start..start + self.nperseg])?;
            for k in 0..bins {
                let factor = self.one_sided_factor(k);
                pxx[k] += fx[k].norm_sqr() * factor;
                pyy[k] += fy[k].norm_sqr() * factor;
                pxy[k] += fx[k].conj() * fy[k] * factor;
            }
        }

        let count = segments as f64;
        pxx.iter_mut().for_each(|p| *p /= count);
        pyy.iter_mut().for_each(|p| *p /= count);
        pxy.iter_mut().for_each(|p| *p /= count);

        Some(CrossSpectrum {
            freqs: self.freqs(),
            pxx,
            pyy,
            pxy,
            segments,
        })
    }
}
