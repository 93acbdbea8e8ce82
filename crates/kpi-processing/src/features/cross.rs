//! Inter-channel features: coherence, correlation, band-power asymmetry

use super::{mean, PairCalculator};
use crate::config::{BandTable, CrossConfig};
use crate::spectrum::{CrossSpectrum, Welch};
use kpi_core::{Band, FeatureGroup, KpiValue, Metric};

pub struct CrossChannelCalculator {
    segment_secs: f64,
    bands: BandTable,
}

impl CrossChannelCalculator {
    pub fn new(config: &CrossConfig, bands: &BandTable) -> Self {
        Self {
            segment_secs: config.coherence_segment_secs,
            bands: bands.clone(),
        }
    }

    fn band_coherence(&self, spectrum: &CrossSpectrum, coherence: &[f64], band: Band) -> KpiValue {
        // A single segment makes coherence identically one
        if spectrum.segments < 2 {
            return KpiValue::NotComputable;
        }
        let range = self.bands.range(band);
        let values: Vec<f64> = spectrum
            .freqs
            .iter()
            .zip(coherence)
            .filter(|&(&f, c)| range.contains(f) && c.is_finite())
            .map(|(_, &c)| c)
            .collect();
        if values.is_empty() {
            KpiValue::NotComputable
        } else {
            KpiValue::from_f64(mean(&values))
        }
    }
}

impl PairCalculator for CrossChannelCalculator {
    fn compute(&self, ch1: &[f64], ch2: &[f64], fs: f64) -> Vec<(Metric, KpiValue)> {
        let n = ch1.len().min(ch2.len());
        let mut out = vec![(Metric::PearsonCorrelation, pearson(&ch1[..n], &ch2[..n]).into())];

        let spectrum = Welch::with_duration(self.segment_secs, fs, n).and_then(|w| {
            let resolution = w.resolution();
            w.csd(&ch1[..n], &ch2[..n]).map(|s| (s, resolution))
        });
        let Some((spectrum, resolution)) = spectrum else {
            out.extend(
                Metric::in_group(FeatureGroup::Cross)
                    .into_iter()
                    .filter(|m| *m != Metric::PearsonCorrelation)
                    .map(|m| (m, KpiValue::NotComputable)),
            );
            return out;
        };

        let coherence = spectrum.coherence();
        let (psd1, psd2) = (spectrum.psd_x(resolution), spectrum.psd_y(resolution));
        for band in Band::ALL {
            out.push((Metric::Coherence(band), self.band_coherence(&spectrum, &coherence, band)));

            let range = self.bands.range(band);
            let (p1, p2) = (psd1.band_power(range), psd2.band_power(range));
            let asymmetry = (p1 > 0.0 && p2 > 0.0).then(|| p2.ln() - p1.ln());
            out.push((Metric::PowerAsymmetry(band), asymmetry.into()));
        }
        out
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if !(sxx > 0.0 && syy > 0.0) {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 11) as f64 / (1u64 << 53) as f64 * 20.0 - 10.0
            })
            .collect()
    }

    fn compute(config: &CrossConfig, ch1: &[f64], ch2: &[f64]) -> HashMap<Metric, KpiValue> {
        CrossChannelCalculator::new(config, &BandTable::default())
            .compute(ch1, ch2, 250.0)
            .into_iter()
            .collect()
    }

    #[test]
    fn test_identical_channels() {
        let x = noise(1000, 7);
        let f = compute(&CrossConfig::default(), &x, &x);
        assert_eq!(f.len(), Metric::in_group(FeatureGroup::Cross).len());
        assert_abs_diff_eq!(f[&Metric::PearsonCorrelation].value().unwrap(), 1.0, epsilon = 1e-12);
        for band in Band::ALL {
            assert_abs_diff_eq!(f[&Metric::Coherence(band)].value().unwrap(), 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(f[&Metric::PowerAsymmetry(band)].value().unwrap(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scaled_channel_asymmetry() {
        let x = noise(1000, 11);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let f = compute(&CrossConfig::default(), &x, &y);
        for band in Band::ALL {
            assert_abs_diff_eq!(f[&Metric::PowerAsymmetry(band)].value().unwrap(), 4f64.ln(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_independent_noise() {
        let config = CrossConfig { coherence_segment_secs: 0.5 };
        let (x, y) = (noise(2000, 3), noise(2000, 0xDEAD_BEEF));
        let f = compute(&config, &x, &y);
        assert!(f[&Metric::PearsonCorrelation].value().unwrap().abs() < 0.15);
        for band in Band::ALL {
            assert!(f[&Metric::Coherence(band)].value().unwrap() < 0.2);
        }
    }

    #[test]
    fn test_single_segment_coherence_not_computable() {
        // Segment capped at the 1 s epoch: one Welch segment
        let x = noise(250, 5);
        let y = noise(250, 9);
        let f = compute(&CrossConfig::default(), &x, &y);
        assert!(!f[&Metric::Coherence(Band::Alpha)].is_computable());
        assert!(f[&Metric::PowerAsymmetry(Band::Alpha)].is_computable());
    }

    #[test]
    fn test_constant_channel_correlation() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert_abs_diff_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0);
    }
}
