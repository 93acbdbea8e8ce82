//! Spectral features from the Welch PSD of one epoch

use super::{linear_fit, ratio, ChannelCalculator};
use crate::config::{AperiodicConfig, BandTable, PeakExclusion, SpectralConfig};
use crate::spectrum::{Psd, Welch};
use kpi_core::{Band, FeatureGroup, KpiValue, Metric};

pub struct SpectralCalculator {
    segment_secs: f64,
    aperiodic: AperiodicConfig,
    bands: BandTable,
}

impl SpectralCalculator {
    pub fn new(config: &SpectralConfig, bands: &BandTable) -> Self {
        Self {
            segment_secs: config.welch_segment_secs,
            aperiodic: config.aperiodic.clone(),
            bands: bands.clone(),
        }
    }

    fn from_psd(&self, psd: &Psd) -> Vec<(Metric, KpiValue)> {
        use Metric::*;
        let analysis = self.bands.analysis_range();
        let total = psd.band_power(analysis);
        let power_of = |band: Band| psd.band_power(self.bands.range(band));

        let mut out = vec![(PowerTotal, KpiValue::from_f64(total))];
        for band in Band::ALL {
            let absolute = power_of(band);
            out.push((PowerAbsolute(band), KpiValue::from_f64(absolute)));
            out.push((PowerRelative(band), ratio(absolute, total)));
        }

        let bins: Vec<(f64, f64)> = psd.bins_in(analysis).collect();
        let sum: f64 = bins.iter().map(|(_, p)| p).sum();

        let peak = bins
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|_| sum > 0.0)
            .map(|&(f, _)| f);
        let centroid = (sum > 0.0).then(|| bins.iter().map(|(f, p)| f * p).sum::<f64>() / sum);

        out.push((PeakFrequency, peak.into()));
        out.push((SpectralCentroid, centroid.into()));
        out.push((SpectralEdge90, spectral_edge(&bins, 0.9).into()));
        out.push((SpectralEntropy, spectral_entropy(bins.iter().map(|&(_, p)| p)).into()));
        out.push((SpectralFlatness, spectral_flatness(&bins).into()));

        let (exponent, offset) = match fit_aperiodic(psd, &self.aperiodic) {
            Some((exponent, offset)) => (KpiValue::Value(exponent), KpiValue::Value(offset)),
            None => (KpiValue::NotComputable, KpiValue::NotComputable),
        };
        out.push((AperiodicExponent, exponent));
        out.push((AperiodicOffset, offset));

        let (theta, alpha, beta) = (power_of(Band::Theta), power_of(Band::Alpha), power_of(Band::Beta));
        out.push((AlphaBetaRatio, ratio(alpha, beta)));
        out.push((ThetaBetaRatio, ratio(theta, beta)));
        out.push((EngagementIndex, ratio(beta, alpha + theta)));
        out
    }
}

impl ChannelCalculator for SpectralCalculator {
    fn compute(&self, data: &[f64], fs: f64) -> Vec<(Metric, KpiValue)> {
        match Welch::with_duration(self.segment_secs, fs, data.len()).and_then(|w| w.psd(data)) {
            Some(psd) => self.from_psd(&psd),
            None => Metric::in_group(FeatureGroup::Spectral)
                .into_iter()
                .map(|m| (m, KpiValue::NotComputable))
                .collect(),
        }
    }
}

/// Lowest frequency at which the cumulative power reaches `fraction`
fn spectral_edge(bins: &[(f64, f64)], fraction: f64) -> Option<f64> {
    let sum: f64 = bins.iter().map(|(_, p)| p).sum();
    if !(sum > 0.0) {
        return None;
    }
    let mut cumulative = 0.0;
    for &(f, p) in bins {
        cumulative += p;
        if cumulative >= fraction * sum {
            return Some(f);
        }
    }
    bins.last().map(|&(f, _)| f)
}

/// Shannon entropy (bits) of the power distribution
pub(crate) fn spectral_entropy(powers: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    let sum: f64 = powers.clone().sum();
    if !(sum > 0.0) {
        return None;
    }
    Some(
        -powers
            .map(|p| p / sum)
            .filter(|&q| q > 0.0)
            .map(|q| q * q.log2())
            .sum::<f64>(),
    )
}

/// Geometric over arithmetic mean; undefined once any bin is empty
fn spectral_flatness(bins: &[(f64, f64)]) -> Option<f64> {
    if bins.is_empty() || bins.iter().any(|&(_, p)| !(p > 0.0)) {
        return None;
    }
    let n = bins.len() as f64;
    let log_mean = bins.iter().map(|(_, p)| p.ln()).sum::<f64>() / n;
    let mean = bins.iter().map(|(_, p)| p).sum::<f64>() / n;
    Some(log_mean.exp() / mean)
}

/// `(exponent, offset)` of `log10 P = offset - exponent * log10 f`
pub(crate) fn fit_aperiodic(psd: &Psd, config: &AperiodicConfig) -> Option<(f64, f64)> {
    let (x, y): (Vec<f64>, Vec<f64>) = psd
        .freqs
        .iter()
        .zip(&psd.power)
        .filter(|&(&f, &p)| f >= config.fit_low && f <= config.fit_high && f > 0.0 && p > 0.0)
        .map(|(f, p)| (f.log10(), p.log10()))
        .unzip();
    if x.len() < config.min_points {
        return None;
    }

    let (slope, intercept) = linear_fit(&x, &y)?;
    let (slope, intercept) = match config.peak_exclusion {
        PeakExclusion::None => (slope, intercept),
        PeakExclusion::ResidualSigma { sigma } => {
            let residuals: Vec<f64> = x.iter().zip(&y).map(|(xi, yi)| yi - (slope * xi + intercept)).collect();
            let spread = (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt();
            let (kx, ky): (Vec<f64>, Vec<f64>) = x
                .iter()
                .zip(&y)
                .zip(&residuals)
                .filter(|&(_, &r)| r <= sigma * spread)
                .map(|((&xi, &yi), _)| (xi, yi))
                .unzip();
            if kx.len() < config.min_points {
                return None;
            }
            linear_fit(&kx, &ky)?
        }
    };

    let exponent = -slope;
    (exponent.is_finite() && intercept.is_finite()).then_some((exponent, intercept))
}
