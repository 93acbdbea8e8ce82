//! Time-domain features: amplitude, moments, patterns, Hjorth parameters

use super::{diff, mean, variance, ChannelCalculator};
use crate::config::TimeConfig;
use kpi_core::{FeatureGroup, KpiValue, Metric};

pub struct TimeDomainCalculator {
    peak_prominence: f64,
}

impl TimeDomainCalculator {
    pub fn new(config: &TimeConfig) -> Self {
        Self {
            peak_prominence: config.peak_prominence_uv,
        }
    }
}

impl ChannelCalculator for TimeDomainCalculator {
    fn compute(&self, data: &[f64], _fs: f64) -> Vec<(Metric, KpiValue)> {
        use Metric::*;
        if data.len() < 3 {
            return Metric::in_group(FeatureGroup::Time)
                .into_iter()
                .map(|m| (m, KpiValue::NotComputable))
                .collect();
        }

        let n = data.len() as f64;
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let m = mean(data);
        let var = variance(data);
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();

        let dx = diff(data);
        let ddx = diff(&dx);
        let var_dx = variance(&dx);
        let var_ddx = variance(&ddx);

        let mobility = (var > 0.0).then(|| (var_dx / var).sqrt());
        let complexity = mobility.and_then(|mob| {
            (var_dx > 0.0 && mob > 0.0).then(|| (var_ddx / var_dx).sqrt() / mob)
        });

        let peaks = prominent_peaks(data, self.peak_prominence);
        let peak_mean_height = (!peaks.is_empty())
            .then(|| peaks.iter().map(|&i| data[i]).sum::<f64>() / peaks.len() as f64);

        vec![
            (AmpMax, KpiValue::from_f64(max)),
            (AmpMin, KpiValue::from_f64(min)),
            (AmpPeakToPeak, KpiValue::from_f64(max - min)),
            (AmpMean, KpiValue::from_f64(data.iter().map(|x| x.abs()).sum::<f64>() / n)),
            (AmpRms, KpiValue::from_f64(rms)),
            (StatMean, KpiValue::from_f64(m)),
            (StatStd, KpiValue::from_f64(var.sqrt())),
            (StatVariance, KpiValue::from_f64(var)),
            (StatMedian, KpiValue::from_f64(median(data))),
            (StatSkewness, standardized_moment(data, m, var, 3).into()),
            (StatKurtosis, standardized_moment(data, m, var, 4).map(|k| k - 3.0).into()),
            (ZeroCrossingRate, KpiValue::from_f64(zero_crossings(data) as f64 / n)),
            (SlopeMean, KpiValue::from_f64(mean(&dx.iter().map(|d| d.abs()).collect::<Vec<_>>()))),
            (PeakCount, KpiValue::from_f64(peaks.len() as f64)),
            (PeakMeanHeight, peak_mean_height.into()),
            (HjorthMobility, mobility.into()),
            (HjorthComplexity, complexity.into()),
        ]
    }
}

fn median(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Biased standardized moment; `None` for a constant signal
fn standardized_moment(data: &[f64], mean: f64, var: f64, order: i32) -> Option<f64> {
    if var <= 0.0 {
        return None;
    }
    let m = data.iter().map(|x| (x - mean).powi(order)).sum::<f64>() / data.len() as f64;
    Some(m / var.powf(order as f64 / 2.0))
}

/// Sign changes between consecutive samples, zero counted as its own sign
fn zero_crossings(data: &[f64]) -> usize {
    let sign = |x: f64| {
        if x > 0.0 {
            1
        } else if x < 0.0 {
            -1
        } else {
            0
        }
    };
    data.windows(2).filter(|w| sign(w[0]) != sign(w[1])).count()
}

/// Indices of local maxima (plateaus resolved to their midpoint) whose
/// prominence reaches `min_prominence`.
pub(crate) fn prominent_peaks(data: &[f64], min_prominence: f64) -> Vec<usize> {
    local_maxima(data)
        .into_iter()
        .filter(|&peak| prominence(data, peak) >= min_prominence)
        .collect()
}

fn local_maxima(data: &[f64]) -> Vec<usize> {
    let n = data.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of a peak above the higher of the two minima reached before a
/// higher sample (or the signal edge) on either side.
fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];

    let mut left_min = height;
    for &x in data[..=peak].iter().rev() {
        if x > height {
            break;
        }
        left_min = left_min.min(x);
    }

    let mut right_min = height;
    for &x in &data[peak..] {
        if x > height {
            break;
        }
        right_min = right_min.min(x);
    }

    height - left_min.max(right_min)
}
