//! Entropy, fractal-dimension and complexity measures

use super::spectral::spectral_entropy;
use super::{diff, linear_fit, mean, variance, ChannelCalculator};
use crate::config::NonlinearConfig;
use crate::spectrum::Welch;
use kpi_core::{FeatureGroup, KpiValue, Metric};
use nalgebra::DMatrix;
use std::collections::HashMap;

pub struct NonlinearCalculator {
    config: NonlinearConfig,
}

impl NonlinearCalculator {
    pub fn new(config: &NonlinearConfig) -> Self {
        Self { config: config.clone() }
    }
}

impl ChannelCalculator for NonlinearCalculator {
    fn compute(&self, data: &[f64], fs: f64) -> Vec<(Metric, KpiValue)> {
        use Metric::*;
        let c = &self.config;
        if data.len() < c.min_samples {
            return Metric::in_group(FeatureGroup::Nonlinear)
                .into_iter()
                .map(|m| (m, KpiValue::NotComputable))
                .collect();
        }

        vec![
            (SampleEntropy, sample_entropy(data, c.sampen_order, c.sampen_tolerance).into()),
            (NormalizedSpectralEntropy, normalized_spectral_entropy(data, fs, c.spectral_segment).into()),
            (PermutationEntropy, permutation_entropy(data, c.perm_order, c.perm_delay).into()),
            (SvdEntropy, svd_entropy(data, c.svd_order, c.svd_delay).into()),
            (HiguchiFd, higuchi_fd(data, c.higuchi_kmax).into()),
            (PetrosianFd, petrosian_fd(data).into()),
            (KatzFd, katz_fd(data).into()),
            (LempelZiv, lempel_ziv(data).into()),
            (Dfa, dfa(data).into()),
        ]
    }
}

/// `-ln(A/B)` with Chebyshev matching at `tolerance * std`
fn sample_entropy(data: &[f64], order: usize, tolerance: f64) -> Option<f64> {
    let n = data.len();
    if n <= order + 1 {
        return None;
    }
    let r = tolerance * variance(data).sqrt();
    let templates = n - order;

    let (mut b, mut a) = (0u64, 0u64);
    for i in 0..templates {
        for j in (i + 1)..templates {
            let matched = (0..order).all(|k| (data[i + k] - data[j + k]).abs() <= r);
            if matched {
                b += 1;
                if (data[i + order] - data[j + order]).abs() <= r {
                    a += 1;
                }
            }
        }
    }

    (a > 0 && b > 0).then(|| -(a as f64 / b as f64).ln())
}

/// Entropy of the full Welch PSD, normalized to `[0, 1]`
fn normalized_spectral_entropy(data: &[f64], fs: f64, segment: usize) -> Option<f64> {
    let psd = Welch::new(segment.min(data.len()), fs)?.psd(data)?;
    let bins = psd.power.len();
    if bins < 2 {
        return None;
    }
    Some(spectral_entropy(psd.power.iter().copied())? / (bins as f64).log2())
}

/// Delay-embedded rows of length `order`
fn embed(data: &[f64], order: usize, delay: usize) -> Option<Vec<Vec<f64>>> {
    let span = (order - 1) * delay;
    if data.len() <= span {
        return None;
    }
    Some(
        (0..data.len() - span)
            .map(|i| (0..order).map(|k| data[i + k * delay]).collect())
            .collect(),
    )
}

fn permutation_entropy(data: &[f64], order: usize, delay: usize) -> Option<f64> {
    let rows = embed(data, order, delay)?;
    let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
    for row in &rows {
        let mut pattern: Vec<usize> = (0..order).collect();
        pattern.sort_by(|&a, &b| row[a].total_cmp(&row[b]));
        *counts.entry(pattern).or_default() += 1;
    }

    let total = rows.len() as f64;
    let entropy = -counts
        .values()
        .map(|&c| c as f64 / total)
        .map(|p| p * p.log2())
        .sum::<f64>();
    let max_entropy = ((1..=order).product::<usize>() as f64).log2();
    Some(entropy / max_entropy)
}

fn svd_entropy(data: &[f64], order: usize, delay: usize) -> Option<f64> {
    let rows = embed(data, order, delay)?;
    let matrix = DMatrix::from_fn(rows.len(), order, |r, c| rows[r][c]);
    let singular = matrix.singular_values();
    let sum = singular.sum();
    if !(sum > 0.0) {
        return None;
    }
    let entropy = -singular
        .iter()
        .map(|s| s / sum)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.log2())
        .sum::<f64>();
    Some(entropy / (order as f64).log2())
}

/// Slope of `ln L(k)` against `ln(1/k)` over curve lengths for `k = 1..=kmax`
fn higuchi_fd(data: &[f64], kmax: usize) -> Option<f64> {
    let n = data.len();
    let mut log_inv_k = Vec::with_capacity(kmax);
    let mut log_len = Vec::with_capacity(kmax);

    for k in 1..=kmax {
        let mut lengths = Vec::with_capacity(k);
        for m in 0..k {
            let count = (n - m - 1) / k;
            if count == 0 {
                continue;
            }
            let sum: f64 = (1..=count)
                .map(|i| (data[m + i * k] - data[m + (i - 1) * k]).abs())
                .sum();
            lengths.push(sum * (n - 1) as f64 / (count * k) as f64 / k as f64);
        }
        if lengths.is_empty() {
            continue;
        }
        let length = mean(&lengths);
        if !(length > 0.0) {
            return None;
        }
        log_inv_k.push((1.0 / k as f64).ln());
        log_len.push(length.ln());
    }

    linear_fit(&log_inv_k, &log_len).map(|(slope, _)| slope)
}

fn petrosian_fd(data: &[f64]) -> Option<f64> {
    let n = data.len() as f64;
    let d = diff(data);
    let sign_changes = d.windows(2).filter(|w| w[0] * w[1] < 0.0).count() as f64;
    let log_n = n.log10();
    let fd = log_n / (log_n + (n / (n + 0.4 * sign_changes)).log10());
    fd.is_finite().then_some(fd)
}

fn katz_fd(data: &[f64]) -> Option<f64> {
    let dists: Vec<f64> = diff(data).iter().map(|d| d.abs()).collect();
    let total: f64 = dists.iter().sum();
    if dists.is_empty() || !(total > 0.0) {
        return None;
    }
    let ln = (total / mean(&dists)).log10();
    let extent = data[1..]
        .iter()
        .map(|x| (x - data[0]).abs())
        .fold(0.0, f64::max);
    if !(extent > 0.0) {
        return None;
    }
    let fd = ln / (ln + (extent / total).log10());
    fd.is_finite().then_some(fd)
}

/// LZ76 complexity of the signal binarized at its mean, normalized by
/// the `n / log2 n` bound of a random sequence
fn lempel_ziv(data: &[f64]) -> Option<f64> {
    let n = data.len();
    if n < 2 {
        return None;
    }
    let threshold = mean(data);
    let bits: Vec<bool> = data.iter().map(|&x| x > threshold).collect();
    let c = lz76_complexity(&bits) as f64;
    Some(c / (n as f64 / (n as f64).log2()))
}

/// Kaspar-Schuster count of distinct LZ76 phrases
fn lz76_complexity(s: &[bool]) -> usize {
    let n = s.len();
    if n == 0 {
        return 0;
    }
    let (mut i, mut k, mut l) = (0, 1, 1);
    let (mut c, mut k_max) = (1, 1);
    loop {
        if l + k > n {
            c += 1;
            break;
        }
        if s[i + k - 1] == s[l + k - 1] {
            k += 1;
            if l + k > n {
                c += 1;
                break;
            }
        } else {
            k_max = k_max.max(k);
            i += 1;
            if i == l {
                c += 1;
                l += k_max;
                if l + 1 > n {
                    break;
                }
                i = 0;
                k = 1;
                k_max = 1;
            } else {
                k = 1;
            }
        }
    }
    c
}

/// Detrended fluctuation scaling exponent over log-spaced window sizes
fn dfa(data: &[f64]) -> Option<f64> {
    let n = data.len();
    let m = mean(data);
    let profile: Vec<f64> = data
        .iter()
        .scan(0.0, |acc, x| {
            *acc += x - m;
            Some(*acc)
        })
        .collect();

    let largest = n / 10;
    let mut sizes = Vec::new();
    let mut size = 4.0_f64;
    while (size as usize) <= largest {
        let s = size as usize;
        if sizes.last() != Some(&s) {
            sizes.push(s);
        }
        size *= 1.2;
    }
    if sizes.len() < 2 {
        return None;
    }

    let mut log_size = Vec::with_capacity(sizes.len());
    let mut log_fluct = Vec::with_capacity(sizes.len());
    for s in sizes {
        let x: Vec<f64> = (0..s).map(|i| i as f64).collect();
        let mut squared = 0.0;
        let windows = n / s;
        for w in 0..windows {
            let segment = &profile[w * s..(w + 1) * s];
            let (slope, intercept) = linear_fit(&x, segment)?;
            squared += segment
                .iter()
                .zip(&x)
                .map(|(y, xi)| (y - (slope * xi + intercept)).powi(2))
                .sum::<f64>();
        }
        let fluctuation = (squared / (windows * s) as f64).sqrt();
        if !(fluctuation > 0.0) {
            return None;
        }
        log_size.push((s as f64).ln());
        log_fluct.push(fluctuation.ln());
    }

    linear_fit(&log_size, &log_fluct).map(|(slope, _)| slope)
}
