//! KPI catalog: metric identities, value type and the capability table
//!
//! Every metric the pipeline can produce is a variant of [`Metric`]. Metric
//! names only appear at the edges (configuration parsing and column
//! headers); the processing path works with the enum.

use crate::error::{KpiError, KpiResult};
use crate::recording::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical EEG frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }
}

/// Calculator family a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    Time,
    Spectral,
    Nonlinear,
    Cross,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 4] = [
        FeatureGroup::Time,
        FeatureGroup::Spectral,
        FeatureGroup::Nonlinear,
        FeatureGroup::Cross,
    ];
}

/// Whether a metric participates in the row-retention decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    Core,
    Optional,
}

/// Every KPI the pipeline knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    // Time domain
    AmpMax,
    AmpMin,
    AmpPeakToPeak,
    AmpMean,
    AmpRms,
    StatMean,
    StatStd,
    StatVariance,
    StatMedian,
    StatSkewness,
    StatKurtosis,
    ZeroCrossingRate,
    SlopeMean,
    PeakCount,
    PeakMeanHeight,
    HjorthMobility,
    HjorthComplexity,

    // Spectral
    PowerTotal,
    PowerAbsolute(Band),
    PowerRelative(Band),
    PeakFrequency,
    SpectralCentroid,
    SpectralEdge90,
    SpectralEntropy,
    SpectralFlatness,
    AperiodicExponent,
    AperiodicOffset,
    AlphaBetaRatio,
    ThetaBetaRatio,
    EngagementIndex,

    // Nonlinear / dynamics
    SampleEntropy,
    NormalizedSpectralEntropy,
    PermutationEntropy,
    SvdEntropy,
    HiguchiFd,
    PetrosianFd,
    KatzFd,
    LempelZiv,
    Dfa,

    // Cross-channel
    Coherence(Band),
    PearsonCorrelation,
    PowerAsymmetry(Band),
}

impl Metric {
    /// Full catalog, grouped Time, Spectral, Nonlinear, Cross
    pub fn catalog() -> Vec<Metric> {
        use Metric::*;
        let mut all = vec![
            AmpMax, AmpMin, AmpPeakToPeak, AmpMean, AmpRms,
            StatMean, StatStd, StatVariance, StatMedian, StatSkewness, StatKurtosis,
            ZeroCrossingRate, SlopeMean, PeakCount, PeakMeanHeight,
            HjorthMobility, HjorthComplexity,
            PowerTotal,
        ];
        all.extend(Band::ALL.iter().map(|&b| PowerAbsolute(b)));
        all.extend(Band::ALL.iter().map(|&b| PowerRelative(b)));
        all.extend([
            PeakFrequency, SpectralCentroid, SpectralEdge90, SpectralEntropy, SpectralFlatness,
            AperiodicExponent, AperiodicOffset, AlphaBetaRatio, ThetaBetaRatio, EngagementIndex,
            SampleEntropy, NormalizedSpectralEntropy, PermutationEntropy, SvdEntropy,
            HiguchiFd, PetrosianFd, KatzFd, LempelZiv, Dfa,
        ]);
        all.extend(Band::ALL.iter().map(|&b| Coherence(b)));
        all.push(PearsonCorrelation);
        all.extend(Band::ALL.iter().map(|&b| PowerAsymmetry(b)));
        all
    }

    /// Metrics of one group, in catalog order
    pub fn in_group(group: FeatureGroup) -> Vec<Metric> {
        Self::catalog().into_iter().filter(|m| m.group() == group).collect()
    }

    pub fn group(self) -> FeatureGroup {
        use Metric::*;
        match self {
            AmpMax | AmpMin | AmpPeakToPeak | AmpMean | AmpRms | StatMean | StatStd
            | StatVariance | StatMedian | StatSkewness | StatKurtosis | ZeroCrossingRate
            | SlopeMean | PeakCount | PeakMeanHeight | HjorthMobility | HjorthComplexity => {
                FeatureGroup::Time
            }
            PowerTotal | PowerAbsolute(_) | PowerRelative(_) | PeakFrequency | SpectralCentroid
            | SpectralEdge90 | SpectralEntropy | SpectralFlatness | AperiodicExponent
            | AperiodicOffset | AlphaBetaRatio | ThetaBetaRatio | EngagementIndex => {
                FeatureGroup::Spectral
            }
            SampleEntropy | NormalizedSpectralEntropy | PermutationEntropy | SvdEntropy
            | HiguchiFd | PetrosianFd | KatzFd | LempelZiv | Dfa => FeatureGroup::Nonlinear,
            Coherence(_) | PearsonCorrelation | PowerAsymmetry(_) => FeatureGroup::Cross,
        }
    }

    pub fn is_cross(self) -> bool {
        self.group() == FeatureGroup::Cross
    }

    /// Column-name stem, e.g. `pow_abs_alpha`
    pub fn name(self) -> String {
        use Metric::*;
        let fixed = match self {
            AmpMax => "amp_max",
            AmpMin => "amp_min",
            AmpPeakToPeak => "amp_p2p",
            AmpMean => "amp_mean",
            AmpRms => "amp_rms",
            StatMean => "stat_mean",
            StatStd => "stat_std",
            StatVariance => "stat_variance",
            StatMedian => "stat_median",
            StatSkewness => "stat_skewness",
            StatKurtosis => "stat_kurtosis",
            ZeroCrossingRate => "zcr",
            SlopeMean => "slope_mean",
            PeakCount => "peak_count",
            PeakMeanHeight => "peak_mean_height",
            HjorthMobility => "hjorth_mobility",
            HjorthComplexity => "hjorth_complexity",
            PowerTotal => "pow_total",
            PowerAbsolute(band) => return format!("pow_abs_{}", band.name()),
            PowerRelative(band) => return format!("pow_rel_{}", band.name()),
            PeakFrequency => "peak_freq_hz",
            SpectralCentroid => "centroid_hz",
            SpectralEdge90 => "sef90_hz",
            SpectralEntropy => "spec_entropy",
            SpectralFlatness => "spec_flatness",
            AperiodicExponent => "aperiodic_exponent",
            AperiodicOffset => "aperiodic_offset",
            AlphaBetaRatio => "ratio_alpha_beta",
            ThetaBetaRatio => "ratio_theta_beta",
            EngagementIndex => "ratio_engagement",
            SampleEntropy => "sampen",
            NormalizedSpectralEntropy => "spec_ent",
            PermutationEntropy => "perm_ent",
            SvdEntropy => "svd_ent",
            HiguchiFd => "higuchi_fd",
            PetrosianFd => "petrosian_fd",
            KatzFd => "katz_fd",
            LempelZiv => "lzc",
            Dfa => "dfa",
            Coherence(band) => return format!("coh_{}", band.name()),
            PearsonCorrelation => "pearson_corr",
            PowerAsymmetry(band) => return format!("asym_power_{}", band.name()),
        };
        fixed.to_string()
    }

    /// Resolve a configuration name against the catalog
    pub fn from_name(name: &str) -> KpiResult<Metric> {
        Self::catalog()
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| KpiError::UnknownMetric { name: name.to_string() })
    }

    /// Metrics treated as core when the configuration does not say otherwise
    pub fn default_core() -> Vec<Metric> {
        use Metric::*;
        let mut core = vec![
            StatMean, StatStd, AmpRms, AmpPeakToPeak, HjorthMobility, HjorthComplexity,
            PowerTotal, PeakFrequency, AlphaBetaRatio, ThetaBetaRatio, PearsonCorrelation,
        ];
        for band in Band::ALL {
            core.push(PowerAbsolute(band));
            core.push(PowerRelative(band));
            core.push(Coherence(band));
        }
        core
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Where a KPI lives: the channel pair or a single channel.
///
/// Ordering puts `Cross` before `Channel(Ch1)` before `Channel(Ch2)`,
/// which is the column order of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Cross,
    Channel(ChannelId),
}

impl Scope {
    pub fn label(self) -> &'static str {
        match self {
            Scope::Cross => "Cross",
            Scope::Channel(channel) => channel.label(),
        }
    }
}

/// Fully qualified KPI: scope plus metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KpiKey {
    pub scope: Scope,
    pub metric: Metric,
}

impl KpiKey {
    pub fn channel(channel: ChannelId, metric: Metric) -> Self {
        Self { scope: Scope::Channel(channel), metric }
    }

    pub fn cross(metric: Metric) -> Self {
        Self { scope: Scope::Cross, metric }
    }

    /// Output column header, e.g. `Ch1_pow_abs_alpha`
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.scope.label(), self.metric.name())
    }
}

/// A metric outcome: a finite number or an explicit not-computable marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiValue {
    Value(f64),
    NotComputable,
}

impl KpiValue {
    /// Wrap a raw result; NaN and infinities become `NotComputable`
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            KpiValue::Value(value)
        } else {
            KpiValue::NotComputable
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            KpiValue::Value(v) => Some(v),
            KpiValue::NotComputable => None,
        }
    }

    pub fn is_computable(self) -> bool {
        matches!(self, KpiValue::Value(_))
    }
}

impl From<Option<f64>> for KpiValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(KpiValue::NotComputable, KpiValue::from_f64)
    }
}

/// KPIs of one accepted epoch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: BTreeMap<KpiKey, KpiValue>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: KpiKey, value: KpiValue) {
        self.values.insert(key, value);
    }

    /// Missing keys read as not computable
    pub fn get(&self, key: &KpiKey) -> KpiValue {
        self.values.get(key).copied().unwrap_or(KpiValue::NotComputable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KpiKey, &KpiValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Capability table resolved once at startup: which groups run, which
/// metrics are core, and the fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSchema {
    groups: Vec<FeatureGroup>,
    core: Vec<Metric>,
    columns: Vec<KpiKey>,
}

impl KpiSchema {
    /// Build the table from enabled groups and core metric names.
    ///
    /// Unknown names, core metrics from disabled groups, and a table with
    /// no core metric at all are rejected.
    pub fn build(groups: &[FeatureGroup], core_names: &[String]) -> KpiResult<Self> {
        if groups.is_empty() {
            return Err(crate::config_error!("at least one feature group must be enabled"));
        }

        let mut core = Vec::with_capacity(core_names.len());
        for name in core_names {
            let metric = Metric::from_name(name)?;
            if !groups.contains(&metric.group()) {
                return Err(crate::config_error!(
                    "core metric '{}' belongs to disabled group {:?}",
                    name,
                    metric.group()
                ));
            }
            if !core.contains(&metric) {
                core.push(metric);
            }
        }
        if core.is_empty() {
            return Err(crate::config_error!("no core metric configured"));
        }

        let mut columns = Vec::new();
        if groups.contains(&FeatureGroup::Cross) {
            columns.extend(sorted_by_name(Metric::in_group(FeatureGroup::Cross)).into_iter().map(KpiKey::cross));
        }
        let channel_metrics: Vec<Metric> = sorted_by_name(
            Metric::catalog()
                .into_iter()
                .filter(|m| !m.is_cross() && groups.contains(&m.group()))
                .collect(),
        );
        for channel in ChannelId::ALL {
            columns.extend(channel_metrics.iter().map(|&m| KpiKey::channel(channel, m)));
        }

        let mut groups = groups.to_vec();
        groups.sort();
        groups.dedup();

        Ok(Self { groups, core, columns })
    }

    pub fn columns(&self) -> &[KpiKey] {
        &self.columns
    }

    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(KpiKey::column_name).collect()
    }

    pub fn is_enabled(&self, group: FeatureGroup) -> bool {
        self.groups.contains(&group)
    }

    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    pub fn criticality(&self, metric: Metric) -> Criticality {
        if self.core.contains(&metric) {
            Criticality::Core
        } else {
            Criticality::Optional
        }
    }
}

fn sorted_by_name(mut metrics: Vec<Metric>) -> Vec<Metric> {
    metrics.sort_by_cached_key(|m| m.name());
    metrics
}
