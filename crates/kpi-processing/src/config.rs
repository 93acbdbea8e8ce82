//! Configuration for the KPI pipeline
//!
//! A single immutable [`PipelineConfig`] is validated once at startup and
//! then passed by reference through every stage.

use kpi_core::{config_error, Band, FeatureGroup, KpiError, KpiResult, KpiSchema, Metric};
use serde::{Deserialize, Serialize};

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling: SamplingConfig,
    pub filter: FilterConfig,
    pub epoch: EpochConfig,
    pub gate: GateConfig,
    pub bands: BandTable,
    pub time: TimeConfig,
    pub spectral: SpectralConfig,
    pub nonlinear: NonlinearConfig,
    pub cross: CrossConfig,
    pub kpi: KpiSelection,
}

/// Sampling-rate expectations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Rate the acquisition device is configured for (Hz)
    pub nominal_rate: f64,
    /// Relative deviation of the observed rate that triggers a warning
    pub deviation_tolerance: f64,
}

/// Preprocessing filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Mains frequency to suppress (Hz)
    pub notch_freq: f64,
    /// Notch quality factor
    pub notch_q: f64,
    /// Lower pass-band edge (Hz)
    pub band_low: f64,
    /// Upper pass-band edge (Hz)
    pub band_high: f64,
    /// Butterworth order of each edge; must be even
    pub order: usize,
}

/// Windowing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    pub window_secs: f64,
    pub overlap_secs: f64,
}

/// Artifact and recording-level gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Peak-to-peak limit per channel and epoch (µV)
    pub artifact_threshold_uv: f64,
    /// Whole-recording standard deviation below which a channel is flat
    pub flatline_epsilon: f64,
    pub min_duration_secs: f64,
    pub min_clean_epochs: usize,
}

/// Edges of one frequency band (Hz), lower inclusive, upper exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub low: f64,
    pub high: f64,
}

impl BandRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low && freq < self.high
    }
}

/// Edges of the five canonical bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandTable {
    pub delta: BandRange,
    pub theta: BandRange,
    pub alpha: BandRange,
    pub beta: BandRange,
    pub gamma: BandRange,
}

impl BandTable {
    pub fn range(&self, band: Band) -> BandRange {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    /// Span from the lowest to the highest band edge
    pub fn analysis_range(&self) -> BandRange {
        BandRange::new(self.delta.low, self.gamma.high)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Minimum prominence for a local maximum to count as a peak (µV)
    pub peak_prominence_uv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Welch segment length (s), capped at the epoch length
    pub welch_segment_secs: f64,
    pub aperiodic: AperiodicConfig,
}

/// Power-law fit of the aperiodic spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AperiodicConfig {
    pub fit_low: f64,
    pub fit_high: f64,
    pub peak_exclusion: PeakExclusion,
    /// Bins that must survive exclusion for the fit to count
    pub min_points: usize,
}

/// Rule removing narrow-band peaks before the aperiodic refit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PeakExclusion {
    /// Single fit over every bin in range
    None,
    /// Drop bins whose residual above the initial fit exceeds
    /// `sigma` residual standard deviations, then refit
    ResidualSigma { sigma: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearConfig {
    /// Epochs shorter than this yield not-computable for the whole group
    pub min_samples: usize,
    pub sampen_order: usize,
    /// Tolerance as a fraction of the epoch standard deviation
    pub sampen_tolerance: f64,
    pub perm_order: usize,
    pub perm_delay: usize,
    pub svd_order: usize,
    pub svd_delay: usize,
    pub higuchi_kmax: usize,
    /// Welch segment (samples) for the normalized spectral entropy
    pub spectral_segment: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossConfig {
    /// Welch segment length for coherence and asymmetry (s). Coherence of
    /// independent channels is biased towards `1 / segments`.
    pub coherence_segment_secs: f64,
}

/// Enabled feature groups and the core metric names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiSelection {
    pub groups: Vec<FeatureGroup>,
    pub core: Vec<String>,
}

impl KpiSelection {
    /// Resolve names into the capability table
    pub fn schema(&self) -> KpiResult<KpiSchema> {
        KpiSchema::build(&self.groups, &self.core)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            nominal_rate: 250.0,
            deviation_tolerance: 0.10,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            notch_freq: 60.0,
            notch_q: 30.0,
            band_low: 0.5,
            band_high: 50.0,
            order: 4,
        }
    }
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            window_secs: 4.0,
            overlap_secs: 2.0,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            artifact_threshold_uv: 150.0,
            flatline_epsilon: 1e-6,
            min_duration_secs: 10.0,
            min_clean_epochs: 3,
        }
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self {
            delta: BandRange::new(0.5, 4.0),
            theta: BandRange::new(4.0, 8.0),
            alpha: BandRange::new(8.0, 13.0),
            beta: BandRange::new(13.0, 30.0),
            gamma: BandRange::new(30.0, 50.0),
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { peak_prominence_uv: 1.0 }
    }
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            welch_segment_secs: 2.0,
            aperiodic: AperiodicConfig::default(),
        }
    }
}

impl Default for AperiodicConfig {
    fn default() -> Self {
        Self {
            fit_low: 1.0,
            fit_high: 30.0,
            peak_exclusion: PeakExclusion::ResidualSigma { sigma: 2.0 },
            min_points: 4,
        }
    }
}

impl Default for NonlinearConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            sampen_order: 2,
            sampen_tolerance: 0.2,
            perm_order: 3,
            perm_delay: 1,
            svd_order: 3,
            svd_delay: 1,
            higuchi_kmax: 10,
            spectral_segment: 256,
        }
    }
}

impl Default for CrossConfig {
    fn default() -> Self {
        Self { coherence_segment_secs: 1.0 }
    }
}

impl Default for KpiSelection {
    fn default() -> Self {
        Self {
            groups: FeatureGroup::ALL.to_vec(),
            core: Metric::default_core().into_iter().map(Metric::name).collect(),
        }
    }
}

fn positive(value: f64, what: &str) -> KpiResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_error!("{} must be positive, got {}", what, value))
    }
}

impl PipelineConfig {
    /// Validate entire configuration and resolve the capability table
    pub fn validate(&self) -> KpiResult<KpiSchema> {
        positive(self.sampling.nominal_rate, "sampling.nominal_rate")?;
        if !(self.sampling.deviation_tolerance >= 0.0) {
            return Err(config_error!("sampling.deviation_tolerance must be non-negative"));
        }

        self.validate_filter()?;
        self.validate_epoch()?;
        self.validate_gate()?;
        self.validate_bands()?;
        self.validate_features()?;

        self.kpi.schema()
    }

    fn validate_filter(&self) -> KpiResult<()> {
        let f = &self.filter;
        positive(f.notch_freq, "filter.notch_freq")?;
        positive(f.notch_q, "filter.notch_q")?;
        positive(f.band_low, "filter.band_low")?;
        if !(f.band_high > f.band_low) {
            return Err(config_error!(
                "filter.band_high {}Hz must exceed filter.band_low {}Hz",
                f.band_high,
                f.band_low
            ));
        }
        if f.order == 0 || f.order % 2 != 0 || f.order > 8 {
            return Err(config_error!("filter.order must be even and in 2..=8, got {}", f.order));
        }
        Ok(())
    }

    fn validate_epoch(&self) -> KpiResult<()> {
        let e = &self.epoch;
        positive(e.window_secs, "epoch.window_secs")?;
        if !(e.overlap_secs >= 0.0 && e.overlap_secs < e.window_secs) {
            return Err(config_error!(
                "epoch window {}s must exceed overlap {}s, and overlap must be non-negative",
                e.window_secs,
                e.overlap_secs
            ));
        }
        Ok(())
    }

    fn validate_gate(&self) -> KpiResult<()> {
        let g = &self.gate;
        positive(g.artifact_threshold_uv, "gate.artifact_threshold_uv")?;
        positive(g.flatline_epsilon, "gate.flatline_epsilon")?;
        if !(g.min_duration_secs >= 0.0) {
            return Err(config_error!("gate.min_duration_secs must be non-negative"));
        }
        if g.min_clean_epochs == 0 {
            return Err(config_error!("gate.min_clean_epochs must be at least 1"));
        }
        Ok(())
    }

    fn validate_bands(&self) -> KpiResult<()> {
        let mut previous: Option<(Band, BandRange)> = None;
        for band in Band::ALL {
            let range = self.bands.range(band);
            if !(range.low >= 0.0 && range.high > range.low) {
                return Err(config_error!(
                    "band {} has inconsistent edges {}..{}Hz",
                    band.name(),
                    range.low,
                    range.high
                ));
            }
            if let Some((prev_band, prev)) = previous {
                if range.low < prev.high {
                    return Err(config_error!(
                        "band {} starts at {}Hz inside band {} ending at {}Hz",
                        band.name(),
                        range.low,
                        prev_band.name(),
                        prev.high
                    ));
                }
            }
            previous = Some((band, range));
        }

        let analysis = self.bands.analysis_range();
        if analysis.low < self.filter.band_low || analysis.high > self.filter.band_high {
            return Err(config_error!(
                "bands span {}..{}Hz outside the filter pass band {}..{}Hz",
                analysis.low,
                analysis.high,
                self.filter.band_low,
                self.filter.band_high
            ));
        }
        Ok(())
    }

    fn validate_features(&self) -> KpiResult<()> {
        positive(self.time.peak_prominence_uv, "time.peak_prominence_uv")?;

        let s = &self.spectral;
        positive(s.welch_segment_secs, "spectral.welch_segment_secs")?;
        positive(s.aperiodic.fit_low, "spectral.aperiodic.fit_low")?;
        if !(s.aperiodic.fit_high > s.aperiodic.fit_low) {
            return Err(config_error!("spectral.aperiodic fit range is empty"));
        }
        if s.aperiodic.min_points < 3 {
            return Err(config_error!("spectral.aperiodic.min_points must be at least 3"));
        }
        if let PeakExclusion::ResidualSigma { sigma } = s.aperiodic.peak_exclusion {
            positive(sigma, "spectral.aperiodic.peak_exclusion.sigma")?;
        }

        let n = &self.nonlinear;
        if n.sampen_order == 0 || n.perm_order < 2 || n.svd_order < 2 || n.higuchi_kmax < 2 {
            return Err(config_error!("nonlinear embedding orders are too small"));
        }
        if n.perm_delay == 0 || n.svd_delay == 0 {
            return Err(config_error!("nonlinear embedding delays must be at least 1"));
        }
        positive(n.sampen_tolerance, "nonlinear.sampen_tolerance")?;
        if n.spectral_segment < 8 {
            return Err(config_error!("nonlinear.spectral_segment must be at least 8 samples"));
        }

        positive(self.cross.coherence_segment_secs, "cross.coherence_segment_secs")?;
        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> KpiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KpiError::InvalidConfig {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON; missing sections take defaults
    pub fn from_json(json: &str) -> KpiResult<Self> {
        serde_json::from_str(json).map_err(|e| KpiError::InvalidConfig {
            message: format!("Failed to deserialize configuration: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = PipelineConfig::default();
        let schema = config.validate().unwrap();
        assert!(schema.is_enabled(FeatureGroup::Nonlinear));
        assert_eq!(config.bands.analysis_range(), BandRange::new(0.5, 50.0));
    }

    #[test]
    fn test_window_must_exceed_overlap() {
        let mut config = PipelineConfig::default();
        config.epoch.overlap_secs = 4.0;
        assert!(config.validate().is_err());

        config.epoch.overlap_secs = -1.0;
        assert!(config.validate().is_err());

        config.epoch.overlap_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inconsistent_band_edges() {
        let mut config = PipelineConfig::default();
        config.bands.alpha = BandRange::new(7.0, 13.0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bands.gamma = BandRange::new(30.0, 80.0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bands.beta = BandRange::new(30.0, 13.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_odd_filter_order_rejected() {
        let mut config = PipelineConfig::default();
        config.filter.order = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_core_metric_rejected() {
        let mut config = PipelineConfig::default();
        config.kpi.core.push("pow_abs_mu".to_string());
        assert!(matches!(config.validate(), Err(KpiError::UnknownMetric { .. })));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = PipelineConfig::default();
        config.spectral.aperiodic.peak_exclusion = PeakExclusion::None;
        config.gate.artifact_threshold_uv = 120.0;

        let json = config.to_json().unwrap();
        assert!(json.contains("\"rule\": \"none\""));
        let parsed = PipelineConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = PipelineConfig::from_json(r#"{ "epoch": { "window_secs": 5.0 } }"#).unwrap();
        assert_eq!(parsed.epoch.window_secs, 5.0);
        assert_eq!(parsed.epoch.overlap_secs, 2.0);
        assert_eq!(parsed.filter, FilterConfig::default());
    }
}
