//! End-to-end behavior of the recording pipeline

use kpi_core::{
    ChannelId, Condition, Disqualification, KpiError, KpiKey, KpiValue, Metric, RawRecording, RecordStatus,
    RecordingMeta, Scope,
};
use kpi_processing::{ChannelCalculator, EpochConfig, Epocher, FeatureBank, KpiPipeline, PipelineConfig};
use kpi_simulation::{ChannelProfile, EegConfig, EegSimulator, SignalPattern};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

const FS: f64 = 250.0;

fn meta() -> RecordingMeta {
    RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt")
}

fn sine(freq: f64, amp: f64, secs: f64) -> Vec<f64> {
    let n = (secs * FS).round() as usize;
    (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / FS).sin()).collect()
}

fn recording(ch1: Vec<f64>, ch2: Vec<f64>) -> RawRecording {
    let timestamps = (0..ch1.len()).map(|i| i as f64 / FS).collect();
    RawRecording::new(meta(), ch1, ch2, timestamps, FS).unwrap()
}

fn simulated(config: EegConfig, secs: f64) -> RawRecording {
    EegSimulator::new(EegConfig { seed: Some(42), ..config })
        .unwrap()
        .generate(meta(), secs)
        .unwrap()
}

fn non_overlapping() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.epoch = EpochConfig { window_secs: 4.0, overlap_secs: 0.0 };
    config
}

fn codes(report: &kpi_processing::RecordingReport) -> Vec<&'static str> {
    report.events.iter().map(|e| e.code()).collect()
}

#[test]
fn test_short_recording_all_not_computable() {
    let pipeline = KpiPipeline::new(PipelineConfig::default()).unwrap();
    let cases = [
        (sine(10.0, 20.0, 9.9), sine(10.0, 20.0, 9.9)),
        (Vec::new(), Vec::new()),
        (vec![1.0], vec![2.0]),
        (vec![1.0, 1.5], vec![2.0, 2.5]),
    ];
    for (ch1, ch2) in cases {
        let n = ch1.len();
        let report = pipeline.process(&recording(ch1, ch2)).unwrap();

        assert_eq!(report.record.computable_count(), 0, "{} samples", n);
        assert_eq!(report.record.values.len(), pipeline.schema().columns().len());
        assert!(!report.record.retained);
        assert_eq!(
            report.record.status,
            RecordStatus::Disqualified(Disqualification::ShortRecording)
        );
        assert_eq!(codes(&report), vec!["short-recording-error"], "{} samples", n);
        assert_eq!(report.epochs.total, 0);
    }
}

#[test]
fn test_two_clean_epochs_disqualify_three_compute() {
    let pipeline = KpiPipeline::new(non_overlapping()).unwrap();

    let mut spiked = sine(10.0, 20.0, 12.0);
    spiked[1500] += 1000.0;
    let report = pipeline.process(&recording(spiked, sine(10.0, 20.0, 12.0))).unwrap();
    assert_eq!(report.epochs.accepted, 2);
    assert_eq!(report.epochs.rejected, 1);
    assert_eq!(report.record.computable_count(), 0);
    assert_eq!(codes(&report), vec!["insufficient-clean-epochs"]);

    let report = pipeline
        .process(&recording(sine(10.0, 20.0, 12.0), sine(10.0, 20.0, 12.0)))
        .unwrap();
    assert_eq!(report.epochs.accepted, 3);
    assert_eq!(report.record.status, RecordStatus::Computed);
    assert!(report.record.retained);
    assert!(report.events.is_empty());
}

#[test]
fn test_epoch_count_formula() {
    let cases = [
        (10.0, 4.0, 2.0),
        (12.0, 4.0, 0.0),
        (9.9, 4.0, 1.0),
        (30.0, 4.0, 3.0),
        (3.9, 4.0, 2.0),
        (4.0, 4.0, 0.0),
    ];
    for (duration, window, overlap) in cases {
        let epocher = Epocher::new(&EpochConfig { window_secs: window, overlap_secs: overlap }).unwrap();
        let n = (duration * FS).round() as usize;
        let expected = if duration >= window {
            ((duration - window) / (window - overlap)).floor() as usize + 1
        } else {
            0
        };
        assert_eq!(epocher.epoch_count(n, FS), expected, "D={} W={} O={}", duration, window, overlap);
    }
}

#[test]
fn test_sinusoid_peak_and_band_power() {
    let pipeline = KpiPipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline
        .process(&recording(sine(10.0, 20.0, 20.0), sine(7.0, 20.0, 20.0)))
        .unwrap();
    let record = &report.record;
    let value = |channel, metric| record.value(&KpiKey::channel(channel, metric)).value().unwrap();

    assert!((value(ChannelId::Ch1, Metric::PeakFrequency) - 10.0).abs() <= 0.5);
    assert!((value(ChannelId::Ch2, Metric::PeakFrequency) - 7.0).abs() <= 0.5);

    use kpi_core::Band::*;
    for band in [Delta, Theta, Beta, Gamma] {
        assert!(value(ChannelId::Ch1, Metric::PowerRelative(band)) < 0.01);
    }
    for band in [Delta, Alpha, Beta, Gamma] {
        assert!(value(ChannelId::Ch2, Metric::PowerRelative(band)) < 0.01);
    }
}

#[test]
fn test_identical_channels_coherent() {
    let source = simulated(EegConfig::default(), 20.0);
    let signal = source.channel(ChannelId::Ch1).to_vec();

    let pipeline = KpiPipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.process(&recording(signal.clone(), signal)).unwrap();

    for band in kpi_core::Band::ALL {
        let coherence = report.record.value(&KpiKey::cross(Metric::Coherence(band))).value().unwrap();
        let asymmetry = report.record.value(&KpiKey::cross(Metric::PowerAsymmetry(band))).value().unwrap();
        assert!((coherence - 1.0).abs() < 1e-6, "{:?} coherence {}", band, coherence);
        assert!(asymmetry.abs() < 1e-6);
    }
    let r = report.record.value(&KpiKey::cross(Metric::PearsonCorrelation)).value().unwrap();
    assert!((r - 1.0).abs() < 1e-6);
}

#[test]
fn test_independent_channels_incoherent() {
    let noise_only = ChannelProfile { components: Vec::new(), noise_std: 10.0 };
    let source = simulated(
        EegConfig {
            channels: [noise_only.clone(), noise_only],
            shared_noise_std: 0.0,
            ..EegConfig::default()
        },
        40.0,
    );

    let report = KpiPipeline::new(PipelineConfig::default()).unwrap().process(&source).unwrap();

    // 1 s segments with 50% overlap: 7 per 4 s epoch, so independent noise
    // averages to roughly 1/7 rather than zero
    for band in kpi_core::Band::ALL {
        let coherence = report.record.value(&KpiKey::cross(Metric::Coherence(band))).value().unwrap();
        assert!(coherence < 0.25, "{:?} coherence {}", band, coherence);
    }
    let r = report.record.value(&KpiKey::cross(Metric::PearsonCorrelation)).value().unwrap();
    assert!(r.abs() < 0.1);
}

/// Records the largest magnitude of every epoch it is shown
struct PeakRecorder {
    seen: Arc<Mutex<Vec<f64>>>,
}

impl ChannelCalculator for PeakRecorder {
    fn compute(&self, data: &[f64], _fs: f64) -> Vec<(Metric, KpiValue)> {
        let peak = data.iter().fold(0.0f64, |m, x| m.max(x.abs()));
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(peak);
        }
        vec![(Metric::StatMean, KpiValue::Value(0.0))]
    }
}

#[test]
fn test_rejected_epoch_never_reaches_calculators() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut bank = FeatureBank::new();
    bank.add_channel_calculator(Box::new(PeakRecorder { seen: Arc::clone(&seen) }));
    let pipeline = KpiPipeline::new(non_overlapping()).unwrap().with_feature_bank(bank);

    let mut spiked = sine(10.0, 20.0, 16.0);
    spiked[1500] += 1000.0;
    let report = pipeline.process(&recording(spiked, sine(10.0, 20.0, 16.0))).unwrap();
    assert_eq!(report.epochs.accepted, 3);

    let seen = seen.lock().unwrap();
    // Three accepted epochs, two channels each
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().all(|&peak| peak < 100.0), "saw {:?}", *seen);
}

#[test]
fn test_flat_channel_isolated() {
    let source = simulated(
        EegConfig {
            channels: [ChannelProfile::resting(), ChannelProfile::flat(12.5)],
            shared_noise_std: 0.0,
            ..EegConfig::default()
        },
        20.0,
    );
    let report = KpiPipeline::new(PipelineConfig::default()).unwrap().process(&source).unwrap();
    assert_eq!(codes(&report), vec!["channel-flatline-warning"]);

    let record = &report.record;
    for (key, value) in &record.values {
        match key.scope {
            Scope::Channel(ChannelId::Ch2) | Scope::Cross => assert!(!value.is_computable(), "{:?}", key),
            Scope::Channel(ChannelId::Ch1) => {}
        }
    }
    for metric in [Metric::StatMean, Metric::StatStd, Metric::PowerTotal, Metric::HjorthMobility] {
        assert!(record.value(&KpiKey::channel(ChannelId::Ch1, metric)).is_computable());
    }
    assert!(record.retained);
}

#[test]
fn test_rate_deviation_warns_and_uses_observed_rate() {
    let source = simulated(
        EegConfig {
            sampling_rate: 200.0,
            nominal_rate: 250.0,
            ..EegConfig::default()
        },
        20.0,
    );
    let report = KpiPipeline::new(PipelineConfig::default()).unwrap().process(&source).unwrap();
    assert_eq!(codes(&report), vec!["sampling-rate-deviation-warning"]);
    assert!((report.observed_rate - 200.0).abs() < 1e-6);
    // 20 s at 200 Hz with 4 s windows and 2 s steps
    assert_eq!(report.epochs.total, 9);

    let peak = report
        .record
        .value(&KpiKey::channel(ChannelId::Ch1, Metric::PeakFrequency))
        .value()
        .unwrap();
    assert!((peak - 10.0).abs() <= 0.5);
}

#[test]
fn test_bad_timestamps_fatal() {
    let ch = sine(10.0, 20.0, 12.0);
    let mut timestamps: Vec<f64> = (0..ch.len()).map(|i| i as f64 / FS).collect();
    timestamps[100] = 0.0;
    let raw = RawRecording::new(meta(), ch.clone(), ch, timestamps, FS).unwrap();

    let result = KpiPipeline::new(PipelineConfig::default()).unwrap().process(&raw);
    assert!(matches!(result, Err(KpiError::NonMonotonicTimestamps { index: 100 })));
}

#[test]
fn test_misconfiguration_fails_at_startup() {
    let mut config = PipelineConfig::default();
    config.epoch.overlap_secs = config.epoch.window_secs;
    assert!(KpiPipeline::new(config).is_err());
}

#[test]
fn test_processing_is_deterministic() {
    let source = simulated(EegConfig::default(), 20.0);
    let pipeline = KpiPipeline::new(PipelineConfig::default()).unwrap();
    let first = pipeline.process(&source).unwrap();
    let second = pipeline.process(&source).unwrap();
    assert_eq!(first.record, second.record);
    assert_eq!(first.record.to_row(), second.record.to_row());
}

#[test]
fn test_alpha_burst_simulation_end_to_end() {
    let bursty = ChannelProfile::resting().with_component(SignalPattern::Burst {
        frequency: 10.0,
        amplitude: 8.0,
        on_secs: 1.5,
        off_secs: 1.0,
    });
    let source = simulated(
        EegConfig {
            channels: [bursty, ChannelProfile::resting()],
            ..EegConfig::default()
        },
        30.0,
    );
    let pipeline = KpiPipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.process(&source).unwrap();

    assert_eq!(report.epochs.rejected, 0);
    let row = report.record.to_row();
    assert_eq!(row.len(), 4 + pipeline.schema().columns().len());
    assert_eq!(&row[..4], &["S01", "1", "1", "S01_G_001.txt"]);
    assert!(report.record.retained);
}
