//! Synthetic data sets in the loader's file format

use anyhow::{Context, Result};
use chrono::NaiveTime;
use kpi_core::{Condition, RawRecording, RecordingMeta};
use kpi_simulation::{ChannelProfile, EegConfig, EegSimulator, SignalPattern};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Wall-clock time of the first sample in generated files
const START_OF_DAY_SECS: f64 = 9.0 * 3600.0;

/// Write `recording` as `Timestamp(HH:mm:ss.SSS),Ch1(uV),Ch2(uV)` CSV
pub fn write_recording(path: &Path, recording: &RawRecording) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "Timestamp(HH:mm:ss.SSS),Ch1(uV),Ch2(uV)")?;

    let [ch1, ch2] = recording.channels();
    for ((t, a), b) in recording.timestamps().iter().zip(ch1).zip(ch2) {
        writeln!(out, "{},{:.3},{:.3}", clock_time(START_OF_DAY_SECS + t), a, b)?;
    }
    out.flush().with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

fn clock_time(secs: f64) -> String {
    let millis = (secs * 1000.0).round() as i64;
    let day_millis = millis.rem_euclid(86_400_000);
    NaiveTime::from_num_seconds_from_midnight_opt((day_millis / 1000) as u32, (day_millis % 1000) as u32 * 1_000_000)
        .map(|time| time.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "00:00:00.000".to_string())
}

/// Layout of a generated data set
#[derive(Debug, Clone, PartialEq)]
pub struct SynthPlan {
    pub subjects: u32,
    pub trials: u32,
    pub duration_secs: f64,
    pub sampling_rate: f64,
    pub seed: u64,
}

impl Default for SynthPlan {
    fn default() -> Self {
        Self {
            subjects: 3,
            trials: 2,
            duration_secs: 60.0,
            sampling_rate: 250.0,
            seed: 42,
        }
    }
}

impl SynthPlan {
    /// Positive trials carry extra alpha, negative trials extra beta
    fn config(&self, condition: Condition, seed: u64) -> EegConfig {
        let extra = match condition {
            Condition::Positive => SignalPattern::Burst { frequency: 10.0, amplitude: 12.0, on_secs: 2.0, off_secs: 1.0 },
            Condition::Negative => SignalPattern::Rhythm { frequency: 18.0, amplitude: 8.0, phase: 0.3 },
        };
        let profile = ChannelProfile::resting().with_component(extra);
        EegConfig {
            sampling_rate: self.sampling_rate,
            nominal_rate: self.sampling_rate,
            channels: [profile.clone(), profile],
            seed: Some(seed),
            ..EegConfig::default()
        }
    }

    /// Write every subject, condition and trial under `dir`
    pub fn generate(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

        let mut paths = Vec::new();
        let mut seed = self.seed;
        for subject in 1..=self.subjects {
            let subject_id = format!("S{:02}", subject);
            for condition in [Condition::Positive, Condition::Negative] {
                for trial in 1..=self.trials {
                    let filename = format!("{}_{}_{:03}.txt", subject_id, condition.letter(), trial);
                    let meta = RecordingMeta::new(subject_id.as_str(), condition, trial, filename.as_str());

                    let mut simulator = EegSimulator::new(self.config(condition, seed))?;
                    let recording = simulator.generate(meta, self.duration_secs)?;
                    let path = dir.join(&filename);
                    write_recording(&path, &recording)?;
                    paths.push(path);
                    seed = seed.wrapping_add(1);
                }
            }
        }

        info!(files = paths.len(), dir = %dir.display(), "synthetic data set written");
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_recording;

    #[test]
    fn test_clock_time() {
        assert_eq!(clock_time(0.0), "00:00:00.000");
        assert_eq!(clock_time(36_001.004), "10:00:01.004");
        assert_eq!(clock_time(86_400.5), "00:00:00.500");
    }

    #[test]
    fn test_generated_files_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let plan = SynthPlan { subjects: 1, trials: 1, duration_secs: 2.0, ..SynthPlan::default() };
        let paths = plan.generate(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("S01_G_001.txt"));
        assert!(paths[1].ends_with("S01_B_001.txt"));

        let meta = RecordingMeta::new("S01", Condition::Positive, 1, "S01_G_001.txt");
        let recording = load_recording(&paths[0], meta, 250.0).unwrap();
        assert_eq!(recording.len(), 500);
        assert!((recording.observed_sampling_rate().unwrap() - 250.0).abs() < 1e-6);
    }
}
