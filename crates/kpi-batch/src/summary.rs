//! Run summary report

use crate::scanner::ScanResult;
use crate::service::{BatchOutcome, FileOutcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use kpi_core::KpiSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Not-computable share of one KPI column across written rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
    /// `None` when no rows were written
    pub proportion: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    /// `.txt` files found under the input directory
    pub scanned: usize,
    /// Files whose name did not follow the convention
    pub skipped: Vec<PathBuf>,
    /// Files that made it through the pipeline, disqualified or not
    pub processed: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub disqualified: BTreeMap<String, usize>,
    pub failures: Vec<FailedFile>,
    pub epochs_total: usize,
    pub epochs_rejected: usize,
    pub missing: Vec<ColumnMissing>,
}

impl BatchSummary {
    pub fn build(scan: &ScanResult, batch: &BatchOutcome, schema: &KpiSchema, started: DateTime<Local>) -> Self {
        let mut disqualified = BTreeMap::new();
        let mut failures = Vec::new();
        let mut processed = 0;
        let mut epochs_total = 0;
        let mut epochs_rejected = 0;

        for outcome in &batch.outcomes {
            let epochs = outcome.epochs();
            epochs_total += epochs.total;
            epochs_rejected += epochs.rejected;
            match outcome {
                FileOutcome::Processed { .. } => processed += 1,
                FileOutcome::Disqualified { reason, .. } => {
                    processed += 1;
                    *disqualified.entry(reason.reason().to_string()).or_insert(0) += 1;
                }
                FileOutcome::Failed { path, error, .. } => failures.push(FailedFile {
                    file: path.clone(),
                    error: error.clone(),
                }),
            }
        }

        let rows = batch.written.len();
        let missing = schema
            .columns()
            .iter()
            .map(|key| {
                let missing = batch
                    .written
                    .iter()
                    .filter(|record| !record.value(key).is_computable())
                    .count();
                ColumnMissing {
                    column: key.column_name(),
                    missing,
                    proportion: (rows > 0).then(|| missing as f64 / rows as f64),
                }
            })
            .collect();

        Self {
            started,
            finished: Local::now(),
            scanned: scan.scanned(),
            skipped: scan.skipped.clone(),
            processed,
            rows_written: rows,
            rows_dropped: processed.saturating_sub(rows),
            disqualified,
            failures,
            epochs_total,
            epochs_rejected,
            missing,
        }
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "KPI batch summary");
        let _ = writeln!(out, "started:  {}", self.started.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "finished: {}", self.finished.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out);
        let _ = writeln!(out, "files scanned:   {}", self.scanned);
        let _ = writeln!(out, "files skipped:   {}", self.skipped.len());
        let _ = writeln!(out, "files processed: {}", self.processed);
        let _ = writeln!(out, "files failed:    {}", self.failures.len());
        let _ = writeln!(out, "rows written:    {}", self.rows_written);
        let _ = writeln!(out, "rows dropped:    {}", self.rows_dropped);

        let drop_rate = if self.epochs_total > 0 {
            100.0 * self.epochs_rejected as f64 / self.epochs_total as f64
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "epochs:          {} total, {} rejected ({:.1}%)",
            self.epochs_total, self.epochs_rejected, drop_rate
        );

        if !self.disqualified.is_empty() {
            let _ = writeln!(out, "\ndisqualified recordings:");
            for (reason, count) in &self.disqualified {
                let _ = writeln!(out, "  {}: {}", reason, count);
            }
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "\nskipped files:");
            for path in &self.skipped {
                let _ = writeln!(out, "  {}", path.display());
            }
        }

        if !self.failures.is_empty() {
            let _ = writeln!(out, "\nfailed files:");
            for failure in &self.failures {
                let _ = writeln!(out, "  {}: {}", failure.file.display(), failure.error);
            }
        }

        let _ = writeln!(out, "\nnot-computable proportion per column:");
        let width = self.missing.iter().map(|m| m.column.len()).max().unwrap_or(0);
        for column in &self.missing {
            match column.proportion {
                Some(p) => {
                    let _ = writeln!(out, "  {:<width$}  {:.3}", column.column, p, width = width);
                }
                None => {
                    let _ = writeln!(out, "  {:<width$}  n/a", column.column, width = width);
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("cannot serialize batch summary")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).with_context(|| format!("cannot write summary to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::{AggregatedRecord, Condition, Disqualification, FeatureGroup, KpiValue, RecordStatus, RecordingMeta};
    use kpi_processing::EpochTally;

    fn schema() -> KpiSchema {
        KpiSchema::build(&[FeatureGroup::Time], &["stat_mean".to_string()]).unwrap()
    }

    fn meta(trial: u32) -> RecordingMeta {
        RecordingMeta::new("S01", Condition::Positive, trial, format!("S01_G_{:03}.txt", trial))
    }

    #[test]
    fn test_counts_and_missing_proportion() {
        let schema = schema();
        let tally = EpochTally { total: 10, rejected: 2, accepted: 8 };

        let mut row = AggregatedRecord::disqualified(meta(1), &schema, Disqualification::ShortRecording);
        row.status = RecordStatus::Computed;
        row.retained = true;
        row.values[0].1 = KpiValue::Value(1.0);

        let batch = BatchOutcome {
            outcomes: vec![
                FileOutcome::Processed { meta: meta(1), retained: true, epochs: tally, events: vec![] },
                FileOutcome::Disqualified {
                    meta: meta(2),
                    reason: Disqualification::InsufficientCleanEpochs,
                    epochs: EpochTally { total: 5, rejected: 4, accepted: 1 },
                    events: vec![],
                },
                FileOutcome::Failed { path: PathBuf::from("S01_G_003.txt"), meta: meta(3), error: "boom".into() },
            ],
            written: vec![row],
        };
        let scan = ScanResult { files: vec![], skipped: vec![PathBuf::from("notes.txt")] };

        let summary = BatchSummary::build(&scan, &batch, &schema, Local::now());
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.rows_dropped, 1);
        assert_eq!(summary.disqualified.get("insufficient clean epochs"), Some(&1));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!((summary.epochs_total, summary.epochs_rejected), (15, 6));

        assert_eq!(summary.missing[0].proportion, Some(0.0));
        assert!(summary.missing[1..].iter().all(|m| m.proportion == Some(1.0)));

        let text = summary.render();
        assert!(text.contains("rows dropped:    1"));
        assert!(text.contains("S01_G_003.txt: boom"));
        assert!(summary.to_json().unwrap().contains("\"rows_written\": 1"));
    }

    #[test]
    fn test_empty_batch() {
        let batch = BatchOutcome { outcomes: vec![], written: vec![] };
        let summary = BatchSummary::build(&ScanResult::default(), &batch, &schema(), Local::now());
        assert!(summary.missing.iter().all(|m| m.proportion.is_none()));
        assert!(summary.render().contains("n/a"));
    }
}
