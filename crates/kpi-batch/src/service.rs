//! Bounded parallel processing of a scanned directory
//!
//! Each file is loaded and processed on the blocking pool, at most
//! `workers` at a time. Finished records flow over a channel to a single
//! writer task, which owns the table and writes retained rows in
//! (subject, condition, trial) order once every file is done.

use crate::loader::load_recording;
use crate::scanner::ScannedFile;
use crate::writer::TableWriter;
use anyhow::{Context, Result};
use kpi_core::{AggregatedRecord, Disqualification, PipelineEvent, RecordStatus, RecordingMeta};
use kpi_processing::{EpochTally, KpiPipeline};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// What happened to one input file
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// KPIs computed; `retained` tells whether the row was written
    Processed {
        meta: RecordingMeta,
        retained: bool,
        epochs: EpochTally,
        events: Vec<PipelineEvent>,
    },
    Disqualified {
        meta: RecordingMeta,
        reason: Disqualification,
        epochs: EpochTally,
        events: Vec<PipelineEvent>,
    },
    /// Fatal for this file only: unreadable, malformed, or a worker panic
    Failed {
        path: PathBuf,
        meta: RecordingMeta,
        error: String,
    },
}

impl FileOutcome {
    pub fn meta(&self) -> &RecordingMeta {
        match self {
            FileOutcome::Processed { meta, .. }
            | FileOutcome::Disqualified { meta, .. }
            | FileOutcome::Failed { meta, .. } => meta,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }

    pub fn epochs(&self) -> EpochTally {
        match self {
            FileOutcome::Processed { epochs, .. } | FileOutcome::Disqualified { epochs, .. } => *epochs,
            FileOutcome::Failed { .. } => EpochTally::default(),
        }
    }
}

/// Result of a whole batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One entry per input file, in table order
    pub outcomes: Vec<FileOutcome>,
    /// Rows written to the table, in the order written
    pub written: Vec<AggregatedRecord>,
}

pub struct BatchRunner {
    pipeline: Arc<KpiPipeline>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(pipeline: KpiPipeline, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            workers: workers.max(1),
        }
    }

    pub fn pipeline(&self) -> &KpiPipeline {
        &self.pipeline
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process `files` and write the retained rows to `table`.
    ///
    /// Per-file failures are reported in the outcome; only a broken table
    /// writer fails the batch. Returns the table's underlying writer.
    pub async fn run<W>(&self, files: Vec<ScannedFile>, table: TableWriter<W>) -> Result<(BatchOutcome, W)>
    where
        W: Write + Send + 'static,
    {
        let start = Instant::now();
        info!(files = files.len(), workers = self.workers, "batch started");

        let (rows_tx, rows_rx) = mpsc::channel(self.workers * 2);
        let writer = spawn_writer(table, rows_rx);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for file in files {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .context("worker pool closed")?;
            tasks.spawn(process_file(Arc::clone(&self.pipeline), file, permit, rows_tx.clone()));
        }
        drop(rows_tx);

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "file task aborted"),
            }
        }

        let (written, inner) = writer.await.context("table writer stopped")??;
        outcomes.sort_by(|a, b| a.meta().sort_key().cmp(&b.meta().sort_key()));

        info!(
            files = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.is_failed()).count(),
            rows = written.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok((BatchOutcome { outcomes, written }, inner))
    }
}

async fn process_file(
    pipeline: Arc<KpiPipeline>,
    file: ScannedFile,
    permit: OwnedSemaphorePermit,
    rows: mpsc::Sender<AggregatedRecord>,
) -> FileOutcome {
    let ScannedFile { path, meta } = file;
    let nominal_rate = pipeline.config().sampling.nominal_rate;

    let job_path = path.clone();
    let job_meta = meta.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let raw = load_recording(&job_path, job_meta, nominal_rate)?;
        Ok::<_, anyhow::Error>(pipeline.process(&raw)?)
    })
    .await;

    let report = match joined {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            let error = format!("{:#}", e);
            error!(recording = %meta, file = %path.display(), error = %error, "recording failed");
            return FileOutcome::Failed { path, meta, error };
        }
        Err(e) => {
            let error = describe_join_error(e);
            error!(recording = %meta, file = %path.display(), error = %error, "recording worker failed");
            return FileOutcome::Failed { path, meta, error };
        }
    };

    let outcome = match report.record.status {
        RecordStatus::Computed => FileOutcome::Processed {
            meta,
            retained: report.record.retained,
            epochs: report.epochs,
            events: report.events,
        },
        RecordStatus::Disqualified(reason) => FileOutcome::Disqualified {
            meta,
            reason,
            epochs: report.epochs,
            events: report.events,
        },
    };

    if rows.send(report.record).await.is_err() {
        warn!(recording = %outcome.meta(), "table writer gone, row lost");
    }
    outcome
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return format!("worker cancelled: {}", e);
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(message) => format!("worker panicked: {}", message),
        None => "worker panicked".to_string(),
    }
}

fn spawn_writer<W>(
    mut table: TableWriter<W>,
    mut rows: mpsc::Receiver<AggregatedRecord>,
) -> JoinHandle<Result<(Vec<AggregatedRecord>, W)>>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut retained = Vec::new();
        while let Some(record) = rows.blocking_recv() {
            if record.retained {
                retained.push(record);
            } else {
                debug!(recording = %record.meta, "no core KPI computable, row dropped");
            }
        }

        retained.sort_by(|a, b| a.meta.sort_key().cmp(&b.meta.sort_key()));
        for record in &retained {
            table.write_record(record)?;
        }
        Ok((retained, table.finish()?))
    })
}
