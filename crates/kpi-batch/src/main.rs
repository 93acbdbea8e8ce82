//! KPI batch runner

mod cli;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use cli::{Cli, Command, DefaultConfigArgs, RunArgs, SimulateArgs};
use kpi_batch::{scan_directory, BatchRunner, BatchSummary, FilenameParser, SynthPlan, TableWriter};
use kpi_processing::{KpiPipeline, PipelineConfig};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Batch completed but at least one file failed
const EXIT_FILE_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Simulate(args) => simulate(args).await,
        Command::DefaultConfig(args) => default_config(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("invalid configuration {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(rate) = args.nominal_rate {
        config.sampling.nominal_rate = rate;
    }
    Ok(config)
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let started = Local::now();

    // setup errors abort before any recording is read
    let pipeline = KpiPipeline::new(load_config(&args)?).context("pipeline setup failed")?;
    let schema = pipeline.schema().clone();

    let parser = FilenameParser::new()?;
    let scan = scan_directory(&args.input, &parser)?;
    info!(
        input = %args.input.display(),
        recordings = scan.files.len(),
        skipped = scan.skipped.len(),
        "input scanned"
    );

    let table = TableWriter::create(&args.output, &schema)?;
    let workers = args.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let runner = BatchRunner::new(pipeline, workers);
    let (batch, _) = runner.run(scan.files.clone(), table).await?;

    let summary = BatchSummary::build(&scan, &batch, &schema, started);
    let summary_path = args
        .summary
        .clone()
        .unwrap_or_else(|| args.output.with_extension("summary.txt"));
    summary.write_to(&summary_path)?;
    if args.json {
        println!("{}", summary.to_json()?);
    }

    info!(
        table = %args.output.display(),
        summary = %summary_path.display(),
        rows = summary.rows_written,
        dropped = summary.rows_dropped,
        failed = summary.failures.len(),
        "KPI table written"
    );

    Ok(if summary.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FILE_FAILURES)
    })
}

async fn simulate(args: SimulateArgs) -> Result<ExitCode> {
    let plan = SynthPlan {
        subjects: args.subjects,
        trials: args.trials,
        duration_secs: args.duration,
        sampling_rate: args.rate,
        seed: args.seed,
    };
    let dir = args.output;
    let paths = tokio::task::spawn_blocking(move || plan.generate(&dir))
        .await
        .context("simulation worker failed")??;
    println!("{} recordings written", paths.len());
    Ok(ExitCode::SUCCESS)
}

fn default_config(args: DefaultConfigArgs) -> Result<ExitCode> {
    let json = PipelineConfig::default().to_json()?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
        }
        None => println!("{}", json),
    }
    Ok(ExitCode::SUCCESS)
}
