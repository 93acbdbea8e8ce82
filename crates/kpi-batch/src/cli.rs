use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kpi-batch",
    version,
    about = "Dual-channel EEG KPI extraction",
    long_about = "Turn a directory of two-channel EEG recordings named <subject>_<G|B>_<NNN>.txt\n\
                  into one KPI table with a row per usable recording."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter (e.g. info, debug, kpi_processing=trace); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process every recording under a directory
    Run(RunArgs),
    /// Write a synthetic data set in the recording file format
    Simulate(SimulateArgs),
    /// Print the default pipeline configuration as JSON
    DefaultConfig(DefaultConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory searched recursively for recordings
    #[arg(long)]
    pub input: PathBuf,

    /// KPI table (CSV)
    #[arg(long, default_value = "kpis.csv")]
    pub output: PathBuf,

    /// Pipeline configuration (JSON); defaults apply to missing sections
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Nominal sampling rate in Hz, overriding the configuration
    #[arg(long)]
    pub nominal_rate: Option<f64>,

    /// Recordings processed in parallel (default: available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Summary report path (default: next to the table)
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Also print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Directory the recordings are written to
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 3)]
    pub subjects: u32,

    /// Trials per subject and condition
    #[arg(long, default_value_t = 2)]
    pub trials: u32,

    /// Recording length in seconds
    #[arg(long, default_value_t = 60.0)]
    pub duration: f64,

    /// Sampling rate in Hz
    #[arg(long, default_value_t = 250.0)]
    pub rate: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args)]
pub struct DefaultConfigArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}
