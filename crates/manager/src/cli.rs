// crates/manager/src/cli.rs
use std::path::PathBuf;

use clap::Parser;

/// Reconcile the bot's Slurm jobs with their pull-request comments.
#[derive(Parser, Debug)]
#[command(name = "jobbot-job-manager")]
#[command(version, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long = "config", default_value = "app.toml")]
    pub config: PathBuf,

    /// Number of iterations to run; negative runs forever
    #[arg(
        short = 'i',
        long = "max-manager-iterations",
        default_value_t = -1,
        allow_negative_numbers = true
    )]
    pub max_iterations: i64,

    /// Only process these job ids (comma separated)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<String>,

    /// Verbose logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}
