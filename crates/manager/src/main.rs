// crates/manager/src/main.rs
//! `jobbot-job-manager`: polls the scheduler and keeps PR comments current.

mod cli;

use anyhow::Context;
use clap::Parser;
use jobbot_core::{
    AppConfig, IterationLimit, JobFilter, JobManager, NotificationClient, SlurmScheduler,
    SymlinkRegistry, ThreadSleeper,
};
use jobbot_github::GithubClient;
use jobbot_observability::{init_logging, LoggingOptions};
use tracing::info;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let _log_guard = init_logging(&LoggingOptions {
        debug: cli.debug,
        log_path: config.job_manager.log_path.clone(),
    })
    .context("initializing logging")?;

    let limit = IterationLimit::from_count(cli.max_iterations);
    if limit == IterationLimit::Bounded(0) {
        info!("max iterations is 0, nothing to do");
        return Ok(());
    }

    let runtime = config.runtime().context("checking [job_manager] settings")?;
    let user = match config.job_manager.user.clone() {
        Some(user) => user,
        None => std::env::var("USER").context("no [job_manager] user and $USER is not set")?,
    };
    let filter = match cli.jobs.as_deref() {
        Some(list) => JobFilter::parse(list).context("parsing --jobs")?,
        None => JobFilter::All,
    };

    let scheduler = SlurmScheduler::from_settings(&runtime).context("configuring scheduler")?;
    let registry = SymlinkRegistry::new(&runtime.job_ids_dir);
    let github = GithubClient::from_settings(&config.github).context("configuring GitHub client")?;
    let notifier = NotificationClient::new(Box::new(github));

    info!(
        user = %user,
        job_ids_dir = %runtime.job_ids_dir.display(),
        poll_interval_secs = runtime.poll_interval.as_secs(),
        ?limit,
        ?filter,
        "job manager starting"
    );

    let mut manager = JobManager::new(
        &config,
        user,
        Box::new(scheduler),
        Box::new(registry),
        notifier,
    )
    .with_filter(filter);
    manager.run(limit, runtime.poll_interval, &ThreadSleeper);
    Ok(())
}
