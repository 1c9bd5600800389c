// crates/core/src/scheduler.rs
//! Batch scheduler access: the bulk job listing, per-job introspection and
//! releasing held jobs.
//!
//! `SlurmScheduler` shells out to `squeue`/`scontrol`. Each command runs with a
//! timeout and the child is killed when it expires.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use jobbot_types::{JobId, JobRecord, JobState, Snapshot};
use tracing::{debug, info, warn};

use crate::config::RuntimeSettings;
use crate::error::SchedulerError;

/// Columns of `squeue --long`:
/// `JOBID PARTITION NAME USER STATE TIME TIME_LIMIT NODES NODELIST(REASON)`.
const MIN_FIELDS: usize = 9;
const COL_ID: usize = 0;
const COL_STATE: usize = 4;
const COL_REASON: usize = 8;

/// Timestamp line plus column header.
const HEADER_LINES: usize = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait Scheduler {
    /// All current jobs of `user`, keyed by id.
    fn snapshot(&self, user: &str) -> Result<Snapshot, SchedulerError>;

    /// Working directory of a job, `None` when the scheduler does not report one.
    fn working_dir(&self, id: &JobId) -> Result<Option<PathBuf>, SchedulerError>;

    /// Release a held job.
    fn release(&self, id: &JobId) -> Result<(), SchedulerError>;
}

#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    poll_command: Vec<String>,
    scontrol_command: Vec<String>,
    timeout: Duration,
}

impl SlurmScheduler {
    pub fn new(
        poll_command: &str,
        scontrol_command: &str,
        timeout: Duration,
    ) -> Result<Self, SchedulerError> {
        Ok(Self {
            poll_command: split_command(poll_command, "job_manager.poll_command")?,
            scontrol_command: split_command(scontrol_command, "job_manager.scontrol_command")?,
            timeout,
        })
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Result<Self, SchedulerError> {
        Self::new(
            &settings.poll_command,
            &settings.scontrol_command,
            settings.command_timeout,
        )
    }

    fn run(&self, base: &[String], extra: &[&str]) -> Result<String, SchedulerError> {
        let mut argv: Vec<&str> = base.iter().map(String::as_str).collect();
        argv.extend_from_slice(extra);
        run_with_timeout(&argv, self.timeout)
    }
}

impl Scheduler for SlurmScheduler {
    fn snapshot(&self, user: &str) -> Result<Snapshot, SchedulerError> {
        let user_arg = format!("--user={user}");
        let stdout = self.run(&self.poll_command, &["--long", &user_arg])?;
        Ok(parse_squeue_output(&stdout))
    }

    fn working_dir(&self, id: &JobId) -> Result<Option<PathBuf>, SchedulerError> {
        let stdout = self.run(
            &self.scontrol_command,
            &["--oneliner", "show", "jobid", id.as_str()],
        )?;
        Ok(parse_work_dir(&stdout))
    }

    fn release(&self, id: &JobId) -> Result<(), SchedulerError> {
        let stdout = self.run(&self.scontrol_command, &["release", id.as_str()])?;
        debug!(job_id = %id, output = %stdout.trim(), "released job");
        Ok(())
    }
}

fn split_command(command: &str, setting: &'static str) -> Result<Vec<String>, SchedulerError> {
    let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(SchedulerError::EmptyCommand { setting });
    }
    Ok(parts)
}

/// Run a command to completion, killing it once `timeout` elapses.
///
/// stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while we wait for it.
fn run_with_timeout(argv: &[&str], timeout: Duration) -> Result<String, SchedulerError> {
    let command_line = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(SchedulerError::EmptyCommand { setting: "command" });
    };

    debug!(command = %command_line, "running scheduler command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SchedulerError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(command = %command_line, ?timeout, "scheduler command timed out, killed");
                    return Err(SchedulerError::Timeout {
                        command: command_line,
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(SchedulerError::Spawn {
                    command: command_line,
                    source,
                });
            }
        }
    };

    let stdout = collect(stdout_reader);
    let stderr = collect(stderr_reader);

    if !status.success() {
        return Err(SchedulerError::NonZeroExit {
            command: command_line,
            code: status.code(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Parse `squeue --long` output into a snapshot.
///
/// The first two lines are skipped. Rows with fewer than nine columns or an
/// unusable job id are logged and dropped; the rest of the listing still counts.
pub fn parse_squeue_output(output: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for (idx, line) in output.lines().enumerate().skip(HEADER_LINES) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            info!(
                line_no = idx + 1,
                fields = fields.len(),
                line = %line,
                "skipping scheduler line with too few fields"
            );
            continue;
        }
        let id = match JobId::new(fields[COL_ID]) {
            Ok(id) => id,
            Err(e) => {
                info!(line_no = idx + 1, error = %e, "skipping scheduler line with bad job id");
                continue;
            }
        };
        let state = JobState::parse(fields[COL_STATE]);
        let reason = fields[COL_REASON..].join(" ");
        if let Some(message) = state.bad_state_message() {
            warn!(job_id = %id, state = %state, reason = %reason, "job in bad state: {message}");
        }
        snapshot.insert(id.clone(), JobRecord { id, state, reason });
    }
    snapshot
}

/// Extract `WorkDir=<path>` from `scontrol --oneliner show jobid` output.
pub fn parse_work_dir(output: &str) -> Option<PathBuf> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_prefix("WorkDir="))
        .filter(|dir| !dir.is_empty() && *dir != "(null)")
        .map(PathBuf::from)
}
