// crates/core/src/config.rs
//! Application configuration, loaded once from TOML at startup and passed by
//! reference into the reconciliation loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Poll interval used when the configured one is absent or not positive.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub job_manager: JobManagerSettings,
    #[serde(default)]
    pub github: GithubSettings,
    #[serde(default)]
    pub new_job_comments: NewJobComments,
    #[serde(default)]
    pub running_job_comments: RunningJobComments,
    #[serde(default)]
    pub finished_job_comments: FinishedJobComments,
}

/// `[job_manager]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManagerSettings {
    /// Registry root holding the `submitted/` and `finished/` buckets.
    pub job_ids_dir: Option<PathBuf>,
    /// Listing command, e.g. `squeue`. Extra arguments are allowed.
    pub poll_command: Option<String>,
    /// Control command used for introspection and release, e.g. `scontrol`.
    pub scontrol_command: Option<String>,
    /// Seconds between iterations.
    pub poll_interval: Option<i64>,
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
    /// Scheduler user whose jobs are listed. Falls back to `$USER`.
    pub user: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl Default for JobManagerSettings {
    fn default() -> Self {
        Self {
            job_ids_dir: None,
            poll_command: None,
            scontrol_command: None,
            poll_interval: None,
            command_timeout: default_command_timeout(),
            user: None,
            log_path: None,
        }
    }
}

fn default_command_timeout() -> u64 {
    120
}

/// `[github]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubSettings {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub app_id: Option<u64>,
    pub installation_id: Option<u64>,
    /// Path to the App's PEM private key.
    pub private_key: Option<PathBuf>,
}

impl GithubSettings {
    /// True when any of the App credential fields is set.
    pub fn has_app_credentials(&self) -> bool {
        self.app_id.is_some() || self.installation_id.is_some() || self.private_key.is_some()
    }
}

/// Comment text with `{name}` placeholders substituted at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replace each `{name}` with its value. Unknown placeholders stay as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.0.clone();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

/// `[new_job_comments]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobComments {
    #[serde(default = "default_awaits_release")]
    pub awaits_release: Template,
    #[serde(default = "default_release_failed")]
    pub release_failed: Template,
}

impl Default for NewJobComments {
    fn default() -> Self {
        Self {
            awaits_release: default_awaits_release(),
            release_failed: default_release_failed(),
        }
    }
}

fn default_awaits_release() -> Template {
    Template::new("job awaits launch by Slurm scheduler")
}

fn default_release_failed() -> Template {
    Template::new("releasing job failed: {error}")
}

/// `[running_job_comments]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningJobComments {
    #[serde(default = "default_running_job")]
    pub running_job: Template,
}

impl Default for RunningJobComments {
    fn default() -> Self {
        Self {
            running_job: default_running_job(),
        }
    }
}

fn default_running_job() -> Template {
    Template::new("job `{job_id}` is running")
}

/// `[finished_job_comments]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedJobComments {
    #[serde(default = "default_job_result_unknown_fmt")]
    pub job_result_unknown_fmt: Template,
    #[serde(default = "default_job_test_unknown_fmt")]
    pub job_test_unknown_fmt: Template,
}

impl Default for FinishedJobComments {
    fn default() -> Self {
        Self {
            job_result_unknown_fmt: default_job_result_unknown_fmt(),
            job_test_unknown_fmt: default_job_test_unknown_fmt(),
        }
    }
}

fn default_job_result_unknown_fmt() -> Template {
    Template::new(
        "<details><summary>:shrug: UNKNOWN _(click triangle for details)_</summary><ul>\
         <li>Job results file `{filename}` does not exist in job directory, or parsing it failed.</li>\
         <li>No artefacts were found/reported.</li></ul></details>",
    )
}

fn default_job_test_unknown_fmt() -> Template {
    Template::new(
        "<details><summary>:shrug: UNKNOWN _(click triangle for details)_</summary><ul>\
         <li>Job test file `{filename}` does not exist in job directory, or parsing it failed.</li>\
         </ul></details>",
    )
}

/// Settings the loop cannot run without, resolved and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub job_ids_dir: PathBuf,
    pub poll_command: String,
    pub scontrol_command: String,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_toml_str(&text, path)
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate_github()?;
        Ok(config)
    }

    /// Poll interval with non-positive or absent values mapped to the default.
    pub fn poll_interval(&self) -> Duration {
        match self.job_manager.poll_interval {
            Some(secs) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            _ => DEFAULT_POLL_INTERVAL,
        }
    }

    /// Check and resolve the settings required to run at least one iteration.
    pub fn runtime(&self) -> Result<RuntimeSettings, ConfigError> {
        let jm = &self.job_manager;
        let job_ids_dir = jm.job_ids_dir.clone().ok_or(ConfigError::Missing {
            section: "job_manager",
            key: "job_ids_dir",
        })?;
        let poll_command = required_command(&jm.poll_command, "poll_command")?;
        let scontrol_command = required_command(&jm.scontrol_command, "scontrol_command")?;
        if jm.command_timeout == 0 {
            return Err(ConfigError::Invalid {
                section: "job_manager",
                key: "command_timeout",
                message: "must be at least 1 second".into(),
            });
        }
        Ok(RuntimeSettings {
            job_ids_dir,
            poll_command,
            scontrol_command,
            poll_interval: self.poll_interval(),
            command_timeout: Duration::from_secs(jm.command_timeout),
        })
    }

    fn validate_github(&self) -> Result<(), ConfigError> {
        let gh = &self.github;
        if !gh.has_app_credentials() {
            return Ok(());
        }
        if gh.app_id.is_none() {
            return Err(ConfigError::Missing {
                section: "github",
                key: "app_id",
            });
        }
        if gh.installation_id.is_none() {
            return Err(ConfigError::Missing {
                section: "github",
                key: "installation_id",
            });
        }
        if gh.private_key.is_none() {
            return Err(ConfigError::Missing {
                section: "github",
                key: "private_key",
            });
        }
        Ok(())
    }
}

fn required_command(value: &Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(cmd) if !cmd.is_empty() => Ok(cmd.to_string()),
        Some(_) => Err(ConfigError::Invalid {
            section: "job_manager",
            key,
            message: "command must not be empty".into(),
        }),
        None => Err(ConfigError::Missing {
            section: "job_manager",
            key,
        }),
    }
}
