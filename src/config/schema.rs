use serde::{Serialize, Deserialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Budget for the whole batch to drain. `0` disables it.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

/// Settings for the shell-command processor used by the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    #[serde(default = "default_program")]
    pub program: String,
}

fn default_max_workers() -> usize {
    4
}

fn default_batch_timeout_ms() -> u64 {
    40_000
}

fn default_program() -> String {
    "sh".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            batch_timeout_ms: default_batch_timeout_ms(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

impl RunnerConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        // 0 disables the timeout, so any requested budget is at least 1 ms
        self.batch_timeout_ms = timeout.map_or(0, |t| {
            u64::try_from(t.as_millis().max(1)).unwrap_or(u64::MAX)
        });
        self
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        match self.batch_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
