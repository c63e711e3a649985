// src/utils/shell.rs
use std::process::Command;
use anyhow::{Result, Context};
use tracing::{debug, trace, warn};

use crate::engine::{Processor, ResultItem, WorkItem};

const ARG0: &str = "csvrunner";

/// Processor that runs a shell command once per item.
///
/// The item's fields are passed as positional parameters (`$1`, `$2`, ...)
/// and the first non-empty line of stdout is parsed as the result row.
#[derive(Debug, Clone)]
pub struct ShellProcessor {
    program: String,
    command: String,
}

impl ShellProcessor {
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_program("sh", command)
    }

    pub fn with_program(program: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Processor for ShellProcessor {
    fn process(&self, item: &WorkItem) -> Result<ResultItem> {
        debug!("Executing command: {} {:?}", self.command, item);

        let output = Command::new(&self.program)
            .arg("-c")
            .arg(&self.command)
            .arg(ARG0)
            .args(item)
            .output()
            .context(format!("Failed to execute command: {}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Command failed: {}\nStderr: {}", self.command, stderr);
            return Err(anyhow::anyhow!("Command exited with {}: {}", output.status, stderr.trim()));
        }
        trace!("Command succeeded: {}", self.command);

        let stdout = String::from_utf8(output.stdout)
            .context("Command output is not valid UTF-8")?;
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Command produced no output: {}", self.command))?;

        parse_row(line)
    }
}

fn parse_row(line: &str) -> Result<ResultItem> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let record = reader
        .records()
        .next()
        .context("Command output is not a CSV row")?
        .context("Failed to parse command output")?;

    Ok(record.iter().map(str::to_string).collect())
}
