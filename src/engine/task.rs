// src/engine/task.rs
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{info, debug};
use uuid::Uuid;

use crate::error::{RunnerResult, RunnerError};

/// One parsed input row
pub type WorkItem = Vec<String>;

/// One output row produced from a work item
pub type ResultItem = Vec<String>;

/// Per-item processing function.
///
/// Implementations are called concurrently from several worker threads and
/// must be safe to share. Closures of the right shape implement it directly.
pub trait Processor: Send + Sync + 'static {
    fn process(&self, item: &WorkItem) -> anyhow::Result<ResultItem>;
}

impl<F> Processor for F
where
    F: Fn(&WorkItem) -> anyhow::Result<ResultItem> + Send + Sync + 'static,
{
    fn process(&self, item: &WorkItem) -> anyhow::Result<ResultItem> {
        self(item)
    }
}

/// All work items of a run, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    items: Vec<WorkItem>,
}

impl TaskList {
    /// Load every row of a headerless comma-delimited file
    pub fn load(path: &Path) -> RunnerResult<Self> {
        debug!("Loading tasks from {}", path.display());

        let load_error = |message: String| RunnerError::LoadError {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| load_error(format!("Failed to open file: {}", e)))?;

        let mut items = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| load_error(format!("Failed to parse row {}: {}", line + 1, e)))?;
            items.push(record.iter().map(str::to_string).collect());
        }

        info!("Loaded {} tasks from {}", items.len(), path.display());
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }
}

/// Lifecycle of a runner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunnerState {
    Constructed,
    Running,
    Drained,
    Failed,
}

/// A single item that did not make it into the output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub index: usize,
    pub item: WorkItem,
    pub phase: String,
    pub error: String,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub input: PathBuf,
    pub output: PathBuf,
    pub max_workers: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Save the report as pretty JSON
    pub fn save(&self, path: &Path) -> RunnerResult<()> {
        debug!("Saving run report to {}", path.display());
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RunnerError::SerializationError(format!("Failed to serialize report: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RunnerError::WriteError {
                path: path.to_path_buf(),
                message: format!("Failed to write file: {}", e),
            })?;

        Ok(())
    }
}
