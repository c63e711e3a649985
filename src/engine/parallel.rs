// src/engine/parallel.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, debug, warn, error, Instrument, Span};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{RunnerResult, RunnerError};
use super::sink::OutputSink;
use super::task::{ItemFailure, Processor, ResultItem, RunReport, RunnerState, TaskList, WorkItem};

/// Runs a processor over every row of an input file with a bounded pool of
/// workers, appending each result to an output file as it completes.
pub struct TaskRunner {
    input: PathBuf,
    tasks: Arc<TaskList>,
    sink: Arc<OutputSink>,
    processor: Arc<dyn Processor>,
    config: RunnerConfig,
    state: Mutex<RunnerState>,
}

struct ItemOutcome {
    index: usize,
    result: RunnerResult<ResultItem>,
}

impl TaskRunner {
    /// Create a runner, eagerly loading every row of `input`
    pub fn new<P: Processor>(
        input: impl AsRef<Path>,
        output: impl Into<PathBuf>,
        processor: P,
        config: RunnerConfig,
    ) -> RunnerResult<Self> {
        config.validate()?;

        let input = input.as_ref().to_path_buf();
        let tasks = TaskList::load(&input)?;

        Ok(Self {
            input,
            tasks: Arc::new(tasks),
            sink: Arc::new(OutputSink::new(output)),
            processor: Arc::new(processor),
            config,
            state: Mutex::new(RunnerState::Constructed),
        })
    }

    /// Create a runner with four workers and the default batch timeout
    pub fn with_defaults<P: Processor>(
        input: impl AsRef<Path>,
        output: impl Into<PathBuf>,
        processor: P,
    ) -> RunnerResult<Self> {
        Self::new(input, output, processor, RunnerConfig::default())
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn output(&self) -> &Path {
        self.sink.path()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock()
    }

    /// Process a single item and record its result in the output file
    pub fn process_and_record(&self, item: &WorkItem) -> RunnerResult<ResultItem> {
        Self::process_item(self.processor.as_ref(), &self.sink, item)
    }

    fn process_item(processor: &dyn Processor, sink: &OutputSink, item: &WorkItem) -> RunnerResult<ResultItem> {
        info!("Processing item: {}", item.join(","));

        let result = processor.process(item)
            .map_err(|e| RunnerError::ProcessingError {
                item: item.join(","),
                message: format!("{:#}", e),
            })?;

        sink.append(&result)?;
        Ok(result)
    }

    /// Process every item and wait for the pool to drain.
    ///
    /// Item failures do not stop the rest of the batch; they are collected
    /// and returned as `ItemsFailed` once every item has been attempted.
    /// A runner can only be run once.
    pub async fn run(&self) -> RunnerResult<RunReport> {
        {
            let mut state = self.state.lock();
            if *state != RunnerState::Constructed {
                return Err(RunnerError::InvalidState(format!("Runner already {:?}", *state)));
            }
            *state = RunnerState::Running;
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);

        let outcome = self.dispatch(run_id).instrument(span).await;

        *self.state.lock() = match &outcome {
            Ok(_) => RunnerState::Drained,
            Err(_) => RunnerState::Failed,
        };

        outcome
    }

    async fn dispatch(&self, run_id: Uuid) -> RunnerResult<RunReport> {
        let started_at = Utc::now();
        let max_workers = self.config.max_workers;
        let total = self.tasks.len();

        info!("Starting parallel processing of {} tasks ({} in parallel)", total, max_workers);

        let semaphore = Arc::new(Semaphore::new(max_workers));
        let mut workers = JoinSet::new();

        for index in 0..total {
            let semaphore = semaphore.clone();
            let tasks = self.tasks.clone();
            let sink = self.sink.clone();
            let processor = self.processor.clone();
            let span = Span::current();

            workers.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return ItemOutcome {
                            index,
                            result: Err(RunnerError::DispatchError(format!("Worker pool closed: {}", e))),
                        };
                    }
                };

                // The permit travels with the blocking call so a slot is only
                // freed once the processor has really returned.
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _entered = span.enter();
                    match tasks.get(index) {
                        Some(item) => Self::process_item(processor.as_ref(), &sink, item),
                        None => Err(RunnerError::DispatchError(format!("No task at index {}", index))),
                    }
                });

                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(RunnerError::ProcessingError {
                        item: format!("#{}", index),
                        message: format!("Worker panicked: {}", e),
                    }),
                };

                ItemOutcome { index, result }
            });
        }

        let mut succeeded = 0;
        let mut failures = Vec::new();

        let drain = async {
            while let Some(joined) = workers.join_next().await {
                let outcome = joined
                    .map_err(|e| RunnerError::DispatchError(format!("Worker task failed: {}", e)))?;

                match outcome.result {
                    Ok(_) => succeeded += 1,
                    Err(e) => {
                        error!("Task {} failed: {}", outcome.index, e);
                        failures.push(ItemFailure {
                            index: outcome.index,
                            item: self.tasks.get(outcome.index).cloned().unwrap_or_default(),
                            phase: e.phase().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            Ok::<(), RunnerError>(())
        };

        match self.config.batch_timeout() {
            Some(budget) => match tokio::time::timeout(budget, drain).await {
                Ok(drained) => drained?,
                Err(_) => {
                    // Dropping the set cancels items still waiting for a
                    // worker; running ones finish on the blocking pool.
                    warn!("Batch did not drain within {:?}, abandoning remaining tasks", budget);
                    return Err(RunnerError::TimeoutError {
                        operation: format!("processing {} tasks", total),
                        millis: self.config.batch_timeout_ms,
                    });
                }
            },
            None => drain.await?,
        }

        failures.sort_by_key(|f| f.index);

        let report = RunReport {
            run_id,
            input: self.input.clone(),
            output: self.sink.path().to_path_buf(),
            max_workers,
            total,
            succeeded,
            failures,
            started_at,
            finished_at: Utc::now(),
        };

        if report.is_success() {
            info!("Completed all {} tasks successfully", total);
            Ok(report)
        } else {
            warn!("{} of {} tasks failed", report.failures.len(), total);
            debug!("Failed task indices: {:?}", report.failures.iter().map(|f| f.index).collect::<Vec<_>>());
            Err(RunnerError::ItemsFailed {
                failed: report.failures.len(),
                total,
                report: Box::new(report),
            })
        }
    }
}
