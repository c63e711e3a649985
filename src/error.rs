use std::path::PathBuf;
use thiserror::Error;

use crate::engine::RunReport;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Load error: {path:?} - {message}")]
    LoadError {
        path: PathBuf,
        message: String,
    },

    #[error("Processing error: [{item}] - {message}")]
    ProcessingError {
        item: String,
        message: String,
    },

    #[error("Write error: {path:?} - {message}")]
    WriteError {
        path: PathBuf,
        message: String,
    },

    #[error("Timeout error: {operation} exceeded {millis} ms")]
    TimeoutError {
        operation: String,
        millis: u64,
    },

    #[error("Dispatch error: {0}")]
    DispatchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("{failed} of {total} items failed")]
    ItemsFailed {
        failed: usize,
        total: usize,
        report: Box<RunReport>,
    },

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl RunnerError {
    /// Name of the phase that produced this error.
    pub fn phase(&self) -> &'static str {
        match self {
            RunnerError::LoadError { .. } => "load",
            RunnerError::ProcessingError { .. } => "process",
            RunnerError::WriteError { .. } => "write",
            RunnerError::TimeoutError { .. } => "timeout",
            RunnerError::DispatchError(_) | RunnerError::ItemsFailed { .. } => "dispatch",
            RunnerError::ConfigError(_) => "config",
            RunnerError::InvalidState(_) => "state",
            RunnerError::SerializationError(_) => "serialize",
            RunnerError::UnexpectedError(_) => "unexpected",
        }
    }

    /// The run report attached to a partially failed run, if any.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunnerError::ItemsFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for RunnerError {
    fn from(error: anyhow::Error) -> Self {
        RunnerError::UnexpectedError(error.to_string())
    }
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
