// src/engine/sink.rs
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RunnerResult, RunnerError};
use super::task::ResultItem;

/// Append-only CSV output shared by every worker of one runner.
///
/// The lock belongs to the sink instance, so independent runners never
/// contend with each other.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, quoting fields only where needed.
    ///
    /// The file is opened, written and closed while the lock is held; the
    /// guard is released on every return path.
    pub fn append(&self, result: &ResultItem) -> RunnerResult<()> {
        let row = encode_row(result)?;

        let _guard = self.lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(format!("Failed to open file: {}", e)))?;

        file.write_all(&row)
            .and_then(|_| file.flush())
            .map_err(|e| self.write_error(format!("Failed to append row: {}", e)))?;

        debug!("Appended row to {}: {}", self.path.display(), result.join(","));
        Ok(())
    }

    fn write_error(&self, message: String) -> RunnerError {
        RunnerError::WriteError {
            path: self.path.clone(),
            message,
        }
    }
}

/// Serialize a row up front so it reaches the file in a single write
fn encode_row(result: &ResultItem) -> RunnerResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(result)
        .map_err(|e| RunnerError::SerializationError(format!("Failed to encode row: {}", e)))?;

    writer.into_inner()
        .map_err(|e| RunnerError::SerializationError(format!("Failed to encode row: {}", e.error())))
}
