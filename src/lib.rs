pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod utils;

// Re-export main types for easier access
pub use config::{Config, RunnerConfig};
pub use engine::{
    ItemFailure,
    OutputSink,
    Processor,
    ResultItem,
    RunReport,
    RunnerState,
    TaskList,
    TaskRunner,
    WorkItem
};
pub use error::{RunnerError, RunnerResult};
pub use utils::ShellProcessor;
