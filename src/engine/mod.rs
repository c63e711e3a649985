mod parallel;
mod sink;
mod task;

pub use parallel::TaskRunner;
pub use sink::OutputSink;
pub use task::{ItemFailure, Processor, ResultItem, RunReport, RunnerState, TaskList, WorkItem};
