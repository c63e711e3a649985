mod shell;

pub use shell::ShellProcessor;
