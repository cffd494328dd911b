use std::path::PathBuf;

use thiserror::Error;

/// Failures a cleaning task or a whole run can report.
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}")]
    CommandFailed { program: String, code: i32 },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("run aborted: {0}")]
    RunAborted(String),
}

pub type Result<T> = std::result::Result<T, CleanError>;
