use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::utils;

/// Number of steps in a full run.
pub const TOTAL_STEPS: usize = 18;

/// Severity of a user-facing log line, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn glyph(self) -> &'static str {
        match self {
            LogLevel::Info => "\u{2022}",
            LogLevel::Success => "\u{2713}",
            LogLevel::Warning => "\u{26A0}",
            LogLevel::Error => "\u{2717}",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One line of the run log. Never changed after it is created.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn now(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
            level,
        }
    }

    pub fn formatted_time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// The presentation layer, as seen by the orchestrator.
///
/// Implementations must not block indefinitely in `report_progress` or
/// `log_message`. `confirm` may block until the user answers; if no answer
/// can be obtained it must return `false`.
pub trait Reporter: Send + Sync {
    /// Called once before each step starts (or is skipped).
    fn report_progress(&self, step: usize, status: &str);

    /// Append a line to the user-visible log.
    fn log_message(&self, message: &str, level: LogLevel);

    /// Ask a yes/no question.
    fn confirm(&self, title: &str, message: &str) -> bool;

    /// Called once after each step with what it did.
    fn step_finished(&self, _outcome: &TaskOutcome) {}
}

/// Running totals for a run. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub files_deleted: u64,
    pub bytes_freed: u64,
}

impl Counters {
    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes_freed = self.bytes_freed.saturating_add(bytes);
    }

    pub fn add_files(&mut self, files: u64) {
        self.files_deleted = self.files_deleted.saturating_add(files);
    }

    /// What `self` gained since `earlier`.
    pub fn since(&self, earlier: &Counters) -> Counters {
        Counters {
            files_deleted: self.files_deleted - earlier.files_deleted,
            bytes_freed: self.bytes_freed - earlier.bytes_freed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Skipped,
    Failed,
}

/// What one step contributed, plus the totals right after it.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub step: usize,
    pub name: &'static str,
    pub status: TaskStatus,
    pub gained: Counters,
    pub totals: Counters,
}

/// Totals published once a run completes.
#[derive(Debug, Clone, Default)]
pub struct CleaningSummary {
    pub total_files_deleted: u64,
    pub total_bytes_freed: u64,
    pub time_taken: Duration,
}

impl CleaningSummary {
    pub fn space_freed(&self) -> String {
        utils::format_gb(self.total_bytes_freed)
    }

    pub fn time_taken_formatted(&self) -> String {
        utils::format_elapsed(self.time_taken)
    }
}

/// Live view of a run: where it is, what it said, what each step did.
#[derive(Debug, Clone)]
pub struct RunState {
    pub current_step: usize,
    pub status: String,
    pub in_progress: bool,
    pub log: Vec<LogEntry>,
    pub outcomes: Vec<TaskOutcome>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            current_step: 0,
            status: "Ready to clean".to_string(),
            in_progress: false,
            log: Vec::new(),
            outcomes: Vec::new(),
        }
    }
}

impl RunState {
    /// Reset for a fresh run.
    pub fn begin(&mut self) {
        *self = Self {
            in_progress: true,
            status: "Starting...".to_string(),
            ..Self::default()
        };
    }

    pub fn advance(&mut self, step: usize, status: &str) {
        self.current_step = step.min(TOTAL_STEPS);
        self.status = status.to_string();
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub fn finish(&mut self, status: &str) {
        self.in_progress = false;
        self.status = status.to_string();
    }

    /// Percent complete, `step / 18 * 100`.
    pub fn progress(&self) -> f64 {
        progress_percent(self.current_step)
    }
}

pub fn progress_percent(step: usize) -> f64 {
    step as f64 / TOTAL_STEPS as f64 * 100.0
}
