//! Deep-clean engine: a fixed, ordered pipeline of disk-space reclamation
//! steps with per-step failure isolation and confirmation-gated system
//! resets.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod orchestrator;
pub mod system;
pub mod tasks;
pub mod utils;

pub use cleaner::{CleaningSummary, LogEntry, LogLevel, Reporter, RunState, TOTAL_STEPS};
pub use config::{Config, Locations};
pub use error::CleanError;
pub use orchestrator::Orchestrator;
pub use system::{HostSystem, Invocation, SystemOps};
