//! Runs the catalog start to finish.
//!
//! Steps run strictly one after another. A failing step is logged and the
//! run moves on; a panic anywhere in the pipeline ends the run early. Either
//! way the desktop shell stopped at the start is restarted on the way out.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::cleaner::{
    CleaningSummary, Counters, LogEntry, LogLevel, Reporter, RunState, TaskOutcome, TaskStatus,
};
use crate::config::{Config, Locations};
use crate::error::{CleanError, Result};
use crate::system::SystemOps;
use crate::tasks::{self, TaskContext, TaskSpec};

/// Record a log line in the run state and hand it to the reporter.
pub(crate) fn emit(state: &mut RunState, reporter: &dyn Reporter, message: &str, level: LogLevel) {
    match level {
        LogLevel::Error => error!(target: "deepclean::run", "{message}"),
        LogLevel::Warning => warn!(target: "deepclean::run", "{message}"),
        LogLevel::Info | LogLevel::Success => info!(target: "deepclean::run", "{message}"),
    }
    state.push_log(LogEntry::now(message, level));
    reporter.log_message(message, level);
}

fn advance(state: &mut RunState, reporter: &dyn Reporter, step: usize, status: &str) {
    state.advance(step, status);
    reporter.report_progress(step, status);
}

/// Keeps the desktop shell down for as long as it lives.
struct ShellGuard<'a> {
    system: &'a dyn SystemOps,
    process: &'a str,
}

impl<'a> ShellGuard<'a> {
    fn acquire(system: &'a dyn SystemOps, process: &'a str) -> Self {
        system.stop_shell(process);
        Self { system, process }
    }
}

impl Drop for ShellGuard<'_> {
    fn drop(&mut self) {
        self.system.start_shell(self.process);
    }
}

pub struct Orchestrator<S: SystemOps> {
    config: Config,
    locations: Locations,
    system: S,
    tasks: Vec<TaskSpec>,
    state: RunState,
    counters: Counters,
}

impl<S: SystemOps> Orchestrator<S> {
    pub fn new(config: Config, locations: Locations, system: S) -> Self {
        Self {
            config,
            locations,
            system,
            tasks: tasks::catalog(),
            state: RunState::default(),
            counters: Counters::default(),
        }
    }

    /// Replace the step list. Used to run a subset or a custom pipeline.
    pub fn with_tasks(mut self, tasks: Vec<TaskSpec>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Execute every step in order and publish the summary.
    ///
    /// Returns `Err(CleanError::RunAborted)` only when something escaped
    /// step-level handling; the shell is restarted in both cases.
    pub fn run(&mut self, reporter: &dyn Reporter) -> Result<CleaningSummary> {
        let Self {
            ref config,
            ref locations,
            ref system,
            ref tasks,
            ref mut state,
            ref mut counters,
        } = *self;

        state.begin();
        *counters = Counters::default();
        let started = Instant::now();
        info!(steps = tasks.len(), "cleaning run started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            emit(state, reporter, "Starting deep clean...", LogLevel::Info);
            emit(state, reporter, "Stopping desktop shell...", LogLevel::Info);
            // Restarts the shell on unwind as well.
            let shell = ShellGuard::acquire(system, &config.shell_process);

            for task in tasks {
                let before = *counters;
                let status = run_step(task, config, locations, system, reporter, state, counters);
                let outcome = TaskOutcome {
                    step: task.step,
                    name: task.name,
                    status,
                    gained: counters.since(&before),
                    totals: *counters,
                };
                reporter.step_finished(&outcome);
                state.outcomes.push(outcome);
            }

            emit(state, reporter, "Restarting desktop shell...", LogLevel::Info);
            drop(shell);

            let summary = CleaningSummary {
                total_files_deleted: counters.files_deleted,
                total_bytes_freed: counters.bytes_freed,
                time_taken: started.elapsed(),
            };
            state.finish("Cleaning Completed!");
            emit(
                state,
                reporter,
                &format!(
                    "COMPLETE! Freed {}, took {}",
                    summary.space_freed(),
                    summary.time_taken_formatted()
                ),
                LogLevel::Success,
            );
            summary
        }));

        match outcome {
            Ok(summary) => {
                info!(
                    files = summary.total_files_deleted,
                    bytes = summary.total_bytes_freed,
                    elapsed = ?summary.time_taken,
                    "cleaning run finished"
                );
                Ok(summary)
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                state.finish("Cleaning failed");
                let line = format!("Error: {reason}");
                if panic::catch_unwind(AssertUnwindSafe(|| {
                    emit(state, reporter, &line, LogLevel::Error)
                }))
                .is_err()
                {
                    error!(reason = %reason, "reporter failed while logging run failure");
                }
                Err(CleanError::RunAborted(reason))
            }
        }
    }
}

fn run_step(
    task: &TaskSpec,
    config: &Config,
    locations: &Locations,
    system: &dyn SystemOps,
    reporter: &dyn Reporter,
    state: &mut RunState,
    counters: &mut Counters,
) -> TaskStatus {
    if let Some(gate) = task.confirmation {
        if !reporter.confirm(gate.title, gate.message) {
            advance(state, reporter, task.step, &format!("{} skipped", task.name));
            emit(
                state,
                reporter,
                &format!("{} skipped by user", task.name),
                LogLevel::Warning,
            );
            return TaskStatus::Skipped;
        }
    }

    advance(state, reporter, task.step, task.status);
    info!(step = task.step, task = task.name, "step started");

    let mut ctx = TaskContext {
        config,
        locations,
        system,
        counters,
        reporter,
        state,
    };
    match (task.run)(&mut ctx) {
        Ok(()) => TaskStatus::Completed,
        Err(e) => {
            // Gated steps change system state, so their failures are louder.
            let level = if task.requires_confirmation() {
                LogLevel::Error
            } else {
                LogLevel::Warning
            };
            ctx.log(&format!("{}: {e}", task.name), level);
            TaskStatus::Failed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::TOTAL_STEPS;
    use crate::system::Invocation;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockSystem {
        calls: Mutex<Vec<String>>,
        exit_codes: Vec<(&'static str, i32)>,
        /// Directory whose entry count is sampled at each service call.
        watched: Option<PathBuf>,
        watched_entries: Mutex<Vec<(String, usize)>>,
    }

    impl MockSystem {
        fn failing(programs: &[&'static str]) -> Self {
            Self {
                exit_codes: programs.iter().map(|p| (*p, 5)).collect(),
                ..Self::default()
            }
        }

        fn exiting(program: &'static str, code: i32) -> Self {
            Self {
                exit_codes: vec![(program, code)],
                ..Self::default()
            }
        }

        fn watching(dir: PathBuf) -> Self {
            Self {
                watched: Some(dir),
                ..Self::default()
            }
        }

        fn sample(&self, call: &str) {
            if let Some(dir) = &self.watched {
                let entries = std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0);
                self.watched_entries
                    .lock()
                    .unwrap()
                    .push((call.to_string(), entries));
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn result_for(&self, invocation: &Invocation) -> Result<()> {
            let code = self
                .exit_codes
                .iter()
                .find(|(program, _)| *program == invocation.program)
                .map_or(0, |(_, code)| *code);
            if invocation.succeeded_with(Some(code)) {
                Ok(())
            } else {
                Err(CleanError::CommandFailed {
                    program: invocation.program.clone(),
                    code,
                })
            }
        }
    }

    impl SystemOps for MockSystem {
        fn run(&self, invocation: &Invocation) -> Result<()> {
            self.record(format!("run {invocation}"));
            self.result_for(invocation)
        }
        fn launch(&self, invocation: &Invocation) -> Result<()> {
            self.record(format!("launch {invocation}"));
            self.result_for(invocation)
        }
        fn stop_service(&self, name: &str, _timeout: Duration) -> bool {
            self.record(format!("stop-service {name}"));
            self.sample("stop");
            true
        }
        fn start_service(&self, name: &str, _timeout: Duration) -> bool {
            self.record(format!("start-service {name}"));
            self.sample("start");
            true
        }
        fn stop_shell(&self, process_name: &str) {
            self.record(format!("stop-shell {process_name}"));
        }
        fn start_shell(&self, process_name: &str) {
            self.record(format!("start-shell {process_name}"));
        }
    }

    struct Recorder {
        answer: bool,
        panic_on: Option<&'static str>,
        progress: Mutex<Vec<usize>>,
        logs: Mutex<Vec<(String, LogLevel)>>,
        prompts: Mutex<Vec<String>>,
        finished: Mutex<Vec<(usize, TaskStatus)>>,
    }

    impl Recorder {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                panic_on: None,
                progress: Mutex::new(Vec::new()),
                logs: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
            }
        }

        /// Panics when asked to log a line starting with `prefix`.
        fn panicking_on(prefix: &'static str) -> Self {
            Self {
                panic_on: Some(prefix),
                ..Self::answering(true)
            }
        }

        fn logs_at(&self, level: LogLevel) -> Vec<String> {
            self.logs
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, l)| *l == level)
                .map(|(m, _)| m.clone())
                .collect()
        }
    }

    impl Reporter for Recorder {
        fn report_progress(&self, step: usize, _status: &str) {
            self.progress.lock().unwrap().push(step);
        }
        fn log_message(&self, message: &str, level: LogLevel) {
            if let Some(prefix) = self.panic_on {
                if message.starts_with(prefix) {
                    panic!("display went away");
                }
            }
            self.logs.lock().unwrap().push((message.to_string(), level));
        }
        fn confirm(&self, title: &str, _message: &str) -> bool {
            self.prompts.lock().unwrap().push(title.to_string());
            self.answer
        }
        fn step_finished(&self, outcome: &TaskOutcome) {
            self.finished.lock().unwrap().push((outcome.step, outcome.status));
        }
    }

    fn config() -> Config {
        Config {
            service_settle_ms: 0,
            system_drive: 'C',
            ..Config::default()
        }
    }

    fn nowhere() -> Locations {
        under(&std::env::temp_dir().join("deepclean-orchestrator-test-absent"))
    }

    fn under(root: &Path) -> Locations {
        Locations::rooted(
            root.join("tmp"),
            &root.join("win"),
            &root.join("pd"),
            &root.join("local"),
            &root.join("roaming"),
            vec![root.join("C-bin")],
            root.join("Windows.old"),
        )
    }

    fn orchestrator(system: MockSystem) -> Orchestrator<MockSystem> {
        Orchestrator::new(config(), nowhere(), system)
    }

    #[test]
    fn accepted_run_reaches_the_last_step() {
        let mut orch = orchestrator(MockSystem::default());
        let reporter = Recorder::answering(true);

        let summary = orch.run(&reporter).unwrap();

        assert_eq!(summary.total_bytes_freed, 0);
        assert_eq!(orch.state().current_step, TOTAL_STEPS);
        assert_eq!(orch.state().progress(), 100.0);
        assert!(!orch.state().in_progress);
        assert_eq!(
            *reporter.progress.lock().unwrap(),
            (1..=TOTAL_STEPS).collect::<Vec<_>>()
        );
        assert_eq!(reporter.prompts.lock().unwrap().len(), 3);

        let calls = orch.system().calls();
        assert_eq!(calls.first().unwrap(), "stop-shell explorer.exe");
        assert_eq!(calls.last().unwrap(), "start-shell explorer.exe");
        assert!(calls.contains(&"run vssadmin delete shadows /for=C: /all /quiet".to_string()));
        assert!(calls.contains(&"run powercfg -h off".to_string()));
        assert!(calls.contains(&"launch cleanmgr /sagerun:1".to_string()));

        let success = reporter.logs_at(LogLevel::Success);
        assert!(success.last().unwrap().starts_with("COMPLETE! Freed 0.00 GB, took "));
    }

    #[test]
    fn update_service_brackets_the_cache_delete() {
        let root = tempfile::tempdir().unwrap();
        let locations = under(root.path());
        std::fs::create_dir_all(&locations.update_download).unwrap();
        for name in ["a.cab", "b.cab"] {
            std::fs::write(locations.update_download.join(name), vec![0u8; 1_000]).unwrap();
        }
        let system = MockSystem::watching(locations.update_download.clone());
        let mut orch = Orchestrator::new(config(), locations.clone(), system);

        orch.run(&Recorder::answering(false)).unwrap();

        let calls = orch.system().calls();
        let stop = calls.iter().position(|c| c == "stop-service wuauserv").unwrap();
        let start = calls.iter().position(|c| c == "start-service wuauserv").unwrap();
        assert!(stop < start);

        // Full while the service is stopped, empty by the time it starts again.
        assert_eq!(
            *orch.system().watched_entries.lock().unwrap(),
            vec![("stop".to_string(), 2), ("start".to_string(), 0)]
        );
        assert!(locations.update_download.is_dir());
        let step = &orch.state().outcomes[3];
        assert_eq!(step.name, "Update Cache");
        assert_eq!(step.gained.bytes_freed, 2_000);
    }

    #[test]
    fn declined_gates_skip_but_advance() {
        let mut orch = orchestrator(MockSystem::default());
        let reporter = Recorder::answering(false);

        orch.run(&reporter).unwrap();

        let calls = orch.system().calls();
        assert!(!calls.iter().any(|c| c.contains("vssadmin")
            || c.contains("powercfg")
            || c.contains("wmic")));
        assert_eq!(
            reporter.logs_at(LogLevel::Warning),
            vec![
                "Shadow Copies skipped by user",
                "Hibernation skipped by user",
                "Pagefile skipped by user",
            ]
        );
        let progress = reporter.progress.lock().unwrap().clone();
        assert!(progress.contains(&15) && progress.contains(&16) && progress.contains(&17));
        assert_eq!(orch.state().current_step, TOTAL_STEPS);

        let skipped: Vec<usize> = orch
            .state()
            .outcomes
            .iter()
            .filter(|o| o.status == TaskStatus::Skipped)
            .map(|o| o.step)
            .collect();
        assert_eq!(skipped, vec![15, 16, 17]);
    }

    #[test]
    fn failed_step_is_logged_and_run_continues() {
        let mut orch = orchestrator(MockSystem::failing(&["ipconfig", "powercfg"]));
        let reporter = Recorder::answering(true);

        orch.run(&reporter).unwrap();

        let warnings = reporter.logs_at(LogLevel::Warning);
        assert!(warnings.iter().any(|m| m.starts_with("DNS Cache: ipconfig exited")));
        let errors = reporter.logs_at(LogLevel::Error);
        assert!(errors.iter().any(|m| m.starts_with("Hibernation: powercfg exited")));
        assert_eq!(orch.state().current_step, TOTAL_STEPS);
        assert!(orch.system().calls().contains(&"launch cleanmgr /sagerun:1".to_string()));
    }

    #[test]
    fn panic_aborts_run_but_restarts_shell() {
        let mut tasks = tasks::catalog();
        tasks[2].run = |_| panic!("prefetch exploded");
        let mut orch = orchestrator(MockSystem::default()).with_tasks(tasks);
        let reporter = Recorder::answering(true);

        let err = orch.run(&reporter).unwrap_err();

        assert!(matches!(err, CleanError::RunAborted(ref m) if m == "prefetch exploded"));
        assert_eq!(
            reporter.logs_at(LogLevel::Error),
            vec!["Error: prefetch exploded"]
        );
        assert!(!orch.state().in_progress);
        assert_eq!(orch.state().current_step, 3);
        assert_eq!(orch.system().calls().last().unwrap(), "start-shell explorer.exe");
    }

    #[test]
    fn reporter_panic_before_first_step_aborts_cleanly() {
        let mut orch = orchestrator(MockSystem::default());
        let reporter = Recorder::panicking_on("Starting");

        let err = orch.run(&reporter).unwrap_err();

        assert!(matches!(err, CleanError::RunAborted(ref m) if m == "display went away"));
        assert!(!orch.state().in_progress);
        assert_eq!(orch.state().current_step, 0);
        assert_eq!(
            orch.state().log.last().map(|e| (e.message.as_str(), e.level)),
            Some(("Error: display went away", LogLevel::Error))
        );
        // The shell was never stopped, so it is not restarted either.
        assert!(orch.system().calls().is_empty());
    }

    #[test]
    fn reporter_panic_after_last_step_still_restarts_shell() {
        let mut orch = orchestrator(MockSystem::default());
        let reporter = Recorder::panicking_on("Restarting");

        let err = orch.run(&reporter).unwrap_err();

        assert!(matches!(err, CleanError::RunAborted(_)));
        assert!(!orch.state().in_progress);
        assert_eq!(orch.state().current_step, TOTAL_STEPS);
        assert_eq!(
            reporter.logs_at(LogLevel::Error),
            vec!["Error: display went away"]
        );
        let calls = orch.system().calls();
        assert_eq!(calls.first().unwrap(), "stop-shell explorer.exe");
        assert_eq!(calls.last().unwrap(), "start-shell explorer.exe");
    }

    #[test]
    fn reporter_hears_each_step_outcome() {
        let mut orch = orchestrator(MockSystem::failing(&["ipconfig"]));
        let reporter = Recorder::answering(false);

        orch.run(&reporter).unwrap();

        let finished = reporter.finished.lock().unwrap().clone();
        assert_eq!(finished.len(), TOTAL_STEPS);
        assert_eq!(finished[11], (12, TaskStatus::Failed));
        assert_eq!(finished[14], (15, TaskStatus::Skipped));
        assert_eq!(finished[17], (18, TaskStatus::Completed));
        let recorded: Vec<(usize, TaskStatus)> = orch
            .state()
            .outcomes
            .iter()
            .map(|o| (o.step, o.status))
            .collect();
        assert_eq!(finished, recorded);
    }

    #[test]
    fn no_shadow_copies_to_delete_still_succeeds() {
        let mut orch = orchestrator(MockSystem::exiting("vssadmin", 1));
        let reporter = Recorder::answering(true);

        orch.run(&reporter).unwrap();

        assert!(reporter
            .logs_at(LogLevel::Success)
            .contains(&"Shadow Copies deleted".to_string()));
        assert!(reporter.logs_at(LogLevel::Error).is_empty());
        assert_eq!(orch.state().outcomes[14].status, TaskStatus::Completed);
    }

    #[test]
    fn second_run_starts_from_scratch() {
        let mut orch = orchestrator(MockSystem::default());
        orch.run(&Recorder::answering(false)).unwrap();
        let first_log_len = orch.state().log.len();

        orch.run(&Recorder::answering(false)).unwrap();

        assert_eq!(orch.state().log.len(), first_log_len);
        assert_eq!(orch.state().outcomes.len(), TOTAL_STEPS);
    }

    #[test]
    fn custom_pipeline_runs_only_given_tasks() {
        let tasks: Vec<TaskSpec> = tasks::catalog().into_iter().filter(|t| t.step == 12).collect();
        let mut orch = orchestrator(MockSystem::default()).with_tasks(tasks);

        orch.run(&Recorder::answering(true)).unwrap();

        assert_eq!(orch.state().outcomes.len(), 1);
        assert_eq!(
            orch.system().calls(),
            vec![
                "stop-shell explorer.exe".to_string(),
                "run ipconfig /flushdns".to_string(),
                "start-shell explorer.exe".to_string(),
            ]
        );
    }
}
