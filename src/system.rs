//! Everything that reaches outside the filesystem: external commands, the
//! update service, and the desktop shell process.

use std::ffi::OsStr;
use std::fmt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::{debug, info, warn};

use crate::error::{CleanError, Result};

/// vssadmin's exit status for "No items found that satisfy the query".
const VSSADMIN_NOTHING_TO_DELETE: i32 = 1;

/// A program plus arguments, kept as data so it can be logged and asserted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Non-zero exit statuses that still count as success.
    pub accepted_codes: Vec<i32>,
    /// Pass `args` to the command line as written, without Windows quoting.
    /// Needed by programs such as wmic that parse their raw command line.
    pub verbatim: bool,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            accepted_codes: Vec::new(),
            verbatim: false,
        }
    }

    pub fn accepting(mut self, codes: &[i32]) -> Self {
        self.accepted_codes.extend_from_slice(codes);
        self
    }

    pub fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    /// Whether an exit status means the command did its job.
    pub fn succeeded_with(&self, code: Option<i32>) -> bool {
        match code {
            Some(0) => true,
            Some(code) => self.accepted_codes.contains(&code),
            None => false,
        }
    }

    pub fn flush_dns() -> Self {
        Self::new("ipconfig", &["/flushdns"])
    }

    pub fn delete_shadow_copies(drive: char) -> Self {
        let target = format!("/for={drive}:");
        Self::new("vssadmin", &["delete", "shadows", &target, "/all", "/quiet"])
            .accepting(&[VSSADMIN_NOTHING_TO_DELETE])
    }

    pub fn disable_hibernation() -> Self {
        Self::new("powercfg", &["-h", "off"])
    }

    pub fn delete_pagefile(drive: char) -> Self {
        let filter = format!("name=\"{drive}:\\\\pagefile.sys\"");
        Self::new("wmic", &["pagefileset", "where", &filter, "delete"]).verbatim()
    }

    pub fn disk_cleanup(profile: u32) -> Self {
        let sagerun = format!("/sagerun:{profile}");
        Self::new("cleanmgr", &[&sagerun])
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Side effects the cleaning tasks need beyond plain file deletion.
///
/// `run` and `launch` surface failures; the service and shell helpers never
/// do, matching how the pipeline treats them as best-effort.
pub trait SystemOps: Send + Sync {
    /// Run a command and wait for it. A non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Start a command without waiting for it to finish.
    fn launch(&self, invocation: &Invocation) -> Result<()>;

    /// Stop a service, waiting up to `timeout`. Returns whether it reached `STOPPED`.
    fn stop_service(&self, name: &str, timeout: Duration) -> bool;

    /// Start a service, waiting up to `timeout`. Returns whether it reached `RUNNING`.
    fn start_service(&self, name: &str, timeout: Duration) -> bool;

    /// Kill every instance of the desktop shell process.
    fn stop_shell(&self, process_name: &str);

    /// Relaunch the desktop shell process.
    fn start_shell(&self, process_name: &str);
}

/// The real machine.
#[derive(Debug, Default)]
pub struct HostSystem;

const SERVICE_POLL: Duration = Duration::from_millis(250);

impl HostSystem {
    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            if invocation.verbatim {
                for arg in &invocation.args {
                    cmd.raw_arg(arg);
                }
            } else {
                cmd.args(&invocation.args);
            }
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(not(windows))]
        cmd.args(&invocation.args);
        cmd
    }

    fn service_state(name: &str) -> Option<String> {
        let output = Command::new("sc").args(["query", name]).output().ok()?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines()
            .find(|line| line.trim_start().starts_with("STATE"))
            .map(str::to_string)
    }

    fn control_service(&self, verb: &str, name: &str, target: &str, timeout: Duration) -> bool {
        if Self::service_state(name).is_some_and(|s| s.contains(target)) {
            debug!(service = name, state = target, "service already in target state");
            return true;
        }

        if let Err(e) = self.run(&Invocation::new("sc", &[verb, name])) {
            warn!(service = name, error = %e, "service control failed");
            return false;
        }

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if Self::service_state(name).is_some_and(|s| s.contains(target)) {
                return true;
            }
            thread::sleep(SERVICE_POLL);
        }
        warn!(service = name, state = target, ?timeout, "service did not reach state in time");
        false
    }
}

impl SystemOps for HostSystem {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        debug!(command = %invocation, "running");
        let status = Self::command(invocation)
            .status()
            .map_err(|source| CleanError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        if invocation.succeeded_with(status.code()) {
            if !status.success() {
                debug!(command = %invocation, code = ?status.code(), "accepted exit status");
            }
            Ok(())
        } else {
            Err(CleanError::CommandFailed {
                program: invocation.program.clone(),
                code: status.code().unwrap_or(-1),
            })
        }
    }

    fn launch(&self, invocation: &Invocation) -> Result<()> {
        debug!(command = %invocation, "launching");
        Self::command(invocation)
            .spawn()
            .map(drop)
            .map_err(|source| CleanError::Spawn {
                program: invocation.program.clone(),
                source,
            })
    }

    fn stop_service(&self, name: &str, timeout: Duration) -> bool {
        self.control_service("stop", name, "STOPPED", timeout)
    }

    fn start_service(&self, name: &str, timeout: Duration) -> bool {
        self.control_service("start", name, "RUNNING", timeout)
    }

    fn stop_shell(&self, process_name: &str) {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()),
        );
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let mut killed = 0usize;
        for process in sys.processes_by_exact_name(OsStr::new(process_name)) {
            if process.kill() {
                process.wait();
                killed += 1;
            }
        }
        info!(process = process_name, killed, "desktop shell stopped");
    }

    fn start_shell(&self, process_name: &str) {
        match Command::new(process_name).spawn() {
            Ok(_) => info!(process = process_name, "desktop shell restarted"),
            Err(e) => warn!(process = process_name, error = %e, "could not restart desktop shell"),
        }
    }
}
