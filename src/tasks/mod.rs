//! The fixed, ordered catalog of cleaning steps.
//!
//! Each step is a plain record pointing at a handler function. The
//! orchestrator walks the list in order and applies the same
//! report/run/log wrapper to every entry.

mod caches;
mod patterns;
mod system_state;
mod temp;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cleaner::{Counters, LogLevel, Reporter, RunState};
use crate::config::{Config, Locations};
use crate::error::Result;
use crate::fs_ops;
use crate::orchestrator::emit;
use crate::system::SystemOps;
use crate::utils;

/// A fixed yes/no prompt shown before a gated step.
#[derive(Debug, Clone, Copy)]
pub struct Confirmation {
    pub title: &'static str,
    pub message: &'static str,
}

pub type Handler = fn(&mut TaskContext<'_>) -> Result<()>;
pub type Targets = fn(&Locations) -> Vec<PathBuf>;

/// One catalog entry. Built once, never mutated.
#[derive(Clone)]
pub struct TaskSpec {
    pub step: usize,
    pub name: &'static str,
    /// Status line reported when the step starts ("Cleaning Prefetch...").
    pub status: &'static str,
    pub description: &'static str,
    pub confirmation: Option<Confirmation>,
    pub run: Handler,
    pub targets: Targets,
}

impl TaskSpec {
    pub fn requires_confirmation(&self) -> bool {
        self.confirmation.is_some()
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("step", &self.step)
            .field("name", &self.name)
            .field("gated", &self.requires_confirmation())
            .finish()
    }
}

/// What a handler gets to work with while its step runs.
pub struct TaskContext<'a> {
    pub config: &'a Config,
    pub locations: &'a Locations,
    pub system: &'a dyn SystemOps,
    pub counters: &'a mut Counters,
    pub(crate) reporter: &'a dyn Reporter,
    pub(crate) state: &'a mut RunState,
}

impl TaskContext<'_> {
    pub fn log(&mut self, message: &str, level: LogLevel) {
        emit(self.state, self.reporter, message, level);
    }

    /// Empty `path` in place and credit what was freed.
    fn empty_in_place(&mut self, label: &str, path: &Path) {
        if !fs_ops::directory_exists(path) {
            debug!(path = %path.display(), "{label}: nothing to clean");
            return;
        }
        let freed = fs_ops::safe_empty_directory(path);
        self.counters.add_bytes(freed);
        self.log(
            &format!("{label} cleaned: {} MB freed", utils::whole_mb(freed)),
            LogLevel::Success,
        );
    }

    /// Delete each existing directory in `paths` outright. Returns the bytes credited.
    fn delete_each(&mut self, paths: &[PathBuf]) -> u64 {
        let mut freed = 0u64;
        for path in paths {
            if fs_ops::directory_exists(path) {
                freed += fs_ops::safe_delete_directory(path);
            } else {
                debug!(path = %path.display(), "not present");
            }
        }
        self.counters.add_bytes(freed);
        freed
    }
}

/// The 18 steps, in run order.
pub fn catalog() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            step: 1,
            name: "User Temp",
            status: "Cleaning User Temp...",
            description: "Empty the current user's temp folder",
            confirmation: None,
            run: temp::clean_user_temp,
            targets: |l| vec![l.user_temp.clone()],
        },
        TaskSpec {
            step: 2,
            name: "Windows Temp",
            status: "Cleaning Windows Temp...",
            description: "Empty the system-wide temp folder",
            confirmation: None,
            run: temp::clean_system_temp,
            targets: |l| vec![l.system_temp.clone()],
        },
        TaskSpec {
            step: 3,
            name: "Prefetch",
            status: "Cleaning Prefetch...",
            description: "Empty the application launch prefetch cache",
            confirmation: None,
            run: temp::clean_prefetch,
            targets: |l| vec![l.prefetch.clone()],
        },
        TaskSpec {
            step: 4,
            name: "Update Cache",
            status: "Cleaning Windows Update Cache...",
            description: "Stop the update service, empty its download cache, start it again",
            confirmation: None,
            run: temp::clean_update_cache,
            targets: |l| vec![l.update_download.clone()],
        },
        TaskSpec {
            step: 5,
            name: "Delivery Optimization",
            status: "Cleaning Delivery Optimization...",
            description: "Delete qmgr*.dat transfer queue files",
            confirmation: None,
            run: patterns::clean_delivery_optimization,
            targets: |l| vec![l.delivery_optimization.clone()],
        },
        TaskSpec {
            step: 6,
            name: "Error Reports",
            status: "Cleaning Error Reports...",
            description: "Empty the Windows Error Reporting store",
            confirmation: None,
            run: temp::clean_error_reports,
            targets: |l| vec![l.error_reports.clone()],
        },
        TaskSpec {
            step: 7,
            name: "Recycle Bin",
            status: "Emptying Recycle Bins...",
            description: "Delete the recycle bin on each configured drive",
            confirmation: None,
            run: caches::empty_recycle_bins,
            targets: |l| l.recycle_bins.clone(),
        },
        TaskSpec {
            step: 8,
            name: "Thumbnail Cache",
            status: "Cleaning Thumbnail Cache...",
            description: "Delete Explorer thumbcache* databases",
            confirmation: None,
            run: patterns::clean_thumbnail_cache,
            targets: |l| vec![l.thumbnail_cache.clone()],
        },
        TaskSpec {
            step: 9,
            name: "Log Files",
            status: "Cleaning Log Files...",
            description: "Delete *.log files under the common log folders",
            confirmation: None,
            run: patterns::clean_log_files,
            targets: |l| l.log_dirs.clone(),
        },
        TaskSpec {
            step: 10,
            name: "Internet Cache",
            status: "Cleaning Internet Cache...",
            description: "Delete the INetCache and WebCache folders",
            confirmation: None,
            run: caches::clean_internet_cache,
            targets: |l| l.internet_caches.clone(),
        },
        TaskSpec {
            step: 11,
            name: "Browser Caches",
            status: "Cleaning Browser Caches...",
            description: "Delete Chrome, Brave, Firefox and Opera cache folders",
            confirmation: None,
            run: caches::clean_browser_caches,
            targets: |l| l.browser_caches.clone(),
        },
        TaskSpec {
            step: 12,
            name: "DNS Cache",
            status: "Flushing DNS Cache...",
            description: "Flush the DNS resolver cache",
            confirmation: None,
            run: system_state::flush_dns,
            targets: |_| Vec::new(),
        },
        TaskSpec {
            step: 13,
            name: "Windows.old",
            status: "Cleaning Windows.old...",
            description: "Delete the previous Windows installation backup",
            confirmation: None,
            run: caches::clean_previous_install,
            targets: |l| vec![l.previous_install.clone()],
        },
        TaskSpec {
            step: 14,
            name: "Installer Cache",
            status: "Cleaning Installer Cache...",
            description: "Delete the installer patch cache",
            confirmation: None,
            run: caches::clean_installer_cache,
            targets: |l| vec![l.installer_patch_cache.clone()],
        },
        TaskSpec {
            step: 15,
            name: "Shadow Copies",
            status: "Deleting Shadow Copies...",
            description: "Delete all shadow copies and restore points",
            confirmation: Some(Confirmation {
                title: "Delete Shadow Copies/Restore Points?",
                message: "This will delete all system restore points.\n\
                          You won't be able to restore your system to a previous state.\n\n\
                          Continue?",
            }),
            run: system_state::delete_shadow_copies,
            targets: |_| Vec::new(),
        },
        TaskSpec {
            step: 16,
            name: "Hibernation",
            status: "Disabling Hibernation...",
            description: "Turn hibernation off, removing hiberfil.sys",
            confirmation: Some(Confirmation {
                title: "Disable Hibernation?",
                message: "This will disable hibernation and delete hiberfil.sys.\n\
                          You won't be able to use hibernate mode.\n\n\
                          Continue?",
            }),
            run: system_state::disable_hibernation,
            targets: |_| Vec::new(),
        },
        TaskSpec {
            step: 17,
            name: "Pagefile",
            status: "Resetting Pagefile...",
            description: "Delete the pagefile; it is recreated on next boot",
            confirmation: Some(Confirmation {
                title: "Reset Pagefile?",
                message: "This will delete and recreate the pagefile on next reboot.\n\
                          Your system may need to restart.\n\n\
                          Continue?",
            }),
            run: system_state::reset_pagefile,
            targets: |_| Vec::new(),
        },
        TaskSpec {
            step: 18,
            name: "Disk Cleanup",
            status: "Running Disk Cleanup...",
            description: "Launch the built-in Disk Cleanup with the saved profile",
            confirmation: None,
            run: system_state::run_disk_cleanup,
            targets: |_| Vec::new(),
        },
    ]
}
