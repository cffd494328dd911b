use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CleanError, Result};

/// Tunables for a cleaning run. Every field has a default, so an empty (or
/// absent) config file yields the stock behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Drive letters probed for `X:\$Recycle.Bin`.
    pub recycle_drives: Vec<char>,
    /// Drive holding the OS install: shadow copies, pagefile, Windows.old.
    pub system_drive: char,
    pub update_service: String,
    pub service_timeout_secs: u64,
    pub service_settle_ms: u64,
    pub shell_process: String,
    pub cleanup_profile: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recycle_drives: vec!['C', 'D', 'E', 'F', 'G'],
            system_drive: system_drive_from_env(),
            update_service: "wuauserv".to_string(),
            service_timeout_secs: 30,
            service_settle_ms: 1_000,
            shell_process: "explorer.exe".to_string(),
            cleanup_profile: 1,
        }
    }
}

impl Config {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CleanError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|message| CleanError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        if !config.system_drive.is_ascii_alphabetic() {
            return Err(format!("system_drive '{}' is not a drive letter", config.system_drive));
        }
        if let Some(bad) = config.recycle_drives.iter().find(|d| !d.is_ascii_alphabetic()) {
            return Err(format!("recycle drive '{bad}' is not a drive letter"));
        }
        Ok(config)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn service_settle(&self) -> Duration {
        Duration::from_millis(self.service_settle_ms)
    }
}

fn system_drive_from_env() -> char {
    std::env::var("SystemDrive")
        .ok()
        .and_then(|s| s.chars().next())
        .filter(char::is_ascii_alphabetic)
        .map_or('C', |c| c.to_ascii_uppercase())
}

/// Every directory the catalog touches, resolved once before a run.
#[derive(Debug, Clone)]
pub struct Locations {
    pub user_temp: PathBuf,
    pub system_temp: PathBuf,
    pub prefetch: PathBuf,
    pub update_download: PathBuf,
    pub delivery_optimization: PathBuf,
    pub error_reports: PathBuf,
    pub recycle_bins: Vec<PathBuf>,
    pub thumbnail_cache: PathBuf,
    pub log_dirs: Vec<PathBuf>,
    pub internet_caches: Vec<PathBuf>,
    pub browser_caches: Vec<PathBuf>,
    pub previous_install: PathBuf,
    pub installer_patch_cache: PathBuf,
}

impl Locations {
    /// Resolve the standard Windows locations from the environment.
    pub fn from_env(config: &Config) -> Self {
        let drive_root = |d: char| PathBuf::from(format!("{d}:\\"));
        let system_root = drive_root(config.system_drive);
        let windir = env_path("WINDIR").unwrap_or_else(|| system_root.join("Windows"));
        let program_data = env_path("ProgramData").unwrap_or_else(|| system_root.join("ProgramData"));
        let local_app_data = dirs::data_local_dir()
            .or_else(|| env_path("LOCALAPPDATA"))
            .unwrap_or_else(std::env::temp_dir);
        let app_data = dirs::data_dir()
            .or_else(|| env_path("APPDATA"))
            .unwrap_or_else(|| local_app_data.clone());

        Self::rooted(
            std::env::temp_dir(),
            &windir,
            &program_data,
            &local_app_data,
            &app_data,
            config
                .recycle_drives
                .iter()
                .map(|&d| drive_root(d).join("$Recycle.Bin"))
                .collect(),
            system_root.join("Windows.old"),
        )
    }

    /// Lay out every target beneath the given roots.
    pub fn rooted(
        user_temp: PathBuf,
        windir: &Path,
        program_data: &Path,
        local_app_data: &Path,
        app_data: &Path,
        recycle_bins: Vec<PathBuf>,
        previous_install: PathBuf,
    ) -> Self {
        let chromium = |vendor: &str, product: &str| {
            let profile = local_app_data
                .join(vendor)
                .join(product)
                .join("User Data")
                .join("Default");
            [profile.join("Cache"), profile.join("Code Cache")]
        };
        let explorer = local_app_data.join("Microsoft").join("Windows");

        let mut browser_caches = Vec::new();
        browser_caches.extend(chromium("Google", "Chrome"));
        browser_caches.extend(chromium("BraveSoftware", "Brave-Browser"));
        browser_caches.push(app_data.join("Mozilla").join("Firefox").join("Profiles"));
        browser_caches.push(app_data.join("Opera Software").join("Opera Stable").join("Cache"));
        browser_caches.push(app_data.join("Opera Software").join("Opera GX Stable").join("Cache"));

        Self {
            user_temp,
            system_temp: windir.join("Temp"),
            prefetch: windir.join("Prefetch"),
            update_download: windir.join("SoftwareDistribution").join("Download"),
            delivery_optimization: program_data.join("Microsoft").join("Network").join("Downloader"),
            error_reports: program_data.join("Microsoft").join("Windows").join("WER"),
            recycle_bins,
            thumbnail_cache: explorer.join("Explorer"),
            log_dirs: vec![
                windir.join("Logs"),
                windir.join("System32").join("LogFiles"),
                local_app_data.join("Temp"),
            ],
            internet_caches: vec![explorer.join("INetCache"), explorer.join("WebCache")],
            browser_caches,
            previous_install,
            installer_patch_cache: windir.join("Installer").join("$PatchCache$"),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
