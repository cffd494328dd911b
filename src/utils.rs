use std::path::Path;
use std::time::Duration;

const KIB: u64 = 1_024;
const MIB: u64 = 1_048_576;
const GIB: u64 = 1_073_741_824;

/// Whole mebibytes, truncated. Task log lines report freed space this way.
pub fn whole_mb(bytes: u64) -> u64 {
    bytes / MIB
}

/// Whole gibibytes, truncated.
pub fn whole_gb(bytes: u64) -> u64 {
    bytes / GIB
}

/// Gibibytes with two decimals, used by the run summary ("3.27 GB").
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB as f64)
}

/// Format byte count as human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Seconds below one minute, minutes above ("12.4 seconds", "3.1 minutes").
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1} seconds")
    } else {
        format!("{:.1} minutes", secs / 60.0)
    }
}

/// Shorten a path for display by replacing the home dir with ~.
pub fn display_path(path: &Path) -> String {
    match dirs::home_dir() {
        Some(home) => match path.strip_prefix(&home) {
            Ok(relative) => format!("~{}{}", std::path::MAIN_SEPARATOR, relative.display()),
            Err(_) => path.display().to_string(),
        },
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_mb_truncates() {
        assert_eq!(whole_mb(1_500_000), 1);
        assert_eq!(whole_mb(1_048_575), 0);
        assert_eq!(whole_mb(3 * MIB), 3);
    }

    #[test]
    fn format_gb_has_two_decimals() {
        assert_eq!(format_gb(0), "0.00 GB");
        assert_eq!(format_gb(GIB + GIB / 2), "1.50 GB");
    }

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2 * KIB), "2.00 KB");
        assert_eq!(format_size(5 * MIB), "5.00 MB");
    }

    #[test]
    fn elapsed_switches_to_minutes() {
        assert_eq!(format_elapsed(Duration::from_millis(12_400)), "12.4 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(90)), "1.5 minutes");
    }
}
