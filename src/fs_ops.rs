//! Defensive filesystem primitives used by the cleaning tasks.
//!
//! Nothing here returns an error for a single unreadable or undeletable item:
//! the item is skipped, logged at `debug`, and left out of the returned
//! totals. Callers get partial results instead of failures.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

/// Files and bytes removed by a pattern-filtered delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaimed {
    pub files: u64,
    pub bytes: u64,
}

/// Existence probe. Any access error (permission denial, malformed path) reads as "absent".
pub fn directory_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Probe writability by creating and removing a uniquely named marker file in `path`.
pub fn has_write_access(path: &Path) -> bool {
    if !directory_exists(path) {
        return false;
    }

    let probe = tempfile::Builder::new()
        .prefix("_probe_")
        .suffix(".tmp")
        .tempfile_in(path)
        .and_then(|mut file| {
            file.write_all(b"probe")?;
            file.close()
        });

    match probe {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "write probe failed");
            false
        }
    }
}

/// Recursive size of every regular file under `path`.
///
/// A file that vanishes or becomes unreadable between enumeration and the
/// size read contributes 0. A missing directory is 0.
pub fn directory_size(path: &Path) -> u64 {
    if !directory_exists(path) {
        return 0;
    }

    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .par_bridge()
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// Remove a whole directory tree, returning its size measured beforehand.
///
/// The pre-deletion size is returned even when the removal fails partway, so
/// the figure can overstate what was actually freed.
pub fn safe_delete_directory(path: &Path) -> u64 {
    if !directory_exists(path) {
        return 0;
    }

    let size = directory_size(path);
    if let Err(e) = fs::remove_dir_all(path) {
        debug!(path = %path.display(), error = %e, "partial directory removal");
    }
    size
}

/// Delete everything directly under `path` but keep `path` itself.
///
/// Only top-level files are sized: the contents of removed subdirectories are
/// not added to the returned total, so it undercounts nested data.
pub fn safe_empty_directory(path: &Path) -> u64 {
    let read_dir = match fs::read_dir(path) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot enumerate directory");
            return 0;
        }
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in read_dir.flatten() {
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => subdirs.push(entry.path()),
            Ok(_) => files.push(entry),
            Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping entry"),
        }
    }

    let mut freed = 0u64;
    for entry in files {
        let path = entry.path();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(&path).or_else(|_| fs::remove_dir(&path)) {
            Ok(()) => freed += size,
            Err(e) => debug!(path = %path.display(), error = %e, "skipping file"),
        }
    }

    for dir in subdirs {
        if let Err(e) = fs::remove_dir_all(&dir) {
            debug!(path = %dir.display(), error = %e, "skipping subdirectory");
        }
    }

    freed
}

/// Delete files under `dir` whose name matches a glob such as `qmgr*.dat`.
///
/// Matching is case-insensitive. Only the enumeration of `dir` itself can
/// fail; individual files that cannot be sized or removed are skipped.
pub fn delete_matching_files(dir: &Path, pattern: &str, recursive: bool) -> io::Result<Reclaimed> {
    let pattern = Pattern::new(pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    // Surface an unreadable root to the caller; everything below it is best-effort.
    fs::read_dir(dir)?;

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut reclaimed = Reclaimed::default();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if !pattern.matches_with(&name, options) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                reclaimed.files += 1;
                reclaimed.bytes += size;
            }
            Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping file"),
        }
    }

    Ok(reclaimed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_file(path: PathBuf, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn missing_directory_is_absent_and_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(!directory_exists(&missing));
        assert!(!has_write_access(&missing));
        assert_eq!(directory_size(&missing), 0);
        assert_eq!(safe_delete_directory(&missing), 0);
        assert_eq!(safe_empty_directory(&missing), 0);
    }

    #[test]
    fn file_is_not_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        write_file(file.clone(), 4);

        assert!(!directory_exists(&file));
    }

    #[test]
    fn write_probe_leaves_no_marker() {
        let dir = tempdir().unwrap();

        assert!(has_write_access(dir.path()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn directory_size_is_recursive() {
        let dir = tempdir().unwrap();
        write_file(dir.path().join("a.bin"), 100);
        write_file(dir.path().join("nested/b.bin"), 200);
        write_file(dir.path().join("nested/deeper/c.bin"), 300);

        assert_eq!(directory_size(dir.path()), 600);
    }

    #[test]
    fn directory_size_tolerates_concurrent_deletion() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..200 {
            let path = dir.path().join(format!("sub{}/f{i}.bin", i % 10));
            write_file(path.clone(), 10);
            paths.push(path);
        }

        let remover = std::thread::spawn(move || {
            for path in paths.iter().step_by(2) {
                let _ = fs::remove_file(path);
            }
        });
        let size = directory_size(dir.path());
        remover.join().unwrap();

        assert!(size <= 2_000);
        assert_eq!(directory_size(dir.path()), 1_000);
    }

    #[test]
    fn delete_directory_reports_pre_deletion_size() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("cache");
        write_file(target.join("x.bin"), 1_000);
        write_file(target.join("y/z.bin"), 24);

        assert_eq!(safe_delete_directory(&target), 1_024);
        assert!(!target.exists());
    }

    #[test]
    fn empty_directory_keeps_parent_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Temp");
        write_file(target.join("one.tmp"), 500_000);
        write_file(target.join("two.tmp"), 500_000);
        write_file(target.join("three.tmp"), 500_000);
        write_file(target.join("sub1/inner.tmp"), 10);
        write_file(target.join("sub2/deep/inner.tmp"), 10);

        assert_eq!(safe_empty_directory(&target), 1_500_000);
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);

        assert_eq!(safe_empty_directory(&target), 0);
        assert!(target.is_dir());
    }

    #[test]
    fn empty_directory_does_not_size_subdirectories() {
        let dir = tempdir().unwrap();
        write_file(dir.path().join("top.log"), 7);
        write_file(dir.path().join("sub/big.bin"), 4_096);

        assert_eq!(safe_empty_directory(dir.path()), 7);
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn matching_delete_is_shallow_by_default() {
        let dir = tempdir().unwrap();
        write_file(dir.path().join("qmgr0.dat"), 10);
        write_file(dir.path().join("QMGR1.DAT"), 20);
        write_file(dir.path().join("other.dat"), 30);
        write_file(dir.path().join("nested/qmgr2.dat"), 40);

        let reclaimed = delete_matching_files(dir.path(), "qmgr*.dat", false).unwrap();

        assert_eq!(reclaimed, Reclaimed { files: 2, bytes: 30 });
        assert!(dir.path().join("other.dat").exists());
        assert!(dir.path().join("nested/qmgr2.dat").exists());
    }

    #[test]
    fn matching_delete_recurses_when_asked() {
        let dir = tempdir().unwrap();
        write_file(dir.path().join("setup.log"), 5);
        write_file(dir.path().join("a/b/cbs.log"), 6);
        write_file(dir.path().join("a/b/keep.txt"), 7);

        let reclaimed = delete_matching_files(dir.path(), "*.log", true).unwrap();

        assert_eq!(reclaimed, Reclaimed { files: 2, bytes: 11 });
        assert!(dir.path().join("a/b/keep.txt").exists());
    }

    #[test]
    fn matching_delete_fails_on_missing_root() {
        let dir = tempdir().unwrap();
        assert!(delete_matching_files(&dir.path().join("gone"), "*.log", true).is_err());
    }
}
