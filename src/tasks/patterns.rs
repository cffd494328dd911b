//! Steps that delete only files matching a name pattern.

use super::TaskContext;
use crate::cleaner::LogLevel;
use crate::error::Result;
use crate::fs_ops::{self, Reclaimed};
use crate::utils;

fn credit(ctx: &mut TaskContext<'_>, reclaimed: Reclaimed) {
    ctx.counters.add_files(reclaimed.files);
    ctx.counters.add_bytes(reclaimed.bytes);
}

pub(super) fn clean_delivery_optimization(ctx: &mut TaskContext<'_>) -> Result<()> {
    let dir = ctx.locations.delivery_optimization.clone();
    if !fs_ops::directory_exists(&dir) {
        return Ok(());
    }
    let reclaimed = fs_ops::delete_matching_files(&dir, "qmgr*.dat", false)?;
    credit(ctx, reclaimed);
    ctx.log("Delivery Optimization cleaned", LogLevel::Success);
    Ok(())
}

pub(super) fn clean_thumbnail_cache(ctx: &mut TaskContext<'_>) -> Result<()> {
    let dir = ctx.locations.thumbnail_cache.clone();
    if !fs_ops::directory_exists(&dir) {
        return Ok(());
    }
    let reclaimed = fs_ops::delete_matching_files(&dir, "thumbcache*", false)?;
    credit(ctx, reclaimed);
    ctx.log("Thumbnail Cache cleaned", LogLevel::Success);
    Ok(())
}

/// Only a short list of known log folders is walked, to keep the scan cheap.
pub(super) fn clean_log_files(ctx: &mut TaskContext<'_>) -> Result<()> {
    let mut total = Reclaimed::default();
    for dir in ctx.locations.log_dirs.clone() {
        if !fs_ops::directory_exists(&dir) {
            continue;
        }
        let reclaimed = fs_ops::delete_matching_files(&dir, "*.log", true)?;
        credit(ctx, reclaimed);
        total.files += reclaimed.files;
        total.bytes += reclaimed.bytes;
    }

    ctx.log(
        &format!(
            "Log Files cleaned: {} files, {} MB",
            total.files,
            utils::whole_mb(total.bytes)
        ),
        LogLevel::Success,
    );
    Ok(())
}
