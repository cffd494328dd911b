//! Steps that delete whole cache directories.

use super::TaskContext;
use crate::cleaner::LogLevel;
use crate::error::Result;
use crate::fs_ops;
use crate::utils;

pub(super) fn empty_recycle_bins(ctx: &mut TaskContext<'_>) -> Result<()> {
    let bins = ctx.locations.recycle_bins.clone();
    ctx.delete_each(&bins);
    ctx.log("Recycle Bins emptied", LogLevel::Success);
    Ok(())
}

pub(super) fn clean_internet_cache(ctx: &mut TaskContext<'_>) -> Result<()> {
    let paths = ctx.locations.internet_caches.clone();
    let freed = ctx.delete_each(&paths);
    ctx.log(
        &format!("Internet Cache cleaned: {} MB freed", utils::whole_mb(freed)),
        LogLevel::Success,
    );
    Ok(())
}

pub(super) fn clean_browser_caches(ctx: &mut TaskContext<'_>) -> Result<()> {
    let paths = ctx.locations.browser_caches.clone();
    let freed = ctx.delete_each(&paths);
    ctx.log(
        &format!("Browser Caches cleaned: {} MB freed", utils::whole_mb(freed)),
        LogLevel::Success,
    );
    Ok(())
}

pub(super) fn clean_previous_install(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.previous_install.clone();
    if !fs_ops::directory_exists(&path) {
        ctx.log("Windows.old not found (already clean)", LogLevel::Info);
        return Ok(());
    }
    let freed = ctx.delete_each(std::slice::from_ref(&path));
    ctx.log(
        &format!("Windows.old deleted: {} GB freed", utils::whole_gb(freed)),
        LogLevel::Success,
    );
    Ok(())
}

pub(super) fn clean_installer_cache(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.installer_patch_cache.clone();
    if !fs_ops::directory_exists(&path) {
        return Ok(());
    }
    let freed = ctx.delete_each(std::slice::from_ref(&path));
    ctx.log(
        &format!("Installer Cache cleaned: {} MB freed", utils::whole_mb(freed)),
        LogLevel::Success,
    );
    Ok(())
}
