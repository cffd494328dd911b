//! Steps carried out by external commands rather than file deletion.

use super::TaskContext;
use crate::cleaner::LogLevel;
use crate::error::Result;
use crate::system::Invocation;

pub(super) fn flush_dns(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.system.run(&Invocation::flush_dns())?;
    ctx.log("DNS Cache flushed", LogLevel::Success);
    Ok(())
}

pub(super) fn delete_shadow_copies(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.system
        .run(&Invocation::delete_shadow_copies(ctx.config.system_drive))?;
    ctx.log("Shadow Copies deleted", LogLevel::Success);
    Ok(())
}

pub(super) fn disable_hibernation(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.system.run(&Invocation::disable_hibernation())?;
    ctx.log("Hibernation disabled (hiberfil.sys deleted)", LogLevel::Success);
    Ok(())
}

pub(super) fn reset_pagefile(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.system
        .run(&Invocation::delete_pagefile(ctx.config.system_drive))?;
    ctx.log("Pagefile reset (will recreate on reboot)", LogLevel::Success);
    Ok(())
}

/// Launched, not awaited: Disk Cleanup can run for a long time.
pub(super) fn run_disk_cleanup(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.system
        .launch(&Invocation::disk_cleanup(ctx.config.cleanup_profile))?;
    ctx.log("Disk Cleanup launched", LogLevel::Success);
    Ok(())
}
