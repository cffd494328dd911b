//! Steps that empty a folder but leave the folder itself in place.

use std::thread;

use tracing::warn;

use super::TaskContext;
use crate::error::Result;

pub(super) fn clean_user_temp(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.user_temp.clone();
    ctx.empty_in_place("User Temp", &path);
    Ok(())
}

pub(super) fn clean_system_temp(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.system_temp.clone();
    ctx.empty_in_place("Windows Temp", &path);
    Ok(())
}

pub(super) fn clean_prefetch(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.prefetch.clone();
    ctx.empty_in_place("Prefetch", &path);
    Ok(())
}

/// The update service holds the download cache open, so it is stopped around the delete.
pub(super) fn clean_update_cache(ctx: &mut TaskContext<'_>) -> Result<()> {
    let config = ctx.config;
    let system = ctx.system;
    let service = config.update_service.as_str();
    let timeout = config.service_timeout();

    if !system.stop_service(service, timeout) {
        warn!(service, "update service not confirmed stopped; cleaning anyway");
    }
    thread::sleep(config.service_settle());

    let path = ctx.locations.update_download.clone();
    ctx.empty_in_place("Update Cache", &path);

    if !system.start_service(service, timeout) {
        warn!(service, "update service not confirmed running");
    }
    Ok(())
}

pub(super) fn clean_error_reports(ctx: &mut TaskContext<'_>) -> Result<()> {
    let path = ctx.locations.error_reports.clone();
    ctx.empty_in_place("Error Reports", &path);
    Ok(())
}
