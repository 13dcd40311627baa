//! Sweep and watch commands.

use std::time::Duration;

use tracing::{error, info};

use super::AppContext;
use crate::cli::args::OutputFormat;
use crate::error::DeskError;
use crate::output::format_sweep;

/// Run one sweep.
///
/// # Errors
///
/// Returns storage errors from the sweep.
pub fn sweep(ctx: &AppContext, format: OutputFormat) -> Result<String, DeskError> {
    let report = ctx.desk()?.sweep()?;
    format_sweep(&report, format)
}

/// Sweep on an interval, printing each non-empty report.
///
/// A failed sweep is logged and retried on the next tick.
///
/// # Errors
///
/// Returns an error if the desk cannot be built or the interval is zero.
pub fn watch(
    ctx: &AppContext,
    interval: Option<u64>,
    count: Option<u64>,
    format: OutputFormat,
) -> Result<String, DeskError> {
    let secs = interval.unwrap_or(ctx.config.automation.sweep_interval_secs);
    if secs == 0 {
        return Err(DeskError::InvalidArgument("interval must be positive".to_string()));
    }
    let desk = ctx.desk()?;
    info!(interval_secs = secs, "watching");

    let mut runs = 0;
    loop {
        match desk.sweep() {
            Ok(report) if !report.is_quiet() => println!("{}", format_sweep(&report, format)?),
            Ok(_) => {}
            Err(e) => error!(error = %e, "sweep failed"),
        }

        runs += 1;
        if count.is_some_and(|max| runs >= max) {
            return Ok(String::new());
        }
        std::thread::sleep(Duration::from_secs(secs));
    }
}
