//! Small helpers for logging, output directories and interrupt handling.

use std::error::Error;
use std::fs as stdfs;
use std::future::{Future, pending};
use std::io;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a character
/// boundary) with an ellipsis and the dropped byte count appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}

/// Resolve when `signal` fires; never resolve if it cannot be listened for.
///
/// Used as the cancellation future of a run, so a failed signal handler
/// must not look like an interrupt.
///
/// # Arguments
///
/// * `signal` - Typically `tokio::signal::ctrl_c()`
pub async fn until_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => warn!("Interrupt received; cancelling run"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for interrupts; run is not cancellable");
            pending::<()>().await
        }
    }
}
