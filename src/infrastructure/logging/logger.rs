//! Tracing subscriber setup.
//!
//! One per-day file sink under the binary's directory. The `log` bridge is
//! installed so diagnostics from dependencies funnel into the same stream.

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

/// File extension used for run logs.
pub const LOG_FILE_EXT: &str = "log";

/// Initialize the global subscriber writing to `dir/<stem>.<date>.log`.
///
/// Returns the appender guard; dropping it flushes buffered lines, so keep it
/// alive for the whole run.
pub fn init_logging(dir: &Path, stem: &str) -> Result<WorkerGuard> {
    let appender = rolling::daily(dir, format!("{stem}.{LOG_FILE_EXT}"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    // The subscriber may already bridge `log`; a second install is harmless.
    let _ = tracing_log::LogTracer::init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_created_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let appender = rolling::daily(dir.path(), format!("clifp.{LOG_FILE_EXT}"));
        let (mut writer, _guard) = tracing_appender::non_blocking(appender);
        use std::io::Write;
        writer.write_all(b"probe\n").unwrap();
        drop(_guard);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
