//! Historical log cleanup.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Delete the oldest `stem`-prefixed log files beyond `keep`.
///
/// Returns the number of files deleted.
pub async fn prune_old_logs(dir: &Path, stem: &str, keep: usize) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let prefix = format!("{stem}.");
    let mut candidates = Vec::new();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context("failed to read log directory")?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.contains(".log") {
            candidates.push(entry.path());
        }
    }

    if candidates.len() <= keep {
        return Ok(0);
    }

    // Daily file names sort chronologically.
    candidates.sort();
    let excess = candidates.len() - keep;
    let mut deleted = 0;
    for path in candidates.into_iter().take(excess) {
        debug!(path = %path.display(), "pruning old log file");
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("failed to delete {}", path.display()))?;
        deleted += 1;
    }

    Ok(deleted)
}
