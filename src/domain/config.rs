//! CLIFp's own tunables.
//!
//! Distinct from the archive install's settings: these knobs control the
//! pipeline itself and load from `clifp.yaml` next to the binary with
//! `CLIFP_*` environment overrides.

use serde::{Deserialize, Serialize};

/// Process bider knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiderConfig {
    /// How often to poll for the watched process, in milliseconds.
    pub poll_rate_ms: u64,
    /// How long a process has to appear before the bide gives up.
    pub respawn_grace_ms: u64,
}

impl Default for BiderConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: 500,
            respawn_grace_ms: 30_000,
        }
    }
}

/// Network timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Operation-wide idle timeout for HTTP transfers.
    pub transfer_timeout_ms: u64,
    /// Per-command round-trip timeout for QMP sessions.
    pub qmp_timeout_ms: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: 30_000,
            qmp_timeout_ms: 5_000,
        }
    }
}

/// Log retention knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Historical log files kept before pruning.
    pub retention: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { retention: 50 }
    }
}

/// Update source knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Latest-release endpoint queried by the `update` command.
    pub release_api_url: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            release_api_url: "https://api.github.com/repos/oblivioncth/CLIFp/releases/latest"
                .to_string(),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClifpConfig {
    pub bider: BiderConfig,
    pub net: NetConfig,
    pub log: LogConfig,
    pub update: UpdateConfig,
}
