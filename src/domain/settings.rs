//! Models for the archive install's JSON settings files.
//!
//! `services.json` declares the background helpers the launcher runs,
//! `preferences.json` carries user paths and data pack sourcing, and the
//! launcher's `config.json` decides whether a server is started at all.
//! All path fields may contain the `<fpPath>` macro, resolved by the install.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Macro expanded to the install root inside settings path fields.
pub const MACRO_FP_PATH: &str = "<fpPath>";

/// A long-lived background helper (web server, router, emulator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDaemon {
    pub name: String,
    pub path: String,
    pub filename: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Whether the process must be force-killed rather than asked to stop.
    #[serde(default)]
    pub kill: bool,
}

impl ServerDaemon {
    /// Program path relative to the install root.
    pub fn program(&self) -> String {
        if self.path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.path.trim_end_matches('/'), self.filename)
        }
    }
}

/// A one-shot start or stop step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStop {
    pub path: String,
    pub filename: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl StartStop {
    pub fn program(&self) -> String {
        if self.path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.path.trim_end_matches('/'), self.filename)
        }
    }
}

/// Parsed `services.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Services {
    pub server: HashMap<String, ServerDaemon>,
    pub daemon: HashMap<String, ServerDaemon>,
    pub start: Vec<StartStop>,
    pub stop: Vec<StartStop>,
}

/// Parsed launcher `config.json` (the subset consumed here).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherConfig {
    pub start_server: bool,
    pub server: String,
}

/// One enabled entry of the preferences app path override table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPathOverride {
    pub path: String,
    #[serde(rename = "override")]
    pub override_path: String,
    #[serde(default)]
    pub enabled: bool,
}

/// A remote source data packs can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDataSource {
    pub name: String,
    pub arguments: Vec<String>,
}

impl GameDataSource {
    /// The source's base URL (first argument by convention).
    pub fn base_url(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }
}

/// Parsed `preferences.json` (the subset consumed here).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub data_packs_folder_path: String,
    pub image_folder_path: String,
    pub json_folder_path: String,
    pub on_demand_images: bool,
    pub on_demand_base_url: String,
    pub app_path_overrides: Vec<AppPathOverride>,
    pub game_data_sources: Vec<GameDataSource>,
    pub server: String,
}

/// Background daemon flavors the pipeline knows how to mount against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownDaemon {
    Docker,
    Qemu,
    FpProxy,
    FpGameServer,
}

impl KnownDaemon {
    /// Classify a daemon/server definition by its name.
    pub fn identify(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("docker") {
            Some(Self::Docker)
        } else if lower.contains("qemu") {
            Some(Self::Qemu)
        } else if lower.contains("proxy") {
            Some(Self::FpProxy)
        } else if lower.contains("game server") || lower.contains("gameserver") {
            Some(Self::FpGameServer)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Qemu => "qemu",
            Self::FpProxy => "fp-proxy",
            Self::FpGameServer => "fp-game-server",
        }
    }
}

impl std::fmt::Display for KnownDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
