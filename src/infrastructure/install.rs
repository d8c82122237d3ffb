//! Handle over an on-disk archive install.
//!
//! Validates the expected layout, loads the settings JSON files, resolves the
//! `<fpPath>` macro, classifies the edition and the recognized daemon, and
//! opens the database. The handle is bound once per run and read-only after.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::settings::{
    KnownDaemon, LauncherConfig, Preferences, ServerDaemon, Services, StartStop, MACRO_FP_PATH,
};
use crate::infrastructure::database::FlashpointDb;

/// Paths recognized as part of an install, relative to its root.
pub const DATABASE_PATH: &str = "Data/flashpoint.sqlite";
pub const SERVICES_JSON_PATH: &str = "Data/services.json";
pub const CONFIG_JSON_PATH: &str = "Launcher/config.json";
pub const PREFERENCES_JSON_PATH: &str = "preferences.json";
pub const VER_TXT_PATH: &str = "version.txt";
pub const EXTRAS_PATH: &str = "Extras";

/// Destination root for packs that extract instead of mounting.
pub const EXTRACTED_GAMES_PATH: &str = "Data/Games";

#[cfg(windows)]
pub const LAUNCHER_PROCESS_NAME: &str = "Flashpoint.exe";
#[cfg(not(windows))]
pub const LAUNCHER_PROCESS_NAME: &str = "flashpoint-launcher";

/// Which distribution of the archive this install is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    /// Everything on disk; packs can be sourced from the local games store.
    Ultimate,
    /// Download-on-demand.
    Infinity,
    Core,
}

impl Edition {
    fn from_version_text(version: &str) -> Self {
        let lower = version.to_lowercase();
        if lower.contains("ultimate") {
            Self::Ultimate
        } else if lower.contains("infinity") {
            Self::Infinity
        } else {
            Self::Core
        }
    }
}

/// An opened, validated archive install.
pub struct FlashpointInstall {
    root: PathBuf,
    version_str: String,
    edition: Edition,
    services: Services,
    launcher_config: LauncherConfig,
    preferences: Preferences,
    daemon: Option<KnownDaemon>,
    db: FlashpointDb,
}

impl FlashpointInstall {
    /// Open and validate the install rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();

        for required in [DATABASE_PATH, SERVICES_JSON_PATH, VER_TXT_PATH] {
            if !root.join(required).exists() {
                bail!("A required file does not exist: {required}");
            }
        }

        let version_str = tokio::fs::read_to_string(root.join(VER_TXT_PATH))
            .await
            .context("failed to read version.txt")?
            .trim()
            .to_string();
        let edition = Edition::from_version_text(&version_str);

        let services_raw = tokio::fs::read_to_string(root.join(SERVICES_JSON_PATH))
            .await
            .context("failed to read services.json")?;
        let mut services: Services =
            serde_json::from_str(&services_raw).context("failed to parse services.json")?;
        resolve_service_macros(&mut services, &root);

        let launcher_config = read_optional_json(&root.join(CONFIG_JSON_PATH)).await?;
        let preferences = read_optional_json(&root.join(PREFERENCES_JSON_PATH)).await?;

        let daemon = detect_daemon(&services);

        let db = FlashpointDb::open(&root.join(DATABASE_PATH))
            .await
            .context("failed to open the archive database")?;

        Ok(Self {
            root,
            version_str,
            edition,
            services,
            launcher_config,
            preferences,
            daemon,
            db,
        })
    }

    /// Whether `dir` looks like an install root.
    pub fn is_install_root(dir: &Path) -> bool {
        dir.join(DATABASE_PATH).is_file() && dir.join(SERVICES_JSON_PATH).is_file()
    }

    /// Walk up from `start` until a recognized layout is found.
    pub fn find_install_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| Self::is_install_root(dir))
            .map(Path::to_path_buf)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &FlashpointDb {
        &self.db
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn launcher_config(&self) -> &LauncherConfig {
        &self.launcher_config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn daemon(&self) -> Option<KnownDaemon> {
        self.daemon
    }

    pub fn version_string(&self) -> &str {
        &self.version_str
    }

    /// Name of the standard launcher process, for companion-mode watching.
    pub fn launcher_process_name(&self) -> &'static str {
        LAUNCHER_PROCESS_NAME
    }

    /// Absolute directory data packs are stored in.
    pub fn data_packs_dir(&self) -> PathBuf {
        let configured = &self.preferences.data_packs_folder_path;
        if configured.is_empty() {
            self.root.join("Data/Games")
        } else {
            self.absolutize(configured)
        }
    }

    /// Absolute directory packs extract into.
    pub fn extracted_games_dir(&self) -> PathBuf {
        self.root.join(EXTRACTED_GAMES_PATH)
    }

    /// Absolute extras directory.
    pub fn extras_dir(&self) -> PathBuf {
        self.root.join(EXTRAS_PATH)
    }

    /// Base URL packs download from, if the edition supports on-demand.
    pub fn data_pack_source_url(&self) -> Option<&str> {
        self.preferences
            .game_data_sources
            .first()
            .and_then(|s| s.base_url())
            .or({
                if self.preferences.on_demand_base_url.is_empty() {
                    None
                } else {
                    Some(self.preferences.on_demand_base_url.as_str())
                }
            })
    }

    /// Expand `<fpPath>` and make the result absolute under the root.
    pub fn absolutize(&self, path: &str) -> PathBuf {
        let expanded = path.replace(MACRO_FP_PATH, &self.root.to_string_lossy());
        let expanded = Path::new(&expanded);
        if expanded.is_absolute() {
            expanded.to_path_buf()
        } else {
            self.root.join(expanded)
        }
    }

    /// Apply the preferences' app path override table.
    ///
    /// Returns the (possibly remapped) path, still relative to the root when
    /// the input was.
    pub fn resolve_app_path(&self, app_path: &str) -> String {
        for entry in &self.preferences.app_path_overrides {
            if entry.enabled && entry.path == app_path {
                return entry.override_path.clone();
            }
        }
        app_path.to_string()
    }

    /// The configured server definition, honoring an override name.
    ///
    /// Resolution order: explicit override, then preferences, then launcher
    /// config. `None` with a name means the name was not in the store.
    pub fn server_entry(&self, server_override: Option<&str>) -> (String, Option<&ServerDaemon>) {
        let name = server_override
            .map(str::to_string)
            .or_else(|| {
                if self.preferences.server.is_empty() {
                    None
                } else {
                    Some(self.preferences.server.clone())
                }
            })
            .unwrap_or_else(|| self.launcher_config.server.clone());

        let entry = self.services.server.values().find(|s| s.name == name);
        (name, entry)
    }

    /// All declared daemons.
    pub fn daemons(&self) -> impl Iterator<Item = &ServerDaemon> {
        self.services.daemon.values()
    }

    pub fn start_steps(&self) -> &[StartStop] {
        &self.services.start
    }

    pub fn stop_steps(&self) -> &[StartStop] {
        &self.services.stop
    }
}

fn detect_daemon(services: &Services) -> Option<KnownDaemon> {
    services
        .daemon
        .values()
        .find_map(|d| KnownDaemon::identify(&d.name))
        .or_else(|| {
            services
                .server
                .values()
                .find_map(|s| KnownDaemon::identify(&s.name))
        })
}

fn resolve_service_macros(services: &mut Services, root: &Path) {
    let root_str = root.to_string_lossy();
    let fix = |s: &mut String| {
        if s.contains(MACRO_FP_PATH) {
            *s = s.replace(MACRO_FP_PATH, &root_str);
        }
    };

    for sd in services.server.values_mut().chain(services.daemon.values_mut()) {
        fix(&mut sd.path);
        for arg in &mut sd.arguments {
            fix(arg);
        }
    }
    for ss in services.start.iter_mut().chain(services.stop.iter_mut()) {
        fix(&mut ss.path);
        for arg in &mut ss.arguments {
            fix(arg);
        }
    }
}

async fn read_optional_json<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
