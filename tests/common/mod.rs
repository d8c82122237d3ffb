//! Shared fixtures for integration tests.
//!
//! Builds a throwaway archive install: a sqlite database with the tables the
//! pipeline queries, the settings JSON files, and optional on-disk data
//! packs. Also provides a scripted frontend that records directives and
//! auto-answers requests.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use clifp::domain::directive::AsyncDirective;
use clifp::services::director::{Directive, DirectiveReceiver};

pub const GAME_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const PACK_BYTES: &[u8] = b"fixture pack contents";

pub fn pack_sha256() -> String {
    format!("{:x}", Sha256::digest(PACK_BYTES))
}

/// A built throwaway install.
pub struct InstallFixture {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl InstallFixture {
    pub fn pack_path(&self) -> PathBuf {
        self.root.join("Data/Games/fixture-pack.zip")
    }

    /// Write the hash-matching pack to disk.
    pub fn write_pack(&self) {
        let path = self.pack_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, PACK_BYTES).unwrap();
    }

    /// Write a pack whose bytes do not match the recorded digest.
    pub fn write_corrupt_pack(&self) {
        let path = self.pack_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"tampered contents").unwrap();
    }
}

/// Knobs for the fixture layout.
pub struct FixtureOptions {
    /// Base URL packs download from.
    pub data_source_url: String,
    /// Whether the configured server autostarts.
    pub start_server: bool,
    /// Service steps run at shutdown append to this marker file.
    pub shutdown_marker: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            data_source_url: "http://127.0.0.1:1/Games".to_string(),
            start_server: false,
            shutdown_marker: false,
        }
    }
}

/// Build an install with one data-pack game.
pub async fn build_install(options: FixtureOptions) -> InstallFixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Flashpoint");
    std::fs::create_dir_all(root.join("Data")).unwrap();
    std::fs::create_dir_all(root.join("Launcher")).unwrap();
    std::fs::create_dir_all(root.join("FPSoftware")).unwrap();

    std::fs::write(root.join("version.txt"), "Flashpoint 11 Infinity - Fixture").unwrap();

    build_database(&root.join("Data/flashpoint.sqlite")).await;
    write_services(&root, &options);
    write_settings(&root, &options);
    write_service_scripts(&root, &options);

    InstallFixture { dir, root }
}

async fn build_database(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    let statements = [
        "CREATE TABLE game (id TEXT PRIMARY KEY, title TEXT, series TEXT, developer TEXT, \
         publisher TEXT, platformName TEXT, broken INTEGER DEFAULT 0, playMode TEXT, \
         status TEXT, notes TEXT, source TEXT, applicationPath TEXT, launchCommand TEXT, \
         version TEXT, orderTitle TEXT, library TEXT, activeDataId INTEGER)",
        "CREATE TABLE additional_app (id TEXT PRIMARY KEY, parentGameId TEXT, name TEXT, \
         applicationPath TEXT, launchCommand TEXT, autoRunBefore INTEGER DEFAULT 0, \
         waitForExit INTEGER DEFAULT 0)",
        "CREATE TABLE game_data (id INTEGER PRIMARY KEY, gameId TEXT, title TEXT, \
         dateAdded TEXT, sha256 TEXT, size INTEGER, path TEXT, presentOnDisk INTEGER \
         DEFAULT 0, parameters TEXT, applicationPath TEXT, launchCommand TEXT)",
        "CREATE TABLE playlist (id TEXT PRIMARY KEY, title TEXT, description TEXT, author TEXT)",
        "CREATE TABLE playlist_game (id INTEGER PRIMARY KEY, playlistId TEXT, \
         \"order\" INTEGER, gameId TEXT)",
    ];
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    sqlx::query(
        "INSERT INTO game (id, title, series, developer, publisher, platformName, broken, \
         applicationPath, launchCommand, library, activeDataId) VALUES (?, 'Fixture Quest', '', \
         'Fixture Dev', 'Fixture Pub', 'Flash', 0, 'FPSoftware/player.sh', 'fixture.swf', \
         'arcade', 1)",
    )
    .bind(GAME_ID)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO game_data (id, gameId, title, dateAdded, sha256, size, path, \
         presentOnDisk, parameters) VALUES (1, ?, 'Fixture Quest', \
         '2024-01-01T00:00:00Z', ?, ?, 'fixture-pack.zip', 0, NULL)",
    )
    .bind(GAME_ID)
    .bind(pack_sha256())
    .bind(PACK_BYTES.len() as i64)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO playlist (id, title, description, author) VALUES \
         ('aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee', 'Fixture Favorites', 'test playlist', 'qa')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO playlist_game (id, playlistId, \"order\", gameId) VALUES \
         (1, 'aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee', 0, ?)",
    )
    .bind(GAME_ID)
    .execute(&pool)
    .await
    .unwrap();

    pool.close().await;
}

fn write_services(root: &Path, options: &FixtureOptions) {
    let stop = if options.shutdown_marker {
        serde_json::json!([
            {"path": "<fpPath>", "filename": "stop-marker.sh", "arguments": []}
        ])
    } else {
        serde_json::json!([])
    };

    let services = serde_json::json!({
        "server": {
            "fixture": {
                "name": "Fixture Server",
                "path": "<fpPath>",
                "filename": "server.sh",
                "arguments": [],
                "kill": false
            }
        },
        "daemon": {
            "proxy": {
                "name": "Flashpoint Proxy",
                "path": "<fpPath>",
                "filename": "proxy.sh",
                "arguments": [],
                "kill": true
            }
        },
        "start": [],
        "stop": stop
    });
    std::fs::write(
        root.join("Data/services.json"),
        serde_json::to_vec_pretty(&services).unwrap(),
    )
    .unwrap();
}

fn write_settings(root: &Path, options: &FixtureOptions) {
    let config = serde_json::json!({
        "startServer": options.start_server,
        "server": "Fixture Server"
    });
    std::fs::write(
        root.join("Launcher/config.json"),
        serde_json::to_vec_pretty(&config).unwrap(),
    )
    .unwrap();

    let preferences = serde_json::json!({
        "dataPacksFolderPath": "Data/Games",
        "server": "Fixture Server",
        "gameDataSources": [
            {"name": "Fixture Source", "arguments": [options.data_source_url]}
        ]
    });
    std::fs::write(
        root.join("preferences.json"),
        serde_json::to_vec_pretty(&preferences).unwrap(),
    )
    .unwrap();
}

#[cfg(unix)]
fn write_service_scripts(root: &Path, options: &FixtureOptions) {
    use std::os::unix::fs::PermissionsExt;

    let scripts: &[(&str, String)] = &[
        ("server.sh", "#!/bin/sh\nsleep 30\n".to_string()),
        ("proxy.sh", "#!/bin/sh\nsleep 30\n".to_string()),
        (
            "player.sh",
            "#!/bin/sh\nexit 0\n".to_string(),
        ),
        (
            "stop-marker.sh",
            format!(
                "#!/bin/sh\necho ran >> \"{}\"\n",
                root.join("shutdown-marker.txt").display()
            ),
        ),
    ];

    for (name, content) in scripts {
        let path = if *name == "player.sh" {
            std::fs::create_dir_all(root.join("FPSoftware")).unwrap();
            root.join("FPSoftware").join(name)
        } else {
            root.join(name)
        };
        std::fs::write(&path, content).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let _ = options;
}

#[cfg(not(unix))]
fn write_service_scripts(_root: &Path, _options: &FixtureOptions) {}

/// Drains the directive bus, recording async payloads and answering requests
/// with their defaults.
pub fn spawn_recording_frontend(
    mut rx: DirectiveReceiver,
) -> tokio::task::JoinHandle<Vec<AsyncDirective>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(directive) = rx.recv().await {
            match directive {
                Directive::Async { payload, .. } => seen.push(payload),
                Directive::Sync { ack, .. } => {
                    let _ = ack.send(());
                }
                Directive::Request { payload, reply, .. } => {
                    let _ = reply.send(payload.default_response());
                }
            }
        }
        seen
    })
}
