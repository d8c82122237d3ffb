//! Self-update against the release server.
//!
//! A normal invocation queries the latest release, compares versions, and on
//! acceptance downloads and stages the new build, then hands off to the
//! staged binary. The staged binary, re-invoked with `--install`, waits for
//! the old process to exit, swaps the files with backups, and flags the cache
//! for clearing.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::types::UpdateArgs;
use crate::domain::directive::{AsyncDirective, RequestDirective};
use crate::domain::error::{ClifpError, UpdateError};
use crate::infrastructure::process::InstanceLock;
use crate::infrastructure::update_cache;
use crate::services::core::Core;
use crate::services::driver::Command;
use crate::services::task::extract::extract_sub_dir;

const USAGE: &str = "Usage:\n\
    update <options>\n\n\
    Options:\n\
    --install: Internal. Finishes an in-progress update.";

const MSG_NO_UPDATES: &str = "No updates available.";
const MSG_UPDATE_COMPLETE: &str = "Update installed successfully.";

/// How long the staged binary waits for the old process to let go.
const OLD_PROCESS_WAIT: Duration = Duration::from_millis(500);
const OLD_PROCESS_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseData {
    name: String,
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// Parse a `v1.2.3`-style tag.
fn parse_version(tag: &str) -> Option<(u64, u64, u64)> {
    let trimmed = tag.trim().trim_start_matches(['v', 'V']);
    let mut parts = trimmed.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next().map_or(Some(0), |p| {
        // Tolerate suffixes like "3-rc1".
        p.split(['-', '+']).next()?.parse().ok()
    })?;
    Some((major, minor, patch))
}

fn is_newer(remote: (u64, u64, u64), local: (u64, u64, u64)) -> bool {
    remote > local
}

/// Substring release assets for this platform carry.
#[cfg(windows)]
const PLATFORM_FRAGMENT: &str = "win";
#[cfg(not(windows))]
const PLATFORM_FRAGMENT: &str = "linux";

fn matching_asset(release: &ReleaseData) -> Option<&ReleaseAsset> {
    release.assets.iter().find(|asset| {
        let lower = asset.name.to_lowercase();
        lower.contains(PLATFORM_FRAGMENT) && lower.ends_with(".zip")
    })
}

#[cfg(windows)]
const BIN_NAME: &str = "clifp.exe";
#[cfg(not(windows))]
const BIN_NAME: &str = "clifp";

pub struct UpdateCommand {
    args: UpdateArgs,
}

impl UpdateCommand {
    pub const NAME: &'static str = "update";

    pub fn new(args: UpdateArgs) -> Self {
        Self { args }
    }

    async fn check_and_prepare(&self, core: &mut Core) -> Result<(), ClifpError> {
        core.set_status("Updating", "Checking...");
        core.directorate()
            .log_event("Checking if a newer release is available...");

        let client = reqwest::Client::builder()
            .user_agent("CLIFp")
            .timeout(Duration::from_millis(
                core.config().net.transfer_timeout_ms,
            ))
            .build()
            .map_err(|e| UpdateError::ConnectionError(e.to_string()))?;

        let release: ReleaseData = client
            .get(&core.config().update.release_api_url)
            .send()
            .await
            .map_err(|e| UpdateError::ConnectionError(e.to_string()))?
            .error_for_status()
            .map_err(|e| UpdateError::ConnectionError(e.to_string()))?
            .json()
            .await
            .map_err(|e| UpdateError::InvalidUpdateData(e.to_string()))?;

        let remote = parse_version(&release.tag_name)
            .ok_or_else(|| UpdateError::InvalidReleaseVersion(release.tag_name.clone()))?;
        let local = parse_version(env!("CARGO_PKG_VERSION"))
            .ok_or_else(|| UpdateError::InvalidReleaseVersion(env!("CARGO_PKG_VERSION").into()))?;

        if !is_newer(remote, local) {
            core.directorate().post_async(AsyncDirective::Message {
                text: MSG_NO_UPDATES.into(),
                selectable: false,
            });
            return Ok(());
        }

        core.directorate()
            .log_event(&format!("Update available ({}).", release.tag_name));
        let accepted = core
            .directorate()
            .post_request(RequestDirective::YesOrNo {
                question: format!("\"{}\" is available.\n\nUpdate?", release.name),
            })
            .await
            .as_yes_no()
            .unwrap_or(false);
        if !accepted {
            core.directorate().log_event("Update rejected");
            return Ok(());
        }
        core.directorate().log_event("Queuing update...");

        let Some(asset) = matching_asset(&release) else {
            core.directorate().post_async(AsyncDirective::Message {
                text: "A newer version is available, but without any assets that match current \
                       build specifications. Update manually at GitHub."
                    .into(),
                selectable: false,
            });
            return Ok(());
        };

        core.set_status("Updating", "Downloading...");
        let exe_dir = current_exe_dir()?;
        let download_dir = update_cache::download_dir(&exe_dir);
        let data_dir = update_cache::data_dir(&exe_dir);
        std::fs::create_dir_all(&download_dir)
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;

        let archive_path = download_dir.join(&asset.name);
        let bytes = client
            .get(&asset.browser_download_url)
            .send()
            .await
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?
            .error_for_status()
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;
        tokio::fs::write(&archive_path, &bytes)
            .await
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;

        core.set_status("Updating", "Installing...");
        extract_sub_dir(&archive_path, "", &data_dir)
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;

        let staged = data_dir.join(BIN_NAME);
        if !staged.is_file() {
            return Err(UpdateError::InvalidUpdateData(format!(
                "release archive is missing {BIN_NAME}"
            ))
            .into());
        }
        make_executable(&staged)?;

        let current = std::env::current_exe()
            .map_err(|e| UpdateError::InvalidPath(e.to_string()))?;
        tokio::process::Command::new(&staged)
            .arg("update")
            .arg("--install")
            .arg(&current)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;

        core.directorate()
            .log_event("Handed off to the staged updater");
        Ok(())
    }

    async fn install_update(&self, core: &mut Core, target: &Path) -> Result<(), ClifpError> {
        core.set_status("Updating", "Installing...");

        // Wait for the bootstrap process to release the instance lock.
        let mut attempts = 0;
        loop {
            match InstanceLock::acquire() {
                Ok(Some(lock)) => {
                    drop(lock);
                    break;
                }
                _ => {
                    attempts += 1;
                    if attempts >= OLD_PROCESS_ATTEMPTS {
                        return Err(UpdateError::OldProcessNotFinished.into());
                    }
                    core.directorate().log_event(&format!(
                        "Waiting for bootstrap process to close ({}ms remaining)...",
                        OLD_PROCESS_WAIT.as_millis()
                            * u128::from(OLD_PROCESS_ATTEMPTS - attempts)
                    ));
                    tokio::time::sleep(OLD_PROCESS_WAIT).await;
                }
            }
        }

        let install_root = target
            .parent()
            .ok_or_else(|| UpdateError::InvalidPath(target.display().to_string()))?
            .to_path_buf();
        let data_dir = update_cache::data_dir(&install_root);
        let backup_dir = update_cache::backup_dir(&install_root);

        if !data_dir.is_dir() {
            return Err(UpdateError::InvalidPath(data_dir.display().to_string()).into());
        }

        core.directorate().log_event("Installing update...");
        core.directorate().log_event("Backing up original files...");
        std::fs::create_dir_all(&backup_dir)
            .map_err(|e| UpdateError::TransferFail(e.to_string()))?;

        let transfers = list_files(&data_dir).map_err(|e| UpdateError::TransferFail(e.to_string()))?;
        for relative in &transfers {
            let existing = install_root.join(relative);
            if existing.is_file() {
                copy_with_parents(&existing, &backup_dir.join(relative))
                    .map_err(|e| UpdateError::TransferFail(e.to_string()))?;
            }
        }

        core.directorate().log_event("Installing new files...");
        let mut install_result = Ok(());
        for relative in &transfers {
            core.directorate().log_event(&format!(
                "Transferring \"{}\" to \"{}\"",
                data_dir.join(relative).display(),
                install_root.join(relative).display()
            ));
            if let Err(e) = copy_with_parents(&data_dir.join(relative), &install_root.join(relative))
            {
                install_result = Err(UpdateError::TransferFail(e.to_string()));
                break;
            }
        }

        if install_result.is_err() {
            core.directorate().log_event("Restoring original files...");
            for relative in &transfers {
                let backup = backup_dir.join(relative);
                if backup.is_file() {
                    let _ = copy_with_parents(&backup, &install_root.join(relative));
                }
            }
        }
        install_result?;

        update_cache::mark_stale(&install_root)
            .map_err(|e| UpdateError::CacheClearFail(e.to_string()))?;

        core.directorate().post_async(AsyncDirective::Message {
            text: MSG_UPDATE_COMPLETE.into(),
            selectable: false,
        });
        Ok(())
    }
}

#[async_trait]
impl Command for UpdateCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn requires_flashpoint(&self) -> bool {
        false
    }

    /// Update must be able to start while the bootstrap instance still runs.
    fn auto_block_new_instances(&self) -> bool {
        false
    }

    async fn perform(&mut self, core: &mut Core) -> Result<(), ClifpError> {
        if self.args.help {
            core.directorate().post_async(AsyncDirective::Message {
                text: USAGE.into(),
                selectable: false,
            });
            return Ok(());
        }

        match self.args.install.clone() {
            Some(target) => self.install_update(core, &target).await,
            None => self.check_and_prepare(core).await,
        }
    }
}

fn current_exe_dir() -> Result<PathBuf, UpdateError> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .ok_or_else(|| UpdateError::InvalidPath("cannot locate the running binary".into()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), UpdateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| UpdateError::TransferFail(e.to_string()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), UpdateError> {
    Ok(())
}

/// Relative paths of every file under `root`.
fn list_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

fn copy_with_parents(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ClifpConfig;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version("0.9.13"), Some((0, 9, 13)));
        assert_eq!(parse_version("v2.0.1-rc1"), Some((2, 0, 1)));
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer((1, 0, 0), (0, 9, 9)));
        assert!(is_newer((0, 9, 10), (0, 9, 9)));
        assert!(!is_newer((0, 9, 9), (0, 9, 9)));
        assert!(!is_newer((0, 9, 8), (0, 9, 9)));
    }

    #[test]
    fn test_matching_asset_prefers_platform_zip() {
        let release = ReleaseData {
            name: "CLIFp v99".into(),
            tag_name: "v99.0.0".into(),
            assets: vec![
                ReleaseAsset {
                    name: "CLIFp_99_win_x64.zip".into(),
                    browser_download_url: "http://example/win.zip".into(),
                },
                ReleaseAsset {
                    name: "CLIFp_99_linux_x64.zip".into(),
                    browser_download_url: "http://example/linux.zip".into(),
                },
            ],
        };
        let asset = matching_asset(&release).unwrap();
        assert!(asset.name.to_lowercase().contains(PLATFORM_FRAGMENT));
    }

    #[tokio::test]
    async fn test_no_updates_enqueues_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name": "CLIFp old", "tag_name": "v0.0.1", "assets": []}"#,
            )
            .create_async()
            .await;

        let (director, _rx) = Director::new(Verbosity::Silent);
        let mut cfg = ClifpConfig::default();
        cfg.update.release_api_url = format!("{}/releases/latest", server.url());
        let (mut core, _abort) = Core::new(director, cfg);

        let mut command = UpdateCommand::new(UpdateArgs::default());
        command.perform(&mut core).await.unwrap();
        assert_eq!(core.task_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_update_enqueues_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name": "CLIFp shiny", "tag_name": "v99.0.0", "assets": []}"#,
            )
            .create_async()
            .await;

        // Full verbosity so the YesOrNo request reaches the scripted frontend,
        // which declines it.
        let (director, mut rx) = Director::new(Verbosity::Full);
        let responder = tokio::spawn(async move {
            while let Some(directive) = rx.recv().await {
                if let crate::services::director::Directive::Request { payload, reply, .. } =
                    directive
                {
                    assert!(matches!(payload, RequestDirective::YesOrNo { .. }));
                    let _ = reply.send(crate::domain::directive::DirectiveResponse::YesNo(false));
                }
            }
        });

        let mut cfg = ClifpConfig::default();
        cfg.update.release_api_url = format!("{}/releases/latest", server.url());
        let (mut core, _abort) = Core::new(director, cfg);

        let mut command = UpdateCommand::new(UpdateArgs::default());
        command.perform(&mut core).await.unwrap();
        assert_eq!(core.task_count(), 0);

        drop(core);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let (director, _rx) = Director::new(Verbosity::Silent);
        let mut cfg = ClifpConfig::default();
        cfg.update.release_api_url = "http://127.0.0.1:1/releases/latest".into();
        let (mut core, _abort) = Core::new(director, cfg);

        let mut command = UpdateCommand::new(UpdateArgs::default());
        let err = command.perform(&mut core).await.unwrap_err();
        assert!(matches!(
            err,
            ClifpError::Update(UpdateError::ConnectionError(_))
        ));
    }
}
