//! Per-run context shared by commands and the driver.
//!
//! Owns the archive install handle, the services mode, the FIFO task queue,
//! the environment template for child titles, and the decision logic that
//! turns configuration and data pack fingerprints into queued tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::config::ClifpConfig;
use crate::domain::directive::{AsyncDirective, DirectiveResponse, RequestDirective, Verbosity};
use crate::domain::error::{ClifpError, CoreError, DownloadError};
use crate::domain::game::GameData;
use crate::domain::settings::KnownDaemon;
use crate::domain::task::{ProcessType, Stage};
use crate::infrastructure::archive::{hash_file, ArchiveAccess};
use crate::infrastructure::database::FIND_ENTRY_LIMIT;
use crate::infrastructure::install::{Edition, FlashpointInstall};
use crate::infrastructure::process::ProcessBider;
use crate::services::director::{Director, Directorate};
use crate::services::mounter::proxy::DEFAULT_PROXY_PORT;
use crate::services::mounter::qmp::DEFAULT_QMP_PORT;
use crate::services::mounter::router::DEFAULT_ROUTER_PORT;
use crate::services::process::DeferredProcessManager;
use crate::services::task::extract::PACK_CONTENT_DIR;
use crate::services::task::{
    ExecParams, TAwaitDocker, TDownload, TExec, TExtract, TGeneric, TMount, TSleep, Task,
};

/// Whether CLIFp runs services itself or borrows the launcher's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicesMode {
    Standalone,
    Companion,
}

/// Whether a data pack run includes the mount step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPackMode {
    /// Obtain, extract when required, and mount when required.
    Full,
    /// Obtain (and extract when required) only; preloading.
    ObtainOnly,
}

/// Container the game server runs in when docker is the daemon.
const DOCKER_IMAGE_NAME: &str = "gamezip";
const DOCKER_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Settle delay after launching background services.
const SERVICE_SETTLE_DELAY: Duration = Duration::from_millis(1500);

pub struct Core {
    dirate: Directorate,
    cfg: ClifpConfig,
    install: Option<Arc<FlashpointInstall>>,
    services_mode: ServicesMode,
    queue: VecDeque<Box<dyn Task>>,
    child_env: HashMap<String, String>,
    deferred: Arc<DeferredProcessManager>,
    games_archive: Option<Arc<ArchiveAccess>>,
    abort_tx: mpsc::UnboundedSender<CoreError>,
}

impl Core {
    pub const NAME: &'static str = "core";

    /// Build the core plus the channel it signals aborts on.
    pub fn new(
        director: Arc<Director>,
        cfg: ClifpConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CoreError>) {
        let dirate = Directorate::new(Self::NAME, director);
        let deferred = Arc::new(DeferredProcessManager::new(Directorate::new(
            "DeferredProcessManager",
            Arc::clone(dirate.director()),
        )));
        let (abort_tx, abort_rx) = mpsc::unbounded_channel();

        (
            Self {
                dirate,
                cfg,
                install: None,
                services_mode: ServicesMode::Standalone,
                queue: VecDeque::new(),
                child_env: HashMap::new(),
                deferred,
                games_archive: None,
                abort_tx,
            },
            abort_rx,
        )
    }

    /// Apply global options and log the invocation.
    pub fn initialize(&self, quiet: bool, silent: bool, raw_args: &[String]) {
        self.dirate.log_event("Initializing CLIFp...");
        let shown = if raw_args.is_empty() {
            "*None*".to_string()
        } else {
            raw_args.join(" ")
        };
        self.dirate.log_event(&format!("Global Options: {shown}"));

        if silent {
            self.dirate.director().set_verbosity(Verbosity::Silent);
        } else if quiet {
            self.dirate.director().set_verbosity(Verbosity::Quiet);
        }
    }

    pub fn directorate(&self) -> &Directorate {
        &self.dirate
    }

    pub fn director(&self) -> &Arc<Director> {
        self.dirate.director()
    }

    pub fn config(&self) -> &ClifpConfig {
        &self.cfg
    }

    pub fn mode(&self) -> ServicesMode {
        self.services_mode
    }

    pub fn set_services_mode(&mut self, mode: ServicesMode) {
        self.services_mode = mode;
        let label = match mode {
            ServicesMode::Standalone => "standalone",
            ServicesMode::Companion => "companion",
        };
        self.dirate
            .log_event(&format!("Services mode set: {label}"));
    }

    /// Bind an opened install for the rest of the run.
    pub fn attach_flashpoint(&mut self, install: Arc<FlashpointInstall>) {
        self.dirate.log_event(&format!(
            "Flashpoint version: {}",
            install.version_string()
        ));
        if let Some(daemon) = install.daemon() {
            self.dirate
                .log_event(&format!("Recognized daemon: {daemon}"));
        }

        self.child_env = build_child_title_env(&self.dirate);
        if install.edition() == Edition::Ultimate {
            self.games_archive = Some(Arc::new(ArchiveAccess::new(install.root())));
        }
        self.install = Some(install);
    }

    pub fn has_install(&self) -> bool {
        self.install.is_some()
    }

    /// The bound install. Commands only run after `attach_flashpoint`.
    pub fn fp_install(&self) -> &Arc<FlashpointInstall> {
        self.install
            .as_ref()
            .expect("install queried before attach_flashpoint")
    }

    pub fn child_title_env(&self) -> &HashMap<String, String> {
        &self.child_env
    }

    pub fn deferred_manager(&self) -> &Arc<DeferredProcessManager> {
        &self.deferred
    }

    // Queue access

    pub fn enqueue_single_task(&mut self, task: Box<dyn Task>) {
        self.dirate.log_event(&format!(
            "Enqueued {} [{}]: {{{}}}",
            task.name(),
            task.stage(),
            task.members().join(", ")
        ));
        self.queue.push_back(task);
    }

    pub fn task_count(&self) -> usize {
        self.queue.len()
    }

    pub fn has_tasks(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn take_front_task(&mut self) -> Option<Box<dyn Task>> {
        self.queue.pop_front()
    }

    // Startup / shutdown

    /// Queue service starts per configuration.
    pub fn enqueue_startup_tasks(&mut self, server_override: Option<&str>) -> Result<(), ClifpError> {
        self.dirate.log_event("Enqueuing startup tasks...");

        if self.services_mode == ServicesMode::Companion {
            if server_override.is_some() {
                return Err(CoreError::CompanionModeServerOverride.into());
            }
            self.dirate
                .log_event("Using services from standard Launcher due to companion mode.");
            return Ok(());
        }

        let install = Arc::clone(self.fp_install());

        for step in install.start_steps() {
            let task = self.make_exec(
                &install,
                &step.program(),
                ExecParams::List(step.arguments.clone()),
                ProcessType::Blocking,
                Stage::Startup,
                &step.filename,
            );
            self.enqueue_single_task(Box::new(task));
        }

        let mut services_started = false;

        if install.launcher_config().start_server || server_override.is_some() {
            let (name, entry) = install.server_entry(server_override);
            let Some(server) = entry else {
                return Err(CoreError::ConfiguredServerMissing(name).into());
            };
            let task = self.make_exec(
                &install,
                &server.program(),
                ExecParams::List(server.arguments.clone()),
                ProcessType::Deferred,
                Stage::Startup,
                &server.name,
            );
            self.enqueue_single_task(Box::new(task));
            services_started = true;
        }

        for daemon in install.daemons() {
            let task = self.make_exec(
                &install,
                &daemon.program(),
                ExecParams::List(daemon.arguments.clone()),
                ProcessType::Deferred,
                Stage::Startup,
                &daemon.name,
            );
            self.enqueue_single_task(Box::new(task));
            services_started = true;
        }

        if services_started {
            let sleep = TSleep::new(
                self.tagged(TSleep::NAME),
                Stage::Startup,
                SERVICE_SETTLE_DELAY,
            );
            self.enqueue_single_task(Box::new(sleep));
        }

        #[cfg(unix)]
        if install.daemon() == Some(KnownDaemon::Docker) {
            let await_docker = TAwaitDocker::new(
                self.tagged(TAwaitDocker::NAME),
                Stage::Startup,
                DOCKER_IMAGE_NAME,
                DOCKER_START_TIMEOUT,
            );
            self.enqueue_single_task(Box::new(await_docker));
        }

        Ok(())
    }

    /// Queue service stops and the deferred sweep.
    pub fn enqueue_shutdown_tasks(&mut self) {
        self.dirate.log_event("Enqueuing shutdown tasks...");

        if self.services_mode == ServicesMode::Companion {
            return;
        }
        let Some(install) = self.install.as_ref().map(Arc::clone) else {
            return;
        };

        for step in install.stop_steps() {
            let task = self.make_exec(
                &install,
                &step.program(),
                ExecParams::List(step.arguments.clone()),
                ProcessType::Blocking,
                Stage::Shutdown,
                &step.filename,
            );
            self.enqueue_single_task(Box::new(task));
        }

        let deferred = Arc::clone(&self.deferred);
        let sweep = TGeneric::new(
            self.tagged(TGeneric::NAME),
            Stage::Shutdown,
            "Closing deferred processes...",
            Box::pin(async move {
                deferred.close_all().await;
                Ok(())
            }),
        );
        self.enqueue_single_task(Box::new(sweep));
    }

    // Data packs

    /// Queue the minimal set of {obtain, extract, mount} for a pack.
    pub async fn enqueue_data_pack_tasks(
        &mut self,
        game_data: &GameData,
        mode: DataPackMode,
    ) -> Result<(), ClifpError> {
        self.dirate.log_event("Enqueuing Data Pack tasks...");

        let install = Arc::clone(self.fp_install());
        let pack_path = install.data_packs_dir().join(game_data.file_name());
        self.dirate.log_event(&format!(
            "Title Data Pack path is: {}",
            pack_path.display()
        ));

        let mut need_obtain = true;
        if pack_path.is_file() {
            let digest = hash_file(&pack_path)
                .await
                .map_err(|e| CoreError::CannotObtainDatapack(e.to_string()))?;
            if digest.eq_ignore_ascii_case(&game_data.sha256) {
                self.dirate.log_event(
                    "Title Data Pack with correct hash is already present, no need to download",
                );
                need_obtain = false;
            } else {
                // The stale pack will be replaced; flag it so the run record
                // shows why.
                self.dirate
                    .post_error(&ClifpError::from(DownloadError::ChecksumMismatch));
            }
        } else {
            self.dirate
                .log_event("Title Data Pack is not available locally");
        }

        if need_obtain {
            self.enqueue_pack_obtain_tasks(&install, game_data, &pack_path)?;
        }

        if game_data.wants_extraction() {
            self.dirate
                .log_event("Title Data Pack requires extraction");
            let dest = install.extracted_games_dir().join(pack_stem(game_data));
            if dest.is_dir() && !need_obtain {
                self.dirate.log_event("Extracted files already present");
            } else {
                let extract = TExtract::new(
                    self.tagged(TExtract::NAME),
                    Stage::Primary,
                    pack_path.clone(),
                    PACK_CONTENT_DIR,
                    dest,
                );
                self.enqueue_single_task(Box::new(extract));
            }
            return Ok(());
        }

        if let Some(params) = game_data.parameters.as_deref() {
            let unknown: Vec<&str> = params
                .split_whitespace()
                .filter(|t| !matches!(*t, "-extract" | "-mountOnly"))
                .collect();
            if !unknown.is_empty() {
                self.dirate
                    .post_error(&CoreError::UnknownDatapackParam(unknown.join(" ")).into());
            }
        }

        if mode == DataPackMode::Full {
            match install.daemon() {
                Some(daemon) => {
                    self.dirate.log_event("Title Data Pack requires mounting");
                    let mount = TMount::new(
                        self.tagged(TMount::NAME),
                        Stage::Primary,
                        game_data.game_id,
                        pack_path.to_string_lossy().into_owned(),
                        Some(daemon),
                        DEFAULT_PROXY_PORT,
                        DEFAULT_ROUTER_PORT,
                        DEFAULT_QMP_PORT,
                        Duration::from_millis(self.cfg.net.transfer_timeout_ms),
                        Duration::from_millis(self.cfg.net.qmp_timeout_ms),
                    );
                    self.enqueue_single_task(Box::new(mount));
                }
                None => {
                    self.dirate
                        .log_event("No recognized daemon; skipping mount");
                }
            }
        }

        Ok(())
    }

    fn enqueue_pack_obtain_tasks(
        &mut self,
        install: &Arc<FlashpointInstall>,
        game_data: &GameData,
        pack_path: &std::path::Path,
    ) -> Result<(), ClifpError> {
        if let Some(archive) = self.games_archive.as_ref().map(Arc::clone) {
            self.dirate
                .log_event("Retrieving Data Pack from archive");
            let file_name = game_data.file_name().to_string();
            let sha = game_data.sha256.clone();
            let dest = pack_path.to_path_buf();
            let fetch = TGeneric::new(
                self.tagged(TGeneric::NAME),
                Stage::Primary,
                "Sourcing Data Pack from the games store",
                Box::pin(async move {
                    archive.source_pack(&file_name, &sha, &dest).await?;
                    Ok(())
                }),
            );
            self.enqueue_single_task(Box::new(fetch));
        } else {
            let base = install
                .data_pack_source_url()
                .ok_or_else(|| {
                    CoreError::CannotObtainDatapack("no data pack source is configured".into())
                })?
                .trim_end_matches('/')
                .to_string();
            let url = format!("{base}/{}", game_data.path);

            let download = TDownload::new(
                self.tagged(TDownload::NAME),
                Stage::Primary,
                install.data_packs_dir(),
                game_data.file_name().to_string(),
                url,
                game_data.sha256.clone(),
                Duration::from_millis(self.cfg.net.transfer_timeout_ms),
            );
            self.enqueue_single_task(Box::new(download));
        }

        self.add_on_disk_update_task(install, game_data.id);
        Ok(())
    }

    /// Record a freshly obtained pack in the database.
    fn add_on_disk_update_task(&mut self, install: &Arc<FlashpointInstall>, data_id: i64) {
        let db = install.database().clone();
        let update = TGeneric::new(
            self.tagged(TGeneric::NAME),
            Stage::Primary,
            "Marking Data Pack as present on disk",
            Box::pin(async move {
                db.update_game_data_on_disk(data_id, true).await?;
                Ok(())
            }),
        );
        self.enqueue_single_task(Box::new(update));
    }

    // Title search helpers

    /// Resolve a game id from a title, prompting on ambiguity.
    pub async fn find_game_id_from_title(
        &mut self,
        title: &str,
        exact: bool,
    ) -> Result<Uuid, ClifpError> {
        self.dirate
            .log_event(&format!("Searching for game with title '{title}'"));

        let games = self
            .fp_install()
            .database()
            .search_games_by_title(title, exact)
            .await?;
        self.dirate.log_event(&format!(
            "Found {} ID(s) when searching for title {title}",
            games.len()
        ));

        match games.len() {
            0 => Err(CoreError::TitleNotFound.into()),
            1 => Ok(games[0].id),
            n if n > FIND_ENTRY_LIMIT => Err(CoreError::TooManyResults.into()),
            _ => {
                self.dirate
                    .log_event("Prompting user to disambiguate multiple IDs...");
                let items: Vec<String> = games
                    .iter()
                    .map(|g| {
                        format!(
                            "[{}] {} ({}) {{{}}}",
                            g.platform, g.title, g.developer, g.id
                        )
                    })
                    .collect();
                let response = self
                    .dirate
                    .post_request(RequestDirective::ItemSelection {
                        caption: "Title Disambiguation".into(),
                        label: "Title to start:".into(),
                        items,
                    })
                    .await;
                self.selected_id(&response)
            }
        }
    }

    /// Resolve an additional-app id from its name under a parent title.
    pub async fn find_add_app_id_from_name(
        &mut self,
        parent: Uuid,
        name: &str,
        exact: bool,
    ) -> Result<Uuid, ClifpError> {
        self.dirate.log_event(&format!(
            "Searching for additional-app with title '{name}' and parent {parent}"
        ));

        let apps = self
            .fp_install()
            .database()
            .search_add_apps_by_name(parent, name, exact)
            .await?;

        match apps.len() {
            0 => Err(CoreError::TitleNotFound.into()),
            1 => Ok(apps[0].id),
            n if n > FIND_ENTRY_LIMIT => Err(CoreError::TooManyResults.into()),
            _ => {
                self.dirate
                    .log_event("Prompting user to disambiguate multiple IDs...");
                let items: Vec<String> = apps
                    .iter()
                    .map(|a| format!("{} {{{}}}", a.name, a.id))
                    .collect();
                let response = self
                    .dirate
                    .post_request(RequestDirective::ItemSelection {
                        caption: "Title Disambiguation".into(),
                        label: "Title to start:".into(),
                        items,
                    })
                    .await;
                self.selected_id(&response)
            }
        }
    }

    fn selected_id(&self, response: &DirectiveResponse) -> Result<Uuid, ClifpError> {
        let Some(text) = response.as_text().filter(|t| !t.is_empty()) else {
            self.dirate
                .log_event("Title selection was canceled by the user.");
            return Err(ClifpError::Cancelled);
        };

        // Items embed the id in a trailing {uuid}.
        let id = text
            .rsplit('{')
            .next()
            .and_then(|tail| tail.strip_suffix('}'))
            .and_then(|raw| Uuid::parse_str(raw).ok());

        match id {
            Some(id) => {
                self.dirate
                    .log_event(&format!("ID of selected title determined to be {id}"));
                Ok(id)
            }
            None => Err(CoreError::InvalidOptions(format!("unparsable selection '{text}'")).into()),
        }
    }

    /// Resolve an app path through the install's override table.
    pub fn resolve_full_app_path(&self, app_path: &str) -> std::path::PathBuf {
        let cleaned = crate::services::task::exec::strip_redundant_quotes(app_path);
        let mapped = self.fp_install().resolve_app_path(cleaned);
        if mapped != cleaned {
            self.dirate.log_event(&format!(
                "App path \"{cleaned}\" maps to alternative \"{mapped}\"."
            ));
        }
        self.fp_install().absolutize(&mapped)
    }

    /// Companion mode: bide on the launcher and abort if it closes.
    pub fn watch_launcher(&self) {
        self.dirate
            .log_event("Starting bide on Launcher process...");

        let name = self.fp_install().launcher_process_name();
        let bider = ProcessBider::new(
            name,
            Duration::from_millis(self.cfg.bider.respawn_grace_ms),
            Duration::from_millis(self.cfg.bider.poll_rate_ms),
        );
        let abort_tx = self.abort_tx.clone();
        let dirate = self.dirate.clone();

        tokio::spawn(async move {
            if let Ok(crate::domain::task::BideOutcome::Ran) = bider.bide().await {
                dirate.log_event(
                    "CLIFp cannot continue running in companion mode without the launcher's services.",
                );
                let _ = abort_tx.send(CoreError::CompanionModeLauncherClose);
            }
        });
    }

    /// Post a status headline for the frontend.
    pub fn set_status(&self, heading: &str, message: &str) {
        self.dirate.post_async(AsyncDirective::StatusUpdate {
            heading: heading.to_string(),
            message: message.to_string(),
        });
    }

    /// Build a TExec with the child-title environment, for arbitrary paths.
    pub fn build_exec(
        &self,
        executable: String,
        directory: std::path::PathBuf,
        params: ExecParams,
        process_type: ProcessType,
        stage: Stage,
        identifier: &str,
    ) -> TExec {
        TExec::new(
            self.tagged(TExec::NAME),
            stage,
            executable,
            directory,
            params,
            self.child_env.clone(),
            process_type,
            identifier,
            Arc::clone(&self.deferred),
        )
    }

    /// Build a TExec against the install with the child-title environment.
    fn make_exec(
        &self,
        install: &Arc<FlashpointInstall>,
        program: &str,
        params: ExecParams,
        process_type: ProcessType,
        stage: Stage,
        identifier: &str,
    ) -> TExec {
        let program_path = install.absolutize(program);
        let directory = program_path
            .parent()
            .map_or_else(|| install.root().to_path_buf(), std::path::Path::to_path_buf);

        TExec::new(
            self.tagged(TExec::NAME),
            stage,
            program_path.to_string_lossy().into_owned(),
            directory,
            params,
            self.child_env.clone(),
            process_type,
            identifier,
            Arc::clone(&self.deferred),
        )
    }

    /// A directorate tagged for a component constructed on the core's behalf.
    pub fn tagged(&self, name: &'static str) -> Directorate {
        Directorate::new(name, Arc::clone(self.dirate.director()))
    }
}

/// Environment template child titles inherit.
fn build_child_title_env(dirate: &Directorate) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();

    #[cfg(target_os = "linux")]
    {
        if !gtk3_installed() {
            dirate.log_event("GTK3 isn't installed, setting GTK_USE_PORTAL=1");
            env.insert("GTK_USE_PORTAL".into(), "1".into());
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = dirate;

    env
}

#[cfg(target_os = "linux")]
fn gtk3_installed() -> bool {
    std::process::Command::new("ldconfig")
        .arg("-p")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains("libgtk-3"))
        .unwrap_or(false)
}

fn pack_stem(game_data: &GameData) -> String {
    std::path::Path::new(game_data.file_name())
        .file_stem()
        .map_or_else(|| game_data.file_name().to_string(), |s| {
            s.to_string_lossy().into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::task::TMessage;

    fn test_core() -> Core {
        let (director, _rx) = Director::new(Verbosity::Silent);
        let (core, _abort) = Core::new(director, ClifpConfig::default());
        core
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut core = test_core();
        for text in ["first", "second", "third"] {
            let task = TMessage::new(core.tagged(TMessage::NAME), Stage::Primary, text);
            core.enqueue_single_task(Box::new(task));
        }
        assert_eq!(core.task_count(), 3);

        let first = core.take_front_task().unwrap();
        assert!(first.members()[0].contains("first"));
        assert_eq!(core.task_count(), 2);
    }

    #[test]
    fn test_companion_mode_rejects_server_override() {
        let mut core = test_core();
        core.set_services_mode(ServicesMode::Companion);
        let err = core.enqueue_startup_tasks(Some("php-router")).unwrap_err();
        assert!(matches!(
            err,
            ClifpError::Core(CoreError::CompanionModeServerOverride)
        ));
        assert!(!core.has_tasks());
    }

    #[test]
    fn test_companion_mode_startup_enqueues_nothing() {
        let mut core = test_core();
        core.set_services_mode(ServicesMode::Companion);
        core.enqueue_startup_tasks(None).unwrap();
        assert!(!core.has_tasks());
    }

    #[test]
    fn test_pack_stem() {
        let gd = GameData {
            id: 1,
            game_id: Uuid::new_v4(),
            title: String::new(),
            date_added: None,
            sha256: String::new(),
            size: 0,
            path: "sub/abc-123.zip".into(),
            present_on_disk: false,
            parameters: None,
            application_path: None,
            launch_command: None,
        };
        assert_eq!(pack_stem(&gd), "abc-123");
    }
}
