//! The canonical command: resolve a title and run its full session.

use async_trait::async_trait;
use std::path::Path;

use crate::cli::commands::title;
use crate::cli::types::PlayArgs;
use crate::domain::error::{ClifpError, CoreError};
use crate::domain::game::{AddApp, Game, GameData};
use crate::domain::task::{ProcessType, Stage};
use crate::services::core::{Core, DataPackMode};
use crate::services::driver::Command;
use crate::services::task::{ExecParams, TExtra, TMessage, TTitleExec};

const USAGE: &str = "Usage:\n\
    play <options>\n\n\
    Options:\n\
    -i | --id: UUID of title to start\n\
    -t | --title: Title to start\n\
    -T | --title-strict: Same as -t, but exact matches only\n\
    -s | --subtitle: Name of additional-app under the title to start. Must be used with -t / -T\n\
    -S | --subtitle-strict: Same as -s, but exact matches only\n\
    -r | --random: Select a random title from the database to start (all/any, game/arcade, animation/theatre)\n\
    -u | --url: Flashpoint protocol URL of the title to start\n\
    -f | --fullscreen: Runs the title in fullscreen mode, if supported.\n\
    --ruffle: Forces the use of Ruffle for Flash games.\n\
    --flash: Forces the use of the standard app (usually Flash Player) for Flash games.";

/// Relative path of the bundled Ruffle player.
#[cfg(windows)]
const RUFFLE_PATH: &str = "FPSoftware/Ruffle/ruffle.exe";
#[cfg(not(windows))]
const RUFFLE_PATH: &str = "FPSoftware/Ruffle/ruffle";

/// Map of executables (by lowercase basename) to their fullscreen switch.
fn fullscreen_param(executable_stem: &str) -> Option<&'static str> {
    match executable_stem {
        "ruffle" => Some("--fullscreen"),
        _ => None,
    }
}

/// A `-server <name>` token pair inside the pack parameters overrides the
/// configured game server.
fn server_override_from(game_data: &GameData) -> Option<String> {
    let params = game_data.parameters.as_deref()?;
    let mut tokens = params.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "-server" {
            return tokens.next().map(str::to_string);
        }
    }
    None
}

pub struct PlayCommand {
    args: PlayArgs,
}

impl PlayCommand {
    pub const NAME: &'static str = "play";

    pub fn new(args: PlayArgs) -> Self {
        Self { args }
    }

    async fn enqueue_session(
        &self,
        core: &mut Core,
        game: &Game,
        selected_add_app: Option<AddApp>,
    ) -> Result<(), ClifpError> {
        core.directorate().log_event("Handling automatic tasks...");
        let db = core.fp_install().database().clone();

        let game_data = db.active_game_data(game).await?;
        let server_override = game_data.as_ref().and_then(server_override_from);
        if let Some(server) = &server_override {
            core.directorate().log_event(&format!(
                "Selected title overrides the server to: {server}"
            ));
        }
        core.enqueue_startup_tasks(server_override.as_deref())?;

        for app in db.add_apps_of(game.id).await? {
            if app.autorun_before {
                core.directorate().log_event(&format!(
                    "Found autorun-before additional app: {}",
                    app.name
                ));
                self.enqueue_add_app(core, &app, Stage::Startup)?;
            }
        }

        if let Some(gd) = &game_data {
            core.directorate()
                .log_event("Selected title uses a data pack");
            core.enqueue_data_pack_tasks(gd, DataPackMode::Full).await?;
        }

        match selected_add_app {
            Some(app) => self.enqueue_add_app(core, &app, Stage::Primary)?,
            None => self.enqueue_primary_title(core, game, game_data.as_ref())?,
        }

        core.enqueue_shutdown_tasks();
        Ok(())
    }

    fn enqueue_add_app(
        &self,
        core: &mut Core,
        app: &AddApp,
        stage: Stage,
    ) -> Result<(), ClifpError> {
        if app.is_message() {
            let task = TMessage::new(core.tagged(TMessage::NAME), stage, &app.launch_command)
                .blocking(true);
            core.enqueue_single_task(Box::new(task));
            return Ok(());
        }

        if app.is_extra() {
            let dir = core.fp_install().extras_dir().join(&app.launch_command);
            let task = TExtra::new(core.tagged(TExtra::NAME), stage, dir);
            core.enqueue_single_task(Box::new(task));
            return Ok(());
        }

        let executable = core.resolve_full_app_path(&app.app_path);
        let directory = executable
            .parent()
            .map_or_else(|| core.fp_install().root().to_path_buf(), Path::to_path_buf);
        let process_type = if app.wait_exit || stage == Stage::Primary {
            ProcessType::Blocking
        } else {
            ProcessType::Deferred
        };

        let task = core.build_exec(
            executable.to_string_lossy().into_owned(),
            directory,
            ExecParams::Joined(app.launch_command.clone()),
            process_type,
            stage,
            &app.name,
        );
        core.enqueue_single_task(Box::new(task));
        Ok(())
    }

    fn enqueue_primary_title(
        &self,
        core: &mut Core,
        game: &Game,
        game_data: Option<&GameData>,
    ) -> Result<(), ClifpError> {
        let mut app_path = game_data
            .and_then(|gd| gd.application_path.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| game.app_path.clone());
        let launch_command = game_data
            .and_then(|gd| gd.launch_command.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| game.launch_command.clone());

        if self.args.ruffle && !self.args.flash {
            core.directorate()
                .log_event("Forcing the use of Ruffle for this title");
            app_path = RUFFLE_PATH.to_string();
        } else if self.args.flash {
            core.directorate()
                .log_event("Forcing the use of the standard Flash application for this title");
        }

        let executable = core.resolve_full_app_path(&app_path);
        let directory = executable
            .parent()
            .map_or_else(|| core.fp_install().root().to_path_buf(), Path::to_path_buf);

        let mut params = launch_command;
        if self.args.fullscreen {
            core.directorate().log_event("Fullscreen requested...");
            let stem = executable
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            match fullscreen_param(&stem) {
                Some(switch) => {
                    core.directorate()
                        .log_event(&format!("Fullscreen parameter: {switch}"));
                    params = format!("{switch} {params}");
                }
                None => core
                    .directorate()
                    .log_event("No fullscreen parameter is known for this application."),
            }
        }

        let exec = core.build_exec(
            executable.to_string_lossy().into_owned(),
            directory,
            ExecParams::Joined(params),
            ProcessType::Blocking,
            Stage::Primary,
            &game.title,
        );
        let task = TTitleExec::new(
            core.tagged(TTitleExec::NAME),
            exec,
            core.config().bider.clone(),
        );
        core.enqueue_single_task(Box::new(task));
        Ok(())
    }
}

#[async_trait]
impl Command for PlayCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn requires_services(&self) -> bool {
        true
    }

    async fn perform(&mut self, core: &mut Core) -> Result<(), ClifpError> {
        if self.args.help {
            core.directorate().post_async(
                crate::domain::directive::AsyncDirective::Message {
                    text: USAGE.into(),
                    selectable: false,
                },
            );
            return Ok(());
        }

        core.set_status("Playing", "Resolving title");

        let id = match &self.args.url {
            Some(url) => {
                let id = title::id_from_scheme_url(url)?;
                core.directorate().log_event(&format!("ID from URL: {id}"));
                id
            }
            None => title::resolve_title_id(core, &self.args.title).await?,
        };

        let db = core.fp_install().database().clone();
        if let Some(game) = db.game_by_id(id).await? {
            core.directorate()
                .log_event(&format!("ID matches main title: {}", game.title));
            self.enqueue_session(core, &game, None).await
        } else if let Some(add_app) = db.add_app_by_id(id).await? {
            let parent = db
                .game_by_id(add_app.parent_id)
                .await?
                .ok_or(CoreError::TitleNotFound)?;
            core.directorate().log_event(&format!(
                "ID matches additional app: {} (Child of {})",
                add_app.name, parent.title
            ));
            self.enqueue_session(core, &parent, Some(add_app)).await
        } else {
            Err(CoreError::TitleNotFound.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn game_data(parameters: Option<&str>) -> GameData {
        GameData {
            id: 1,
            game_id: Uuid::new_v4(),
            title: "t".into(),
            date_added: None,
            sha256: "aa".into(),
            size: 1,
            path: "pack.zip".into(),
            present_on_disk: false,
            parameters: parameters.map(str::to_string),
            application_path: None,
            launch_command: None,
        }
    }

    #[test]
    fn test_server_override_parsing() {
        assert_eq!(
            server_override_from(&game_data(Some("-server php-router"))),
            Some("php-router".to_string())
        );
        assert_eq!(server_override_from(&game_data(Some("-extract"))), None);
        assert_eq!(server_override_from(&game_data(None)), None);
        assert_eq!(server_override_from(&game_data(Some("-server"))), None);
    }

    #[test]
    fn test_fullscreen_param_table() {
        assert_eq!(fullscreen_param("ruffle"), Some("--fullscreen"));
        assert_eq!(fullscreen_param("flashplayer"), None);
    }
}
