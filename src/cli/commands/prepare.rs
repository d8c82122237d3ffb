//! Obtain a title's data pack without playing it.

use async_trait::async_trait;

use crate::cli::commands::title;
use crate::cli::types::PrepareArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CoreError};
use crate::services::core::{Core, DataPackMode};
use crate::services::driver::Command;

const USAGE: &str = "Usage:\n\
    prepare <options>\n\n\
    Options:\n\
    -i | --id: UUID of title to prepare\n\
    -t | --title: Title to prepare\n\
    -T | --title-strict: Same as -t, but exact matches only\n\
    -s | --subtitle: Name of additional-app under the title to prepare. Must be used with -t / -T\n\
    -S | --subtitle-strict: Same as -s, but exact matches only\n\
    -r | --random: Prepare a random title (all/any, game/arcade, animation/theatre)";

pub struct PrepareCommand {
    args: PrepareArgs,
}

impl PrepareCommand {
    pub const NAME: &'static str = "prepare";

    pub fn new(args: PrepareArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for PrepareCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn perform(&mut self, core: &mut Core) -> Result<(), ClifpError> {
        if self.args.help {
            core.directorate().post_async(AsyncDirective::Message {
                text: USAGE.into(),
                selectable: false,
            });
            return Ok(());
        }

        core.set_status("Preparing", "Resolving title");

        let id = title::resolve_title_id(core, &self.args.title).await?;
        let db = core.fp_install().database().clone();

        // An additional-app id prepares its parent's pack.
        let game = match db.game_by_id(id).await? {
            Some(game) => game,
            None => {
                let add_app = db
                    .add_app_by_id(id)
                    .await?
                    .ok_or(CoreError::TitleNotFound)?;
                db.game_by_id(add_app.parent_id)
                    .await?
                    .ok_or(CoreError::TitleNotFound)?
            }
        };

        match db.active_game_data(&game).await? {
            Some(game_data) => {
                core.enqueue_data_pack_tasks(&game_data, DataPackMode::ObtainOnly)
                    .await
            }
            None => {
                core.directorate().post_async(AsyncDirective::Message {
                    text: format!("'{}' does not use a data pack.", game.title),
                    selectable: false,
                });
                Ok(())
            }
        }
    }
}
