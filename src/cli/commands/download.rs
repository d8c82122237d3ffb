//! Preload the data packs of a whole playlist.

use async_trait::async_trait;

use crate::cli::types::DownloadArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CommandError, CoreError};
use crate::services::core::{Core, DataPackMode};
use crate::services::driver::Command;

const USAGE: &str = "Usage:\n\
    download <options>\n\n\
    Options:\n\
    *-p | --playlist: Name of the playlist to download data packs for\n\n\
    *Required Option";

pub struct DownloadCommand {
    args: DownloadArgs,
}

impl DownloadCommand {
    pub const NAME: &'static str = "download";

    pub fn new(args: DownloadArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for DownloadCommand {
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

        let Some(playlist_name) = self.args.playlist.clone() else {
            return Err(
                CommandError::MissingRequiredOption(Self::NAME.into(), "-p/--playlist".into())
                    .into(),
            );
        };

        core.set_status("Downloading", &playlist_name);

        let db = core.fp_install().database().clone();
        let playlist = db
            .playlist_by_title(&playlist_name)
            .await?
            .ok_or(CoreError::TitleNotFound)?;
        core.directorate()
            .log_event(&format!("Found playlist \"{}\"", playlist.title));

        let members = db.playlist_games(playlist.id).await?;
        let mut packs = 0usize;
        for member in &members {
            let Some(game) = db.game_by_id(member.game_id).await? else {
                continue;
            };
            if let Some(game_data) = db.active_game_data(&game).await? {
                core.enqueue_data_pack_tasks(&game_data, DataPackMode::ObtainOnly)
                    .await?;
                packs += 1;
            }
        }

        core.directorate().log_event(&format!(
            "{packs} of {} playlist entries use data packs",
            members.len()
        ));
        if packs == 0 {
            core.directorate().post_async(AsyncDirective::Message {
                text: format!("No titles in \"{}\" use data packs.", playlist.title),
                selectable: false,
            });
        }
        Ok(())
    }
}
