//! Display a message or open an extras folder.

use async_trait::async_trait;

use crate::cli::types::ShowArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CommandError};
use crate::domain::task::Stage;
use crate::services::core::Core;
use crate::services::driver::Command;
use crate::services::task::{TExtra, TMessage};

const USAGE: &str = "Usage:\n\
    show <options>\n\n\
    Options:\n\
    -m | --msg: Displays a pop-up dialog with the supplied message. Used primarily for some additional apps\n\
    -e | --extra: Opens an explorer window to the specified extra. Used primarily for some additional apps\n\n\
    One of -m or -e is required";

pub struct ShowCommand {
    args: ShowArgs,
}

impl ShowCommand {
    pub const NAME: &'static str = "show";

    pub fn new(args: ShowArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for ShowCommand {
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

        if let Some(message) = &self.args.message {
            let task = TMessage::new(core.tagged(TMessage::NAME), Stage::Primary, message)
                .selectable(true)
                .blocking(true);
            core.enqueue_single_task(Box::new(task));
            return Ok(());
        }

        if let Some(extra) = &self.args.extra {
            let dir = core.fp_install().extras_dir().join(extra);
            let task = TExtra::new(core.tagged(TExtra::NAME), Stage::Primary, dir);
            core.enqueue_single_task(Box::new(task));
            return Ok(());
        }

        Err(CommandError::MissingRequiredOption(Self::NAME.into(), "-m or -e".into()).into())
    }
}
