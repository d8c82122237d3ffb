//! Start services, then run an arbitrary application.

use async_trait::async_trait;
use std::path::Path;

use crate::cli::types::RunArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CommandError};
use crate::domain::task::{ProcessType, Stage};
use crate::services::core::Core;
use crate::services::driver::Command;
use crate::services::task::ExecParams;

const USAGE: &str = "Usage:\n\
    run <options>\n\n\
    Options:\n\
    *-a | --app: Relative (to the install) path of the application to launch\n\
    -p | --param: Command-line parameters to use when starting the application\n\n\
    *Required Option";

pub struct RunCommand {
    args: RunArgs,
}

impl RunCommand {
    pub const NAME: &'static str = "run";

    pub fn new(args: RunArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for RunCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn requires_services(&self) -> bool {
        true
    }

    async fn perform(&mut self, core: &mut Core) -> Result<(), ClifpError> {
        if self.args.help {
            core.directorate().post_async(AsyncDirective::Message {
                text: USAGE.into(),
                selectable: false,
            });
            return Ok(());
        }

        let Some(app) = self.args.app.clone() else {
            return Err(
                CommandError::MissingRequiredOption(Self::NAME.into(), "-a/--app".into()).into(),
            );
        };

        core.set_status("Running", &app);
        core.enqueue_startup_tasks(None)?;

        let executable = core.fp_install().absolutize(&app);
        let directory = executable
            .parent()
            .map_or_else(|| core.fp_install().root().to_path_buf(), Path::to_path_buf);
        let params = self
            .args
            .param
            .clone()
            .map_or(ExecParams::List(vec![]), ExecParams::Joined);

        let task = core.build_exec(
            executable.to_string_lossy().into_owned(),
            directory,
            params,
            ProcessType::Blocking,
            Stage::Primary,
            &app,
        );
        core.enqueue_single_task(Box::new(task));

        core.enqueue_shutdown_tasks();
        Ok(())
    }
}
