//! Share a title as a `flashpoint://` URL, or manage the scheme handler.

use async_trait::async_trait;

use crate::cli::commands::title;
use crate::cli::types::ShareArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, ShareError};
use crate::services::core::Core;
use crate::services::driver::Command;

const USAGE: &str = "Usage:\n\
    share <options>\n\n\
    Options:\n\
    -i | --id: UUID of title to share\n\
    -t | --title: Title to share\n\
    -T | --title-strict: Same as -t, but exact matches only\n\
    -s | --subtitle: Name of additional-app under the title to share\n\
    -S | --subtitle-strict: Same as -s, but exact matches only\n\
    -r | --random: Share a random title (all/any, game/arcade, animation/theatre)\n\
    -c | --configure: Registers CLIFp at its current location to handle 'flashpoint://' links\n\
    -C | --unconfigure: Unregisters CLIFp as the 'flashpoint://' link handler if registered\n\
    -u | --universal: Creates a share URL that utilizes an https redirect for increased portability";

const SCHEME: &str = "flashpoint";
const SCHEME_TEMPLATE_STD: &str = "flashpoint://";
const SCHEME_TEMPLATE_UNI: &str = "https://oblivioncth.github.io/CLIFp/redirect.html?uuid=";
const HANDLER_ENTRY_NAME: &str = "clifp-protocol.desktop";

pub struct ShareCommand {
    args: ShareArgs,
}

impl ShareCommand {
    pub const NAME: &'static str = "share";

    pub fn new(args: ShareArgs) -> Self {
        Self { args }
    }
}

#[cfg(target_os = "linux")]
fn applications_dir() -> Result<std::path::PathBuf, ShareError> {
    dirs::data_dir()
        .map(|d| d.join("applications"))
        .ok_or_else(|| ShareError::RegistrationFailed("no applications directory".into()))
}

/// Install a handler entry and make it the scheme default.
#[cfg(target_os = "linux")]
fn register_scheme_handler() -> Result<(), ShareError> {
    let dir = applications_dir()?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| ShareError::RegistrationFailed(e.to_string()))?;

    let exe = std::env::current_exe()
        .map_err(|e| ShareError::RegistrationFailed(e.to_string()))?;
    let entry = format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Flashpoint (via CLIFp)\n\
         Exec=\"{}\" play -u %u\n\
         Terminal=false\n\
         NoDisplay=true\n\
         MimeType=x-scheme-handler/{SCHEME};\n",
        exe.display()
    );
    std::fs::write(dir.join(HANDLER_ENTRY_NAME), entry)
        .map_err(|e| ShareError::RegistrationFailed(e.to_string()))?;

    let status = std::process::Command::new("xdg-mime")
        .args([
            "default",
            HANDLER_ENTRY_NAME,
            &format!("x-scheme-handler/{SCHEME}"),
        ])
        .status()
        .map_err(|e| ShareError::RegistrationFailed(e.to_string()))?;
    if !status.success() {
        return Err(ShareError::RegistrationFailed(format!(
            "xdg-mime exited with {status}"
        )));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn unregister_scheme_handler() -> Result<(), ShareError> {
    let dir = applications_dir()
        .map_err(|e| ShareError::UnregistrationFailed(e.to_string()))?;
    let entry = dir.join(HANDLER_ENTRY_NAME);
    if entry.exists() {
        std::fs::remove_file(&entry)
            .map_err(|e| ShareError::UnregistrationFailed(e.to_string()))?;
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn register_scheme_handler() -> Result<(), ShareError> {
    Err(ShareError::RegistrationFailed(
        "scheme registration is not supported on this platform".into(),
    ))
}

#[cfg(not(target_os = "linux"))]
fn unregister_scheme_handler() -> Result<(), ShareError> {
    Err(ShareError::UnregistrationFailed(
        "scheme registration is not supported on this platform".into(),
    ))
}

#[async_trait]
impl Command for ShareCommand {
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

        core.set_status("Sharing", "Preparing share target");

        if self.args.configure {
            core.directorate()
                .log_event("Registering CLIFp to handle flashpoint protocol links...");
            register_scheme_handler()?;
            core.directorate().post_async(AsyncDirective::Message {
                text: "Successfully registered CLIFp to respond to 'flashpoint://' requests."
                    .into(),
                selectable: false,
            });
            return Ok(());
        }

        if self.args.unconfigure {
            core.directorate()
                .log_event("Removing CLIFp as the flashpoint protocol link handler...");
            unregister_scheme_handler()?;
            core.directorate().post_async(AsyncDirective::Message {
                text: "Successfully removed CLIFp as the 'flashpoint://' request handler.".into(),
                selectable: false,
            });
            return Ok(());
        }

        let id = title::resolve_title_id(core, &self.args.title).await?;
        let url = if self.args.universal {
            format!("{SCHEME_TEMPLATE_UNI}{id}")
        } else {
            format!("{SCHEME_TEMPLATE_STD}{id}")
        };
        core.directorate()
            .log_event(&format!("Share URL generated: {url}"));

        core.directorate()
            .post_async(AsyncDirective::ClipboardUpdate { text: url.clone() });
        core.directorate().post_async(AsyncDirective::Message {
            text: format!("Share URL placed in clipboard:\n\n{url}"),
            selectable: true,
        });
        Ok(())
    }
}
