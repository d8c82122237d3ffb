//! Create a desktop shortcut that plays a title through this binary.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::cli::commands::title;
use crate::cli::types::LinkArgs;
use crate::domain::directive::{AsyncDirective, RequestDirective};
use crate::domain::error::{ClifpError, CoreError, LinkError};
use crate::services::core::Core;
use crate::services::driver::Command;

const USAGE: &str = "Usage:\n\
    link <options>\n\n\
    Options:\n\
    -i | --id: UUID of title to make a shortcut for\n\
    -t | --title: Title to make a shortcut for\n\
    -T | --title-strict: Same as -t, but exact matches only\n\
    -s | --subtitle: Name of additional-app under the title to make a shortcut for\n\
    -S | --subtitle-strict: Same as -s, but exact matches only\n\
    -r | --random: Make a shortcut for a random title (all/any, game/arcade, animation/theatre)\n\
    -p | --path: Directory to place the shortcut in\n\
    -n | --name: Name of the shortcut";

pub struct LinkCommand {
    args: LinkArgs,
}

impl LinkCommand {
    pub const NAME: &'static str = "link";

    pub fn new(args: LinkArgs) -> Self {
        Self { args }
    }

    async fn shortcut_dir(&self, core: &Core) -> Result<Option<PathBuf>, ClifpError> {
        if let Some(path) = &self.args.path {
            return Ok(Some(path.clone()));
        }

        let starting = dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let response = core
            .directorate()
            .post_request(RequestDirective::ExistingDir {
                caption: "Select shortcut directory".into(),
                starting_dir: starting.display().to_string(),
            })
            .await;

        match response.as_text() {
            Some(text) if !text.is_empty() => Ok(Some(PathBuf::from(text))),
            _ => Ok(None),
        }
    }
}

/// Write a freedesktop launcher entry.
#[cfg(unix)]
fn write_shortcut(dir: &PathBuf, name: &str, id: uuid::Uuid) -> Result<PathBuf, LinkError> {
    use std::os::unix::fs::PermissionsExt;

    if !dir.is_dir() {
        return Err(LinkError::InvalidPath(dir.display().to_string()));
    }

    let exe = std::env::current_exe()
        .map_err(|e| LinkError::ShortcutCreationFailed(e.to_string()))?;
    let path = dir.join(format!("{name}.desktop"));
    let content = format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Comment=Play {name} via Flashpoint\n\
         Exec=\"{}\" play -i {id}\n\
         Terminal=false\n\
         Categories=Game;\n",
        exe.display()
    );

    std::fs::write(&path, content)
        .map_err(|e| LinkError::ShortcutCreationFailed(e.to_string()))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| LinkError::ShortcutCreationFailed(e.to_string()))?;
    Ok(path)
}

#[cfg(not(unix))]
fn write_shortcut(dir: &PathBuf, _name: &str, _id: uuid::Uuid) -> Result<PathBuf, LinkError> {
    Err(LinkError::ShortcutCreationFailed(format!(
        "shortcut creation is not supported on this platform ({})",
        dir.display()
    )))
}

#[async_trait]
impl Command for LinkCommand {
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

        core.set_status("Linking", "Resolving title");

        let id = title::resolve_title_id(core, &self.args.title).await?;
        let db = core.fp_install().database().clone();

        let default_name = if let Some(game) = db.game_by_id(id).await? {
            game.title
        } else if let Some(add_app) = db.add_app_by_id(id).await? {
            let parent = db
                .game_by_id(add_app.parent_id)
                .await?
                .ok_or(CoreError::TitleNotFound)?;
            format!("{} ({})", parent.title, add_app.name)
        } else {
            return Err(CoreError::TitleNotFound.into());
        };
        let name = self.args.name.clone().unwrap_or(default_name);

        let Some(dir) = self.shortcut_dir(core).await? else {
            core.directorate()
                .log_event("Shortcut directory selection was canceled by the user.");
            return Err(ClifpError::Cancelled);
        };

        let path = write_shortcut(&dir, &name, id)?;
        core.directorate()
            .log_event(&format!("Created shortcut at {}", path.display()));
        core.directorate().post_async(AsyncDirective::Message {
            text: format!("Created shortcut \"{name}\""),
            selectable: false,
        });
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_write_shortcut_creates_desktop_entry() {
        let dir = tempfile::tempdir().unwrap();
        let id = uuid::Uuid::parse_str("11111111-2222-3333-4444-555555555555").unwrap();

        let path = write_shortcut(&dir.path().to_path_buf(), "Interactive Buddy", id).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[Desktop Entry]"));
        assert!(content.contains("play -i 11111111-2222-3333-4444-555555555555"));
        assert!(content.contains("Name=Interactive Buddy"));
    }

    #[test]
    fn test_write_shortcut_rejects_missing_dir() {
        let id = uuid::Uuid::new_v4();
        let err = write_shortcut(&PathBuf::from("/nonexistent/desktop"), "X", id).unwrap_err();
        assert!(matches!(err, LinkError::InvalidPath(_)));
    }
}
