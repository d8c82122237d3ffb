//! Archive record types.
//!
//! Rows read from the archive's sqlite database: playable entries, their
//! additional apps, data pack records, and playlists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Special app paths an additional app can carry instead of an executable.
pub const SPEC_PATH_MESSAGE: &str = ":message:";
pub const SPEC_PATH_EXTRA: &str = ":extras:";

/// A playable entry (game or animation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub title: String,
    pub series: String,
    pub developer: String,
    pub publisher: String,
    pub platform: String,
    pub broken: bool,
    pub play_mode: String,
    pub status: String,
    pub notes: String,
    pub source: String,
    pub app_path: String,
    pub launch_command: String,
    pub version: String,
    pub order_title: String,
    pub library: String,
    /// Row id of the currently active data pack, if the title uses one.
    pub active_data_id: Option<i64>,
}

impl Game {
    /// Whether this entry can be launched at all.
    pub fn is_playable(&self) -> bool {
        !self.broken && !self.app_path.is_empty()
    }
}

/// An additional app attached to a game (configuration screens, extras,
/// alternate modes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddApp {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub name: String,
    pub app_path: String,
    pub launch_command: String,
    pub autorun_before: bool,
    pub wait_exit: bool,
}

impl AddApp {
    pub fn is_message(&self) -> bool {
        self.app_path == SPEC_PATH_MESSAGE
    }

    pub fn is_extra(&self) -> bool {
        self.app_path == SPEC_PATH_EXTRA
    }

    /// Playable means it launches an actual process, not a message or a
    /// folder, and is not an autorun-before helper.
    pub fn is_playable(&self) -> bool {
        !self.is_message() && !self.is_extra() && !self.autorun_before
    }
}

/// A content-addressed data pack record for a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub id: i64,
    pub game_id: Uuid,
    pub title: String,
    pub date_added: Option<DateTime<Utc>>,
    pub sha256: String,
    pub size: i64,
    /// Relative pack filename under the data packs folder.
    pub path: String,
    pub present_on_disk: bool,
    /// Launch parameters recorded with the pack, e.g. `-extract`.
    pub parameters: Option<String>,
    pub application_path: Option<String>,
    pub launch_command: Option<String>,
}

impl GameData {
    /// The pack's bare filename.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Whether the recorded parameters ask for on-disk extraction rather than
    /// a mount.
    pub fn wants_extraction(&self) -> bool {
        self.parameters
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|t| t == "-extract"))
    }
}

/// A curated playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author: String,
}

/// A playlist membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistGame {
    pub id: i64,
    pub playlist_id: Uuid,
    pub order: i64,
    pub game_id: Uuid,
}

/// Library restriction for random title selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFilter {
    Either,
    Game,
    Anim,
}

impl LibraryFilter {
    /// Accepted spellings per filter, as offered on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" | "any" => Some(Self::Either),
            "game" | "arcade" => Some(Self::Game),
            "animation" | "theatre" => Some(Self::Anim),
            _ => None,
        }
    }

    /// The `library` column value this filter matches, if restricted.
    pub fn library_value(&self) -> Option<&'static str> {
        match self {
            Self::Either => None,
            Self::Game => Some("arcade"),
            Self::Anim => Some("theatre"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_add_app(app_path: &str, autorun: bool) -> AddApp {
        AddApp {
            id: Uuid::new_v4(),
            parent_id: Uuid::new_v4(),
            name: "Extras".into(),
            app_path: app_path.into(),
            launch_command: String::new(),
            autorun_before: autorun,
            wait_exit: false,
        }
    }

    #[test]
    fn test_add_app_spec_paths() {
        assert!(sample_add_app(SPEC_PATH_MESSAGE, false).is_message());
        assert!(sample_add_app(SPEC_PATH_EXTRA, false).is_extra());
        assert!(!sample_add_app("FPSoftware/player.exe", false).is_message());
    }

    #[test]
    fn test_add_app_playability() {
        assert!(sample_add_app("FPSoftware/player.exe", false).is_playable());
        assert!(!sample_add_app(SPEC_PATH_MESSAGE, false).is_playable());
        assert!(!sample_add_app("FPSoftware/player.exe", true).is_playable());
    }

    #[test]
    fn test_game_data_file_name() {
        let gd = GameData {
            id: 1,
            game_id: Uuid::new_v4(),
            title: "t".into(),
            date_added: None,
            sha256: "aa".into(),
            size: 10,
            path: "packs/abc-123.zip".into(),
            present_on_disk: false,
            parameters: None,
            application_path: None,
            launch_command: None,
        };
        assert_eq!(gd.file_name(), "abc-123.zip");
    }

    #[test]
    fn test_game_data_extraction_parameter() {
        let mut gd = GameData {
            id: 1,
            game_id: Uuid::new_v4(),
            title: "t".into(),
            date_added: None,
            sha256: "aa".into(),
            size: 10,
            path: "abc.zip".into(),
            present_on_disk: false,
            parameters: Some("-extract".into()),
            application_path: None,
            launch_command: None,
        };
        assert!(gd.wants_extraction());
        gd.parameters = None;
        assert!(!gd.wants_extraction());
        gd.parameters = Some("-mountOnly".into());
        assert!(!gd.wants_extraction());
    }

    #[test]
    fn test_library_filter_spellings() {
        assert_eq!(LibraryFilter::parse("all"), Some(LibraryFilter::Either));
        assert_eq!(LibraryFilter::parse("ANY"), Some(LibraryFilter::Either));
        assert_eq!(LibraryFilter::parse("game"), Some(LibraryFilter::Game));
        assert_eq!(LibraryFilter::parse("arcade"), Some(LibraryFilter::Game));
        assert_eq!(LibraryFilter::parse("animation"), Some(LibraryFilter::Anim));
        assert_eq!(LibraryFilter::parse("theatre"), Some(LibraryFilter::Anim));
        assert_eq!(LibraryFilter::parse("nonsense"), None);
    }
}
