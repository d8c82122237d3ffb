//! Query surface over `Data/flashpoint.sqlite`.
//!
//! Only the handful of lookups the pipeline needs: entry resolution by id or
//! title, data pack records, playlists, and random playable selection. The
//! database is opened read-only except for the `presentOnDisk` bookkeeping
//! flag updated after a verified download.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::error::DatabaseError;
use crate::domain::game::{AddApp, Game, GameData, LibraryFilter, Playlist, PlaylistGame};

/// Search results beyond this are reported as too many to present.
pub const FIND_ENTRY_LIMIT: usize = 20;

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        Self::QueryFailed(e.to_string())
    }
}

/// Connection pool over the archive database.
#[derive(Clone)]
pub struct FlashpointDb {
    pool: SqlitePool,
}

impl FlashpointDb {
    /// Open the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    fn row_to_game(row: &SqliteRow) -> Result<Game, DatabaseError> {
        Ok(Game {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            title: row.get("title"),
            series: row.get::<Option<String>, _>("series").unwrap_or_default(),
            developer: row.get::<Option<String>, _>("developer").unwrap_or_default(),
            publisher: row.get::<Option<String>, _>("publisher").unwrap_or_default(),
            platform: row.get::<Option<String>, _>("platformName").unwrap_or_default(),
            broken: row.get::<i64, _>("broken") != 0,
            play_mode: row.get::<Option<String>, _>("playMode").unwrap_or_default(),
            status: row.get::<Option<String>, _>("status").unwrap_or_default(),
            notes: row.get::<Option<String>, _>("notes").unwrap_or_default(),
            source: row.get::<Option<String>, _>("source").unwrap_or_default(),
            app_path: row
                .get::<Option<String>, _>("applicationPath")
                .unwrap_or_default(),
            launch_command: row
                .get::<Option<String>, _>("launchCommand")
                .unwrap_or_default(),
            version: row.get::<Option<String>, _>("version").unwrap_or_default(),
            order_title: row.get::<Option<String>, _>("orderTitle").unwrap_or_default(),
            library: row.get::<Option<String>, _>("library").unwrap_or_default(),
            active_data_id: row.get::<Option<i64>, _>("activeDataId"),
        })
    }

    fn row_to_add_app(row: &SqliteRow) -> Result<AddApp, DatabaseError> {
        Ok(AddApp {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            parent_id: parse_uuid(&row.get::<String, _>("parentGameId"))?,
            name: row.get("name"),
            app_path: row
                .get::<Option<String>, _>("applicationPath")
                .unwrap_or_default(),
            launch_command: row
                .get::<Option<String>, _>("launchCommand")
                .unwrap_or_default(),
            autorun_before: row.get::<i64, _>("autoRunBefore") != 0,
            wait_exit: row.get::<i64, _>("waitForExit") != 0,
        })
    }

    fn row_to_game_data(row: &SqliteRow) -> Result<GameData, DatabaseError> {
        Ok(GameData {
            id: row.get("id"),
            game_id: parse_uuid(&row.get::<String, _>("gameId"))?,
            title: row.get::<Option<String>, _>("title").unwrap_or_default(),
            date_added: row
                .get::<Option<String>, _>("dateAdded")
                .as_deref()
                .and_then(parse_datetime),
            sha256: row.get::<Option<String>, _>("sha256").unwrap_or_default(),
            size: row.get::<Option<i64>, _>("size").unwrap_or_default(),
            path: row.get::<Option<String>, _>("path").unwrap_or_default(),
            present_on_disk: row.get::<Option<i64>, _>("presentOnDisk").unwrap_or(0) != 0,
            parameters: row.get("parameters"),
            application_path: row.get("applicationPath"),
            launch_command: row.get("launchCommand"),
        })
    }

    /// Fetch a game by its id.
    pub async fn game_by_id(&self, id: Uuid) -> Result<Option<Game>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, title, series, developer, publisher, platformName, broken, playMode, \
             status, notes, source, applicationPath, launchCommand, version, orderTitle, \
             library, activeDataId FROM game WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_game).transpose()
    }

    /// Fetch an additional app by its id.
    pub async fn add_app_by_id(&self, id: Uuid) -> Result<Option<AddApp>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, parentGameId, name, applicationPath, launchCommand, autoRunBefore, \
             waitForExit FROM additional_app WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_add_app).transpose()
    }

    /// All additional apps attached to a game.
    pub async fn add_apps_of(&self, parent: Uuid) -> Result<Vec<AddApp>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, parentGameId, name, applicationPath, launchCommand, autoRunBefore, \
             waitForExit FROM additional_app WHERE parentGameId = ? ORDER BY name",
        )
        .bind(parent.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_add_app).collect()
    }

    /// The game's active data pack record, if it has one.
    pub async fn active_game_data(&self, game: &Game) -> Result<Option<GameData>, DatabaseError> {
        let row = match game.active_data_id {
            Some(data_id) => {
                sqlx::query(
                    "SELECT id, gameId, title, dateAdded, sha256, size, path, presentOnDisk, \
                     parameters, applicationPath, launchCommand FROM game_data WHERE id = ?",
                )
                .bind(data_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, gameId, title, dateAdded, sha256, size, path, presentOnDisk, \
                     parameters, applicationPath, launchCommand FROM game_data \
                     WHERE gameId = ? ORDER BY dateAdded DESC LIMIT 1",
                )
                .bind(game.id.to_string())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.as_ref().map(Self::row_to_game_data).transpose()
    }

    /// Record whether the pack file is present and hash-valid on disk.
    pub async fn update_game_data_on_disk(
        &self,
        data_id: i64,
        present: bool,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE game_data SET presentOnDisk = ? WHERE id = ?")
            .bind(i64::from(present))
            .bind(data_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Search games by title, capped at [`FIND_ENTRY_LIMIT`] + 1 so the caller
    /// can distinguish "too many" from an exact cap hit.
    pub async fn search_games_by_title(
        &self,
        title: &str,
        exact: bool,
    ) -> Result<Vec<Game>, DatabaseError> {
        let base = "SELECT id, title, series, developer, publisher, platformName, broken, \
                    playMode, status, notes, source, applicationPath, launchCommand, version, \
                    orderTitle, library, activeDataId FROM game";

        let rows = if exact {
            sqlx::query(&format!("{base} WHERE title = ? LIMIT ?"))
                .bind(title)
                .bind((FIND_ENTRY_LIMIT + 1) as i64)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(&format!(
                "{base} WHERE title LIKE ? ESCAPE '\\' ORDER BY title LIMIT ?"
            ))
            .bind(format!("%{}%", escape_like(title)))
            .bind((FIND_ENTRY_LIMIT + 1) as i64)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(Self::row_to_game).collect()
    }

    /// Search a game's additional apps by name.
    pub async fn search_add_apps_by_name(
        &self,
        parent: Uuid,
        name: &str,
        exact: bool,
    ) -> Result<Vec<AddApp>, DatabaseError> {
        let base = "SELECT id, parentGameId, name, applicationPath, launchCommand, \
                    autoRunBefore, waitForExit FROM additional_app WHERE parentGameId = ?";

        let rows = if exact {
            sqlx::query(&format!("{base} AND name = ? LIMIT ?"))
                .bind(parent.to_string())
                .bind(name)
                .bind((FIND_ENTRY_LIMIT + 1) as i64)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(&format!(
                "{base} AND name LIKE ? ESCAPE '\\' ORDER BY name LIMIT ?"
            ))
            .bind(parent.to_string())
            .bind(format!("%{}%", escape_like(name)))
            .bind((FIND_ENTRY_LIMIT + 1) as i64)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(Self::row_to_add_app).collect()
    }

    /// Fetch a playlist by exact title.
    pub async fn playlist_by_title(&self, title: &str) -> Result<Option<Playlist>, DatabaseError> {
        let row = sqlx::query("SELECT id, title, description, author FROM playlist WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            Ok(Playlist {
                id: parse_uuid(&r.get::<String, _>("id"))?,
                title: r.get("title"),
                description: r.get::<Option<String>, _>("description").unwrap_or_default(),
                author: r.get::<Option<String>, _>("author").unwrap_or_default(),
            })
        })
        .transpose()
    }

    /// Membership rows of a playlist in play order.
    pub async fn playlist_games(
        &self,
        playlist: Uuid,
    ) -> Result<Vec<PlaylistGame>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, playlistId, \"order\", gameId FROM playlist_game \
             WHERE playlistId = ? ORDER BY \"order\"",
        )
        .bind(playlist.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(PlaylistGame {
                    id: r.get("id"),
                    playlist_id: parse_uuid(&r.get::<String, _>("playlistId"))?,
                    order: r.get("order"),
                    game_id: parse_uuid(&r.get::<String, _>("gameId"))?,
                })
            })
            .collect()
    }

    /// Ids of all playable entries matching the library filter.
    pub async fn random_playable_ids(
        &self,
        filter: LibraryFilter,
    ) -> Result<Vec<Uuid>, DatabaseError> {
        let rows = match filter.library_value() {
            Some(library) => {
                sqlx::query(
                    "SELECT id FROM game WHERE broken = 0 AND applicationPath != '' \
                     AND library = ?",
                )
                .bind(library)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT id FROM game WHERE broken = 0 AND applicationPath != ''")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(|r| parse_uuid(&r.get::<String, _>("id")))
            .collect()
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::MalformedRow(format!("bad uuid '{raw}'")))
}

fn parse_datetime(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .ok()
}

/// Escape LIKE wildcards in user-supplied search text.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50% off_deal"), "50\\% off\\_deal");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_uuid("11111111-2222-3333-4444-555555555555").is_ok());
    }

    #[test]
    fn test_parse_datetime() {
        assert!(parse_datetime("2021-03-01T12:00:00Z").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
