//! Shared title resolution for the title-oriented commands.
//!
//! A title can be addressed four ways: directly by id, by (fuzzy or strict)
//! title text with an optional additional-app subtitle, by a `flashpoint://`
//! URL, or by random selection under a library filter.

use rand::Rng;
use uuid::Uuid;

use crate::cli::types::TitleArgs;
use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, CoreError, PlayError, TitleCommandError};
use crate::domain::game::LibraryFilter;
use crate::services::core::Core;

/// Custom URL scheme titles are shared under.
pub const FLASHPOINT_SCHEME_PREFIX: &str = "flashpoint://";

/// Extract the title id from a `flashpoint://<uuid>` URL.
pub fn id_from_scheme_url(url: &str) -> Result<Uuid, ClifpError> {
    let rest = url
        .strip_prefix(FLASHPOINT_SCHEME_PREFIX)
        .ok_or_else(|| PlayError::InvalidUrl(url.to_string()))?;
    let raw = rest.trim_end_matches('/');
    Uuid::parse_str(raw).map_err(|_| PlayError::InvalidUrl(url.to_string()).into())
}

/// Resolve the entry id addressed by `args`.
///
/// The id may name a game or an additional app; callers look it up both ways.
pub async fn resolve_title_id(core: &mut Core, args: &TitleArgs) -> Result<Uuid, ClifpError> {
    if let Some(raw) = &args.id {
        return Uuid::parse_str(raw)
            .map_err(|_| TitleCommandError::InvalidId(raw.clone()).into());
    }

    let titled = args
        .title
        .as_deref()
        .map(|t| (t, false))
        .or_else(|| args.title_strict.as_deref().map(|t| (t, true)));

    if let Some((title, exact)) = titled {
        let game_id = core.find_game_id_from_title(title, exact).await?;

        let subtitled = args
            .subtitle
            .as_deref()
            .map(|s| (s, false))
            .or_else(|| args.subtitle_strict.as_deref().map(|s| (s, true)));

        return match subtitled {
            Some((name, exact)) => core.find_add_app_id_from_name(game_id, name, exact).await,
            None => Ok(game_id),
        };
    }

    if let Some(filter) = &args.random {
        return randomly_select_id(core, filter).await;
    }

    Err(TitleCommandError::MissingTitle.into())
}

/// Uniform pick among playable entries matching the library filter.
///
/// When the chosen title has playable additional apps, the pick continues
/// uniformly among the primary title and those apps.
async fn randomly_select_id(core: &mut Core, raw_filter: &str) -> Result<Uuid, ClifpError> {
    let filter = LibraryFilter::parse(raw_filter)
        .ok_or_else(|| TitleCommandError::InvalidRandomFilter(raw_filter.to_string()))?;

    core.directorate()
        .log_event("Selecting a playable title at random...");

    let db = core.fp_install().database().clone();
    let candidates = db.random_playable_ids(filter).await?;
    core.directorate().log_event(&format!(
        "Found {} playable primary titles",
        candidates.len()
    ));
    if candidates.is_empty() {
        return Err(CoreError::TitleNotFound.into());
    }

    let primary_id = {
        let mut rng = rand::thread_rng();
        candidates[rng.gen_range(0..candidates.len())]
    };
    core.directorate().log_event(&format!(
        "Randomly chosen primary title is \"{primary_id}\""
    ));

    let add_apps: Vec<_> = db
        .add_apps_of(primary_id)
        .await?
        .into_iter()
        .filter(crate::domain::game::AddApp::is_playable)
        .collect();
    core.directorate().log_event(&format!(
        "Chosen title has {} playable additional-apps",
        add_apps.len()
    ));

    let selected = if add_apps.is_empty() {
        primary_id
    } else {
        // The primary title is one more slot alongside its apps.
        let slot = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=add_apps.len())
        };
        if slot == add_apps.len() {
            core.directorate().log_event("Selected primary title");
            primary_id
        } else {
            core.directorate().log_event(&format!(
                "Selected additional-app \"{}\"",
                add_apps[slot].name
            ));
            add_apps[slot].id
        }
    };

    post_random_selection_info(core, primary_id, selected).await?;
    Ok(selected)
}

/// Surface what the random roll landed on.
async fn post_random_selection_info(
    core: &Core,
    primary_id: Uuid,
    selected: Uuid,
) -> Result<(), ClifpError> {
    core.directorate().log_event("Querying random game info...");
    let db = core.fp_install().database();

    let Some(game) = db.game_by_id(primary_id).await? else {
        return Err(CoreError::TitleNotFound.into());
    };
    let variant = if selected == primary_id {
        "Original".to_string()
    } else {
        db.add_app_by_id(selected)
            .await?
            .map_or_else(|| "Original".to_string(), |a| a.name)
    };

    core.directorate().post_async(AsyncDirective::Message {
        text: format!(
            "Randomly Selected Game\n\n\
             Title: {}\n\
             Developer: {}\n\
             Publisher: {}\n\
             Library: {}\n\
             Variant: {}",
            game.title, game.developer, game.publisher, game.library, variant
        ),
        selectable: true,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_scheme_url() {
        let id = id_from_scheme_url("flashpoint://11111111-2222-3333-4444-555555555555").unwrap();
        assert_eq!(id.to_string(), "11111111-2222-3333-4444-555555555555");

        // Trailing slash is tolerated.
        assert!(id_from_scheme_url("flashpoint://11111111-2222-3333-4444-555555555555/").is_ok());
    }

    #[test]
    fn test_id_from_scheme_url_rejects_garbage() {
        for bad in [
            "http://11111111-2222-3333-4444-555555555555",
            "flashpoint://not-a-uuid",
            "flashpoint://",
        ] {
            let err = id_from_scheme_url(bad).unwrap_err();
            assert!(matches!(err, ClifpError::Play(PlayError::InvalidUrl(_))));
        }
    }
}
