//! Pure path planner: `plan(item, settings) -> Option<PathBuf>` and `is_already_organized`.
//! See SPEC_FULL.md §4.5. Grounded on the teacher's `organizer.rs` (`generate_plex_path`,
//! `generate_plex_filename`, `clean_title_for_directory`), adapted to the spec's exact formula.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{MediaItem, MediaType, Settings};

static SEASON_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Season \d{2}$").unwrap());

fn clean_title_for_path(title: &str) -> String {
    let cleaned = title.replace(['<', '>', ':', '"', '|', '?', '*'], "");
    let cleaned = cleaned.replace(['\\', '/'], " ");
    cleaned.trim().to_string()
}

fn item_name(item: &MediaItem) -> Option<String> {
    item.tmdb_name
        .clone()
        .or_else(|| item.cleaned_name.clone())
        .or_else(|| item.detected_name.clone())
        .map(|n| clean_title_for_path(&n))
        .filter(|n| !n.is_empty())
}

/// Compute the destination path for `item` under `settings`, or `None` when the matching
/// destination root is unset or the item's detectedType is neither movie nor tv_show.
pub fn plan(item: &MediaItem, settings: &Settings) -> Option<PathBuf> {
    let name = item_name(item)?;

    match item.detected_type {
        MediaType::Movie => {
            let root = settings.movies_root.as_ref()?;
            let year_label = item
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let dir_name = format!("{name} ({year_label})");
            Some(
                root.join(&dir_name)
                    .join(format!("{dir_name}.{}", item.extension)),
            )
        }
        MediaType::Tv => {
            let root = settings.tv_root.as_ref()?;
            let season = item.season.unwrap_or(1);
            let episode = item.episode.unwrap_or(1);
            let season_dir = format!("Season {season:02}");
            let mut filename = format!("{name} - S{season:02}E{episode:02}");
            if let Some(end) = item.episode_end {
                filename.push_str(&format!("-E{end:02}"));
            }
            filename.push('.');
            filename.push_str(&item.extension);
            Some(root.join(name).join(season_dir).join(filename))
        }
        MediaType::Unknown => None,
    }
}

/// Considers `item` already organized if its current location matches the plan, or if it
/// already lives under the corresponding destination root in a canonically-named folder.
pub fn is_already_organized(item: &MediaItem, settings: &Settings) -> bool {
    if let Some(planned) = plan(item, settings) {
        if item.source_path() == planned {
            return true;
        }
    }

    let root = match item.detected_type {
        MediaType::Movie => settings.movies_root.as_deref(),
        MediaType::Tv => settings.tv_root.as_deref(),
        MediaType::Unknown => None,
    };
    let Some(root) = root else { return false };
    if !item.original_path.starts_with(root) {
        return false;
    }

    let Some(parent_name) = item.original_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match item.detected_type {
        MediaType::Tv => SEASON_DIR_RE.is_match(parent_name),
        MediaType::Movie => {
            Regex::new(r"^.+ \((\d{4}|Unknown)\)$")
                .unwrap()
                .is_match(parent_name)
        }
        MediaType::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(detected_type: MediaType) -> MediaItem {
        MediaItem {
            id: 1,
            original_filename: "x.mkv".to_string(),
            original_path: "/downloads".into(),
            file_size: 1,
            extension: "mkv".to_string(),
            detected_type,
            detected_name: Some("Inception".to_string()),
            cleaned_name: Some("Inception".to_string()),
            year: Some(2010),
            season: Some(1),
            episode: Some(2),
            episode_end: None,
            episode_title: None,
            is_season_pack: false,
            confidence: 90.0,
            tmdb_id: None,
            tmdb_name: None,
            poster_path: None,
            status: crate::models::ItemStatus::Pending,
            destination_path: None,
            duplicate_of: None,
            manual_override: false,
            duration: None,
            created_at: Utc::now(),
        }
    }

    fn settings() -> Settings {
        Settings {
            catalog_api_key: None,
            source_folders: vec![],
            movies_root: Some("/plex/Movies".into()),
            tv_root: Some("/plex/TV".into()),
            auto_organize: false,
        }
    }

    #[test]
    fn plans_movie_path() {
        let i = item(MediaType::Movie);
        let p = plan(&i, &settings()).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/plex/Movies/Inception (2010)/Inception (2010).mkv")
        );
    }

    #[test]
    fn movie_without_year_uses_unknown() {
        let mut i = item(MediaType::Movie);
        i.year = None;
        let p = plan(&i, &settings()).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/plex/Movies/Inception (Unknown)/Inception (Unknown).mkv")
        );
    }

    #[test]
    fn plans_tv_path_with_zero_padded_season_and_episode() {
        let i = item(MediaType::Tv);
        let p = plan(&i, &settings()).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/plex/TV/Inception/Season 01/Inception - S01E02.mkv")
        );
    }

    #[test]
    fn tv_multi_episode_range_is_suffixed() {
        let mut i = item(MediaType::Tv);
        i.episode_end = Some(3);
        let p = plan(&i, &settings()).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/plex/TV/Inception/Season 01/Inception - S01E02-E03.mkv")
        );
    }

    #[test]
    fn missing_destination_root_yields_none() {
        let i = item(MediaType::Movie);
        let mut s = settings();
        s.movies_root = None;
        assert_eq!(plan(&i, &s), None);
    }

    #[test]
    fn unknown_type_yields_none() {
        let i = item(MediaType::Unknown);
        assert_eq!(plan(&i, &settings()), None);
    }

    #[test]
    fn already_at_planned_path_is_organized() {
        let mut i = item(MediaType::Movie);
        i.original_path = PathBuf::from("/plex/Movies/Inception (2010)");
        i.original_filename = "Inception (2010).mkv".to_string();
        assert!(is_already_organized(&i, &settings()));
    }

    #[test]
    fn under_root_with_canonical_season_folder_is_organized() {
        let mut i = item(MediaType::Tv);
        i.original_path = PathBuf::from("/plex/TV/Inception/Season 01");
        i.original_filename = "something else entirely.mkv".to_string();
        assert!(is_already_organized(&i, &settings()));
    }

    #[test]
    fn outside_root_is_not_organized() {
        let i = item(MediaType::Movie);
        assert!(!is_already_organized(&i, &settings()));
    }
}
