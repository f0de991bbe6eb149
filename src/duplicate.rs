//! Duplicate detector: for a candidate item, finds the id of its primary among previously-seen
//! items, or none. See SPEC_FULL.md §4.4. Similarity metric grounded on
//! `sentient-soup-reelname`'s `core/matcher.rs` (`strsim::normalized_levenshtein`-based
//! `title_similarity`).

use strsim::normalized_levenshtein;

use crate::models::{MediaItem, MediaType};

const SIMILARITY_THRESHOLD: f64 = 0.90;
const DURATION_TOLERANCE_SECS: f64 = 2.0;
const SIZE_TOLERANCE_RATIO: f64 = 0.05;

/// `cleanedName → detectedName → tmdbName`, first non-empty wins (Open Question decision, §9).
fn comparison_name(item: &MediaItem) -> Option<&str> {
    [&item.cleaned_name, &item.detected_name, &item.tmdb_name]
        .into_iter()
        .find_map(|n| n.as_deref().filter(|s| !s.trim().is_empty()))
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn names_match(a: &str, b: &str) -> bool {
    let (na, nb) = (normalize_name(a), normalize_name(b));
    if na == nb {
        return true;
    }
    na.len() > 3 && nb.len() > 3 && (na.contains(&nb) || nb.contains(&na))
}

fn identity_matches(candidate: &MediaItem, existing: &MediaItem) -> bool {
    let same_catalog = match (candidate.tmdb_id, existing.tmdb_id) {
        (Some(a), Some(b)) if a == b => match candidate.detected_type {
            MediaType::Tv => {
                candidate.season == existing.season && candidate.episode == existing.episode
            }
            _ => true,
        },
        _ => false,
    };
    if same_catalog {
        return true;
    }

    let (Some(cname), Some(ename)) = (comparison_name(candidate), comparison_name(existing))
    else {
        return false;
    };
    if !names_match(cname, ename) {
        return false;
    }
    match candidate.detected_type {
        MediaType::Movie => candidate.year == existing.year,
        MediaType::Tv => candidate.season == existing.season && candidate.episode == existing.episode,
        MediaType::Unknown => false,
    }
}

fn similarity_matches(candidate: &MediaItem, existing: &MediaItem) -> bool {
    if let (Some(cname), Some(ename)) = (comparison_name(candidate), comparison_name(existing)) {
        let ratio = normalized_levenshtein(&cname.to_lowercase(), &ename.to_lowercase());
        if ratio > SIMILARITY_THRESHOLD {
            return true;
        }
    }

    match (candidate.duration, existing.duration) {
        (Some(a), Some(b)) => (a - b).abs() <= DURATION_TOLERANCE_SECS,
        _ => {
            let larger = candidate.file_size.max(existing.file_size) as f64;
            if larger == 0.0 {
                return candidate.file_size == existing.file_size;
            }
            let diff = (candidate.file_size as i128 - existing.file_size as i128).unsigned_abs() as f64;
            diff / larger <= SIZE_TOLERANCE_RATIO
        }
    }
}

/// Find the candidate's primary among `existing_items`, in the store's natural iteration order.
/// Ties are not otherwise broken: the first qualifying item wins.
pub fn find_primary<'a>(
    candidate: &MediaItem,
    existing_items: impl IntoIterator<Item = &'a MediaItem>,
) -> Option<i64> {
    existing_items
        .into_iter()
        .find(|existing| {
            existing.duplicate_of.is_none()
                && existing.detected_type == candidate.detected_type
                && identity_matches(candidate, existing)
                && similarity_matches(candidate, existing)
        })
        .map(|existing| existing.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_item(id: i64) -> MediaItem {
        MediaItem {
            id,
            original_filename: format!("file{id}.mkv"),
            original_path: "/media".into(),
            file_size: 1_000_000,
            extension: "mkv".to_string(),
            detected_type: MediaType::Movie,
            detected_name: Some("Inception".to_string()),
            cleaned_name: Some("Inception".to_string()),
            year: Some(2010),
            season: None,
            episode: None,
            episode_end: None,
            episode_title: None,
            is_season_pack: false,
            confidence: 80.0,
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

    #[test]
    fn exact_name_and_year_with_matching_size_is_a_duplicate() {
        let existing = base_item(1);
        let mut candidate = base_item(2);
        candidate.file_size = 1_010_000; // within 5%
        assert_eq!(find_primary(&candidate, [&existing]), Some(1));
    }

    #[test]
    fn different_year_is_not_a_duplicate() {
        let existing = base_item(1);
        let mut candidate = base_item(2);
        candidate.year = Some(1999);
        assert_eq!(find_primary(&candidate, [&existing]), None);
    }

    #[test]
    fn already_marked_duplicate_is_never_chosen_as_a_primary() {
        let mut existing = base_item(1);
        existing.duplicate_of = Some(99);
        let candidate = base_item(2);
        assert_eq!(find_primary(&candidate, [&existing]), None);
    }

    #[test]
    fn size_far_outside_tolerance_is_not_a_duplicate() {
        // Containment keeps identity satisfied while keeping the edit-distance ratio well under
        // the 0.90 similarity threshold, isolating the size-tolerance branch.
        let existing = base_item(1);
        let mut candidate = base_item(2);
        candidate.detected_name = Some("Inception Extended Director's Cut".to_string());
        candidate.cleaned_name = Some("Inception Extended Director's Cut".to_string());
        candidate.file_size = 2_000_000;
        assert_eq!(find_primary(&candidate, [&existing]), None);
    }

    #[test]
    fn duration_within_tolerance_overrides_size_mismatch() {
        let mut existing = base_item(1);
        existing.duration = Some(7200.0);
        let mut candidate = base_item(2);
        candidate.duration = Some(7201.0);
        candidate.file_size = 9_000_000;
        assert_eq!(find_primary(&candidate, [&existing]), Some(1));
    }

    #[test]
    fn tv_identity_requires_matching_season_and_episode() {
        let mut existing = base_item(1);
        existing.detected_type = MediaType::Tv;
        existing.season = Some(1);
        existing.episode = Some(1);
        existing.detected_name = Some("Fallout".to_string());
        existing.cleaned_name = Some("Fallout".to_string());
        existing.year = None;

        let mut candidate = base_item(2);
        candidate.detected_type = MediaType::Tv;
        candidate.season = Some(1);
        candidate.episode = Some(2);
        candidate.detected_name = Some("Fallout".to_string());
        candidate.cleaned_name = Some("Fallout".to_string());
        candidate.year = None;

        assert_eq!(find_primary(&candidate, [&existing]), None);
    }
}
