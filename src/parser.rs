//! Filename parser: a pure, stateless classifier from filename + parent folder name
//! to [`ParsedMedia`]. See SPEC_FULL.md §4.1 for the pipeline this module implements.

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::{MediaType, ParsedMedia};

const GENERIC_FOLDER_NAMES: &[&str] = &[
    "downloads",
    "download",
    "media",
    "movies",
    "movie",
    "tv",
    "tv shows",
    "tvshows",
    "anime",
    "unsorted",
    "new",
    "incoming",
    "torrents",
    "videos",
];

/// Minor words that stay lowercase in title-case output unless they open the title.
const MINOR_WORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "and", "or", "nor", "but", "vs",
];

// ── Noise tokens removed from candidate titles (§4.1 step 6) ──────────────────────────────────
// A curated closed set, matched case-insensitively at word boundaries. Representative rather
// than exhaustive; new release-group tags surface constantly and are not worth chasing forever.
static NOISE_TOKENS: &[&str] = &[
    // resolution
    "720p", "1080p", "2160p", "480p", "4k", "uhd", "hd", "sd",
    // source (note: the "-" and "." forms are never matched post-normalization, since
    // normalize() folds both to spaces before this regex ever runs — listed here as the
    // space-joined form instead)
    "web dl", "webdl", "webrip", "web", "bluray", "blu ray", "bdrip", "brrip", "hdtv", "hdrip",
    "dvdrip", "dvd", "remux", "hdts", "cam",
    // codec
    "x264", "x265", "h264", "h265", "avc", "hevc", "xvid", "divx", "10bit", "8bit", "hi10p",
    // audio
    "aac", "ac3", "dts", "dts hd", "truehd", "atmos", "flac", "mp3", "5 1", "7 1", "2 0", "ddp",
    "dd5 1", "ma",
    // language (fixed ISO-ish name list)
    "english", "french", "german", "spanish", "italian", "japanese", "korean", "chinese",
    "hindi", "russian", "multi", "dual audio", "dubbed", "subbed", "esub",
    // release-group / distribution labels
    "yify", "yts", "rarbg", "sparks", "ntg", "ntb", "amzn", "nf", "netflix", "hulu", "dsnp",
    "hmax", "atvp", "extended", "unrated", "repack", "proper", "internal", "limited",
];

static NOISE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = NOISE_TOKENS
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

static BRACKETED_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[(][^\[\]()]*[\])]").unwrap());

static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

static SPECIAL_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(special|ova)\b").unwrap());
static SPECIAL_EPISODE0_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bepisode\s*0+\b").unwrap());
static SPECIAL_S00E_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs0*0e(\d{1,3})\b").unwrap());
static TRAILING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})").unwrap());

// Episode patterns, tried in precedence order: multi-episode forms before the single-episode
// form, so `S01E01E02` is not truncated by a regex that would otherwise stop at the first pair.
static EP_MULTI_ADJACENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})e(\d{1,3})e(\d{1,3})\b").unwrap());
// Hyphens are folded to spaces during normalization (step 1), so the `S##E##-##` family
// surfaces here as a space between the two episode numbers rather than a literal hyphen.
static EP_MULTI_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})e(\d{1,3})\s+e?(\d{1,3})\b").unwrap());
static EP_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\s*e\s*(\d{1,3})\b").unwrap());
static EP_SINGLE_EP_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\s*ep\s*(\d{1,3})\b").unwrap());
static EP_XFORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,3})(?:\s+(\d{1,3}))?\b").unwrap());
static EP_SEASON_EPISODE_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bseason\s+(\d{1,2})\s+episode\s+(\d{1,3})\b").unwrap());

static SEASON_PACK_COMPLETE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcomplete\s+season\s*(\d{1,2})?\b").unwrap());
static SEASON_PACK_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bseason\s+(\d{1,2})\b").unwrap());
static SEASON_PACK_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseason\s+(one|two|three|four|five|six|seven|eight|nine|ten)\b").unwrap()
});
static SEASON_PACK_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\b").unwrap());

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[(]((?:19|20)\d{2})[\])]|\b((?:19|20)\d{2})\b").unwrap());

fn season_word_to_number(word: &str) -> i32 {
    match word.to_ascii_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        _ => 1,
    }
}

/// Step 1: strip extension, fold separators to spaces, NFKD-normalize, collapse whitespace.
fn normalize(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    let folded: String = stem
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' => ' ',
            other => other,
        })
        .collect();
    let decomposed: String = folded.nfkd().collect();
    let collapsed = MULTI_SPACE_RE.replace_all(&decomposed, " ");
    collapsed.trim().to_string()
}

fn title_case(raw: &str) -> String {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let len = words.len();
    words
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            // Acronyms (already all-uppercase, e.g. "MD", "OVA") are left untouched rather
            // than collapsed to a single leading capital.
            if w.len() > 1 && w.chars().all(|c| !c.is_lowercase()) {
                return w.to_string();
            }
            let lower = w.to_lowercase();
            if i != 0 && i != len - 1 && MINOR_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Step 6: remove noise tokens and bracketed non-year groups, collapse whitespace, title-case.
fn clean_candidate_name(raw: &str) -> Option<String> {
    let without_brackets = BRACKETED_GROUP_RE.replace_all(raw, " ");
    let without_noise = NOISE_TOKEN_RE.replace_all(&without_brackets, " ");
    let collapsed = MULTI_SPACE_RE.replace_all(&without_noise, " ");
    let trimmed = collapsed.trim().trim_matches(|c: char| "-.,".contains(c)).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(title_case(trimmed))
    }
}

struct EpisodeMatch {
    season: i32,
    episode: i32,
    episode_end: Option<i32>,
    name_before: String,
}

fn detect_episode(normalized: &str) -> Option<EpisodeMatch> {
    if let Some(caps) = EP_MULTI_ADJACENT_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: caps[3].parse().ok(),
            name_before: normalized[..m.start()].to_string(),
        });
    }
    if let Some(caps) = EP_MULTI_RANGE_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: caps[3].parse().ok(),
            name_before: normalized[..m.start()].to_string(),
        });
    }
    if let Some(caps) = EP_SINGLE_EP_WORD_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: None,
            name_before: normalized[..m.start()].to_string(),
        });
    }
    if let Some(caps) = EP_SINGLE_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: None,
            name_before: normalized[..m.start()].to_string(),
        });
    }
    if let Some(caps) = EP_XFORM_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: caps.get(3).and_then(|g| g.as_str().parse().ok()),
            name_before: normalized[..m.start()].to_string(),
        });
    }
    if let Some(caps) = EP_SEASON_EPISODE_WORDS_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(EpisodeMatch {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
            episode_end: None,
            name_before: normalized[..m.start()].to_string(),
        });
    }
    None
}

struct SeasonPackMatch {
    season: i32,
    /// Candidate name text. Title tends to precede the marker (`Show Name Season 02`) but
    /// sometimes follows it (`Complete Season 01 - Show Name`); whichever side is non-empty wins.
    name_candidate: String,
}

fn name_around(normalized: &str, m: regex::Match) -> String {
    let before = normalized[..m.start()].trim();
    if !before.is_empty() {
        before.to_string()
    } else {
        normalized[m.end()..].trim().to_string()
    }
}

fn detect_season_pack(normalized: &str) -> Option<SeasonPackMatch> {
    if let Some(caps) = SEASON_PACK_COMPLETE_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        let season = caps.get(1).and_then(|g| g.as_str().parse().ok()).unwrap_or(1);
        return Some(SeasonPackMatch {
            season,
            name_candidate: name_around(normalized, m),
        });
    }
    if let Some(caps) = SEASON_PACK_WORD_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(SeasonPackMatch {
            season: season_word_to_number(&caps[1]),
            name_candidate: name_around(normalized, m),
        });
    }
    if let Some(caps) = SEASON_PACK_NUMBER_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(SeasonPackMatch {
            season: caps[1].parse().ok()?,
            name_candidate: name_around(normalized, m),
        });
    }
    if let Some(caps) = SEASON_PACK_BARE_RE.captures(normalized) {
        let m = caps.get(0).unwrap();
        return Some(SeasonPackMatch {
            season: caps[1].parse().ok()?,
            name_candidate: name_around(normalized, m),
        });
    }
    None
}

struct YearMatch {
    year: i32,
    name_before: String,
}

fn detect_year(normalized: &str) -> Option<YearMatch> {
    let current_year_ceiling = chrono::Utc::now().year() + 1;
    for caps in YEAR_RE.captures_iter(normalized) {
        let m = caps.get(0).unwrap();
        let year_str = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
        let year: i32 = year_str.parse().ok()?;
        if year <= current_year_ceiling {
            return Some(YearMatch {
                year,
                name_before: normalized[..m.start()].to_string(),
            });
        }
    }
    None
}

/// Parse a filename + its immediate parent folder name into structured metadata.
/// Total: never panics, always returns a well-formed record with confidence in [0, 100].
pub fn parse(filename: &str, parent_folder_name: &str) -> ParsedMedia {
    let normalized = normalize(filename);

    // Step 2: specials.
    if SPECIAL_S00E_RE.is_match(&normalized)
        || SPECIAL_MARKER_RE.is_match(&normalized)
        || SPECIAL_EPISODE0_RE.is_match(&normalized)
    {
        let (episode, name_before) = if let Some(caps) = SPECIAL_S00E_RE.captures(&normalized) {
            let m = caps.get(0).unwrap();
            (caps[1].parse().ok(), normalized[..m.start()].to_string())
        } else {
            let marker_start = SPECIAL_MARKER_RE
                .find(&normalized)
                .or_else(|| SPECIAL_EPISODE0_RE.find(&normalized))
                .map(|m| m.start())
                .unwrap_or(normalized.len());
            let tail = &normalized[marker_start..];
            let episode = TRAILING_NUMBER_RE
                .captures(tail)
                .and_then(|c| c[1].parse().ok());
            (episode, normalized[..marker_start].to_string())
        };

        let cleaned_name = clean_candidate_name(&name_before);
        let detected_name = non_empty(&name_before);
        return ParsedMedia {
            detected_type: MediaType::Tv,
            detected_name,
            cleaned_name,
            year: None,
            season: Some(0),
            episode,
            episode_end: None,
            is_season_pack: false,
            confidence: 30.0,
        };
    }

    // Step 3: episode patterns.
    if let Some(ep) = detect_episode(&normalized) {
        let cleaned_name = clean_candidate_name(&ep.name_before)
            .or_else(|| fallback_name(parent_folder_name, &normalized));
        let mut confidence: f64 = if ep.episode_end.is_some() { 50.0 } else { 40.0 };
        let penalized = cleaned_name.is_none();
        let detected_name = non_empty(&ep.name_before).or_else(|| cleaned_name.clone());
        if penalized {
            confidence -= 10.0;
        }
        return ParsedMedia {
            detected_type: MediaType::Tv,
            detected_name,
            cleaned_name,
            year: None,
            season: Some(ep.season),
            episode: Some(ep.episode),
            episode_end: ep.episode_end,
            is_season_pack: false,
            confidence: confidence.clamp(0.0, 100.0),
        };
    }

    // Step 4: season packs (no episode number present).
    if let Some(pack) = detect_season_pack(&normalized) {
        let cleaned_name = clean_candidate_name(&pack.name_candidate)
            .or_else(|| fallback_name(parent_folder_name, &normalized));
        let penalized = cleaned_name.is_none();
        let detected_name = non_empty(&pack.name_candidate).or_else(|| cleaned_name.clone());
        let mut confidence: f64 = 20.0;
        if penalized {
            confidence -= 10.0;
        }
        return ParsedMedia {
            detected_type: MediaType::Tv,
            detected_name,
            cleaned_name,
            year: None,
            season: Some(pack.season),
            episode: None,
            episode_end: None,
            is_season_pack: true,
            confidence: confidence.clamp(0.0, 100.0),
        };
    }

    // Step 5: year / movie.
    if let Some(y) = detect_year(&normalized) {
        let cleaned_name = clean_candidate_name(&y.name_before)
            .or_else(|| fallback_name(parent_folder_name, &normalized));
        let penalized = cleaned_name.is_none();
        let detected_name = non_empty(&y.name_before).or_else(|| cleaned_name.clone());
        let mut confidence: f64 = 40.0;
        if penalized {
            confidence -= 10.0;
        }
        return ParsedMedia {
            detected_type: MediaType::Movie,
            detected_name,
            cleaned_name,
            year: Some(y.year),
            season: None,
            episode: None,
            episode_end: None,
            is_season_pack: false,
            confidence: confidence.clamp(0.0, 100.0),
        };
    }

    // Step 7: fallback — nothing classified.
    let cleaned_name = fallback_name(parent_folder_name, &normalized);
    ParsedMedia {
        detected_type: MediaType::Unknown,
        detected_name: cleaned_name.clone(),
        cleaned_name,
        year: None,
        season: None,
        episode: None,
        episode_end: None,
        is_season_pack: false,
        confidence: 0.0,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Step 7 fallback: prefer the parent folder name unless it's a generic container name.
fn fallback_name(parent_folder_name: &str, normalized_basename: &str) -> Option<String> {
    let parent_lower = parent_folder_name.trim().to_lowercase();
    if !parent_lower.is_empty() && !GENERIC_FOLDER_NAMES.contains(&parent_lower.as_str()) {
        return clean_candidate_name(parent_folder_name).or_else(|| non_empty(parent_folder_name));
    }
    clean_candidate_name(normalized_basename)
}
