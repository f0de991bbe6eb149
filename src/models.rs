//! Core data model: MediaItem, Settings, jobs, and the catalog/audit projections
//! built as a byproduct of organizing.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the parser (or a tagged source folder) classified a file as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaType {
    Movie,
    #[serde(rename = "tv_show")]
    Tv,
    #[default]
    Unknown,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv_show",
            MediaType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv_show" => Ok(MediaType::Tv),
            "unknown" => Ok(MediaType::Unknown),
            other => anyhow::bail!("unknown media type: {other}"),
        }
    }
}

/// Lifecycle state of a MediaItem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    Pending,
    Organized,
    Skipped,
    Error,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Organized => "organized",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "organized" => Ok(ItemStatus::Organized),
            "skipped" => Ok(ItemStatus::Skipped),
            "error" => Ok(ItemStatus::Error),
            other => anyhow::bail!("unknown item status: {other}"),
        }
    }
}

/// One row per observed file. See SPEC_FULL.md §3 for the invariants this type must uphold;
/// they're enforced by the modules that mutate it (scanner, organizer), not by the struct itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub original_filename: String,
    pub original_path: PathBuf,
    pub file_size: u64,
    pub extension: String,

    pub detected_type: MediaType,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub episode_end: Option<i32>,
    pub episode_title: Option<String>,
    pub is_season_pack: bool,
    pub confidence: f64,

    pub tmdb_id: Option<i64>,
    pub tmdb_name: Option<String>,
    pub poster_path: Option<String>,

    pub status: ItemStatus,
    pub destination_path: Option<PathBuf>,
    pub duplicate_of: Option<i64>,
    pub manual_override: bool,

    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl MediaItem {
    /// The full source path: `original_path/original_filename`.
    pub fn source_path(&self) -> PathBuf {
        self.original_path.join(&self.original_filename)
    }
}

/// A tagged source folder, `{TYPE}:{path}` at the persistence boundary (§6, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderTag {
    Movies,
    Tv,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFolder {
    pub tag: FolderTag,
    pub path: PathBuf,
}

impl SourceFolder {
    /// Parse a `TYPE:path` string; an untagged string is MIXED.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some(("MOVIES", path)) => SourceFolder {
                tag: FolderTag::Movies,
                path: PathBuf::from(path),
            },
            Some(("TV", path)) => SourceFolder {
                tag: FolderTag::Tv,
                path: PathBuf::from(path),
            },
            Some(("MIXED", path)) => SourceFolder {
                tag: FolderTag::Mixed,
                path: PathBuf::from(path),
            },
            _ => SourceFolder {
                tag: FolderTag::Mixed,
                path: PathBuf::from(raw),
            },
        }
    }

    /// Render back to the `TYPE:path` compatibility string.
    pub fn encode(&self) -> String {
        let prefix = match self.tag {
            FolderTag::Movies => "MOVIES",
            FolderTag::Tv => "TV",
            FolderTag::Mixed => "MIXED",
        };
        format!("{prefix}:{}", self.path.display())
    }
}

/// Singleton configuration record (§3, §2a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub catalog_api_key: Option<String>,
    #[serde(default)]
    pub source_folders: Vec<String>,
    #[serde(default)]
    pub movies_root: Option<PathBuf>,
    #[serde(default)]
    pub tv_root: Option<PathBuf>,
    #[serde(default)]
    pub auto_organize: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_api_key: None,
            source_folders: Vec::new(),
            movies_root: None,
            tv_root: None,
            auto_organize: false,
        }
    }
}

impl Settings {
    pub fn tagged_source_folders(&self) -> Vec<SourceFolder> {
        self.source_folders.iter().map(|s| SourceFolder::parse(s)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("unknown job status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_files: u64,
    pub processed_files: u64,
    pub new_items: u64,
    pub errors_count: u64,
    pub current_folder: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanJob {
    pub fn new() -> Self {
        ScanJob {
            id: Uuid::new_v4(),
            status: JobStatus::Running,
            total_files: 0,
            processed_files: 0,
            new_items: 0,
            errors_count: 0,
            current_folder: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

impl Default for ScanJob {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_files: u64,
    pub processed_files: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub current_file: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrganizeJob {
    pub fn new(total_files: u64) -> Self {
        OrganizeJob {
            id: Uuid::new_v4(),
            status: JobStatus::Running,
            total_files,
            processed_files: 0,
            success_count: 0,
            failed_count: 0,
            current_file: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Aggregated catalog projection for a TV series, keyed by tmdb_id when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvSeriesRecord {
    pub id: i64,
    pub tmdb_id: Option<i64>,
    pub name: String,
    pub episode_count: u64,
}

/// Aggregated catalog projection for a movie, keyed by tmdb_id when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: i64,
    pub tmdb_id: Option<i64>,
    pub name: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogAction {
    Move,
    Skip,
    Error,
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogAction::Move => "move",
            LogAction::Skip => "skip",
            LogAction::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LogAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(LogAction::Move),
            "skip" => Ok(LogAction::Skip),
            "error" => Ok(LogAction::Error),
            other => anyhow::bail!("unknown log action: {other}"),
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationLog {
    pub id: i64,
    pub item_id: i64,
    pub action: LogAction,
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pure output of the filename parser (§4.1); not persisted directly, folded into a MediaItem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMedia {
    pub detected_type: MediaType,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub episode_end: Option<i32>,
    pub is_season_pack: bool,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_folder_round_trips() {
        let f = SourceFolder::parse("MOVIES:/mnt/films");
        assert_eq!(f.tag, FolderTag::Movies);
        assert_eq!(f.path, PathBuf::from("/mnt/films"));
        assert_eq!(f.encode(), "MOVIES:/mnt/films");
    }

    #[test]
    fn untagged_folder_is_mixed() {
        let f = SourceFolder::parse("/mnt/everything");
        assert_eq!(f.tag, FolderTag::Mixed);
    }

    #[test]
    fn media_type_display_roundtrips_through_fromstr() {
        for t in [MediaType::Movie, MediaType::Tv, MediaType::Unknown] {
            assert_eq!(MediaType::from_str(&t.to_string()).unwrap(), t);
        }
    }
}
