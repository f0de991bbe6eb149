//! Scan engine: reconciles a configured set of source directory trees into the MediaItem set.
//! See SPEC_FULL.md §4.2. `WalkDir`/`filter_entry`/hidden-skip style grounded on the teacher's
//! top-level `scanner.rs`; the parser→catalog→duplicate→probe pipeline per item is new.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::catalog::CatalogClient;
use crate::duplicate;
use crate::error::EngineError;
use crate::events::{JobCoordinator, ProgressBus, ProgressEvent};
use crate::models::{FolderTag, ItemStatus, JobStatus, MediaItem, MediaType, ScanJob, Settings, SourceFolder};
use crate::parser;
use crate::probe;
use crate::store::Store;

pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts"];

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase())
}

/// Every visited entry must remain within the tree rooted at `root` (normalized path-prefix
/// test) — guards against a misbehaving walk escaping its configured root.
fn within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

struct DiscoveredFile {
    path: PathBuf,
    parent_folder_name: String,
    size: u64,
}

/// Walk `folder.path`, collecting every supported, non-hidden, non-symlinked file. Serves as both
/// passes in §4.2's algorithm: the returned `Vec`'s length is the "first pass" count, and the
/// caller processes its elements as the "second pass" — a single walk is observationally
/// equivalent to re-walking the same unchanging tree twice.
fn discover(folder: &SourceFolder, errors_count: &mut u64) -> Vec<DiscoveredFile> {
    let mut found = Vec::new();
    let walker = WalkDir::new(&folder.path).follow_links(false).into_iter();

    for entry in walker.filter_entry(|e| {
        if e.depth() > 0 {
            let name = e.file_name().to_str().unwrap_or("");
            if is_hidden(name) {
                return false;
            }
        }
        true
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!("walk error under {}: {err}", folder.path.display());
                *errors_count += 1;
                continue;
            }
        };

        if entry.path_is_symlink() || !entry.file_type().is_file() {
            continue;
        }
        if !within_root(entry.path(), &folder.path) {
            *errors_count += 1;
            continue;
        }

        let Some(ext) = extension_of(entry.path()) else {
            continue;
        };
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(_) => {
                *errors_count += 1;
                continue;
            }
        };

        let parent_folder_name = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        found.push(DiscoveredFile {
            path: entry.path().to_path_buf(),
            parent_folder_name,
            size,
        });
    }

    found
}

#[derive(Clone)]
pub struct ScanEngine {
    store: Store,
    catalog: CatalogClient,
    events: ProgressBus,
    coordinator: JobCoordinator,
}

impl ScanEngine {
    pub fn new(store: Store, catalog: CatalogClient, events: ProgressBus, coordinator: JobCoordinator) -> Self {
        ScanEngine {
            store,
            catalog,
            events,
            coordinator,
        }
    }

    /// Fails fast with `AlreadyRunning`/`NotConfigured`; the scan itself proceeds as a spawned
    /// background task. The caller observes progress via the store or `events.subscribe()`.
    pub async fn start_scan(&self, settings: Settings) -> Result<uuid::Uuid> {
        let folders = settings.tagged_source_folders();
        if folders.is_empty() {
            return Err(EngineError::NotConfigured("source folders").into());
        }

        let guard = self.coordinator.try_start_scan().await?;
        let job = ScanJob::new();
        let job_id = job.id;
        self.store.insert_scan_job(&job).await?;

        let engine = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            engine.run_scan(job_id, folders).await;
        });

        Ok(job_id)
    }

    async fn run_scan(&self, job_id: uuid::Uuid, folders: Vec<SourceFolder>) {
        let mut job = match self.store.get_scan_job(job_id).await {
            Ok(Some(j)) => j,
            _ => return,
        };

        let mut errors_count = 0u64;
        let mut all_files = Vec::new();
        for folder in &folders {
            all_files.extend(
                discover(folder, &mut errors_count)
                    .into_iter()
                    .map(|f| (folder.tag, f)),
            );
        }
        job.total_files = all_files.len() as u64;
        job.errors_count = errors_count;
        if let Err(err) = self.store.update_scan_job(&job).await {
            warn!("failed to persist scan job totals: {err}");
        }

        for (tag, file) in all_files {
            job.current_folder = file.path.parent().map(|p| p.display().to_string());

            match self.process_one(&tag, &file, false).await {
                Ok(is_new) => {
                    if is_new {
                        job.new_items += 1;
                    }
                }
                Err(err) => {
                    warn!("error processing {}: {err}", file.path.display());
                    job.errors_count += 1;
                }
            }

            job.processed_files += 1;
            let _ = self.store.update_scan_job(&job).await;
            self.events.publish(ProgressEvent::ScanProgress {
                job_id,
                total_files: job.total_files,
                processed_files: job.processed_files,
                current_folder: job.current_folder.clone(),
                new_items: job.new_items,
                errors_count: job.errors_count,
            });
        }

        job.status = JobStatus::Completed;
        job.completed_at = Some(chrono::Utc::now());
        let _ = self.store.update_scan_job(&job).await;
        self.events.publish(ProgressEvent::ScanDone {
            job_id,
            status: job.status,
        });
    }

    /// Processes one discovered file per §4.2 step 2. Returns whether a new MediaItem was
    /// inserted (vs. an incremental skip or an update of an existing row). `force` bypasses the
    /// unchanged-size skip, for `rescan_item`'s deliberate re-run of an already-seen file.
    async fn process_one(&self, tag: &FolderTag, file: &DiscoveredFile, force: bool) -> Result<bool> {
        let original_path = file.path.parent().unwrap_or(Path::new("")).to_path_buf();
        let original_filename = file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        let existing_row = self
            .store
            .find_item_by_path(&original_path, &original_filename)
            .await?;
        if let Some(existing) = &existing_row {
            if existing.file_size == file.size && !force {
                return Ok(false);
            }
            if existing.manual_override {
                self.store.update_file_size_only(existing.id, file.size).await?;
                return Ok(false);
            }
        }
        let existing_id = existing_row.as_ref().map(|e| e.id);

        let mut parsed = parser::parse(&original_filename, &file.parent_folder_name);
        match tag {
            FolderTag::Movies => parsed.detected_type = MediaType::Movie,
            FolderTag::Tv => parsed.detected_type = MediaType::Tv,
            FolderTag::Mixed => {}
        }

        let extension = extension_of(&file.path).unwrap_or_default();
        let mut confidence = parsed.confidence;
        let mut tmdb_id = None;
        let mut tmdb_name = None;
        let mut poster_path = None;
        let mut year = parsed.year;
        let mut episode_title = None;

        match parsed.detected_type {
            MediaType::Movie => {
                if let Some(name) = parsed.cleaned_name.as_deref().or(parsed.detected_name.as_deref()) {
                    if let Some(m) = self.catalog.search_movie(name, parsed.year).await {
                        tmdb_id = Some(m.id);
                        tmdb_name = Some(m.title);
                        poster_path = m.poster_path;
                        confidence = (confidence + 20.0).min(100.0);
                        if let Some(catalog_year) = m.year {
                            year = Some(catalog_year);
                        }
                    }
                }
            }
            MediaType::Tv => {
                if let Some(name) = parsed.cleaned_name.as_deref().or(parsed.detected_name.as_deref()) {
                    if let Some(tv) = self.catalog.search_tv(name).await {
                        tmdb_id = Some(tv.id);
                        tmdb_name = Some(tv.name);
                        poster_path = tv.poster_path;
                        confidence = (confidence + 20.0).min(100.0);
                        if let (Some(season), Some(episode)) = (parsed.season, parsed.episode) {
                            episode_title = self.catalog.get_episode_title(tv.id, season, episode).await;
                        }
                    }
                }
            }
            MediaType::Unknown => {}
        }

        let duration = probe::probe_duration(&file.path).await;

        let mut candidate = MediaItem {
            id: 0,
            original_filename,
            original_path,
            file_size: file.size,
            extension,
            detected_type: parsed.detected_type,
            detected_name: parsed.detected_name,
            cleaned_name: parsed.cleaned_name,
            year,
            season: parsed.season,
            episode: parsed.episode,
            episode_end: parsed.episode_end,
            episode_title,
            is_season_pack: parsed.is_season_pack,
            confidence,
            tmdb_id,
            tmdb_name,
            poster_path,
            status: ItemStatus::Pending,
            destination_path: None,
            duplicate_of: None,
            manual_override: false,
            duration,
            created_at: chrono::Utc::now(),
        };

        let existing_items = self.store.list_items().await?;
        candidate.duplicate_of = duplicate::find_primary(
            &candidate,
            existing_items.iter().filter(|i| Some(i.id) != existing_id),
        );

        self.store.upsert_item(&candidate).await?;
        Ok(true)
    }

    /// Re-runs the parse→catalog→duplicate pipeline for a single already-known item
    /// (`rescan --id`). Clears its prior catalog match first so a stale tmdb_id can't
    /// short-circuit the re-lookup. Returns the updated MediaItem (§6 `rescanItem`).
    /// A `manualOverride` lock (§3) leaves the item untouched: tmdbId/tmdbName and the rest
    /// of the locked fields must survive a rescan just as they survive an ordinary scan.
    pub async fn rescan_item(&self, id: i64) -> Result<MediaItem> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or(EngineError::ItemNotFound(id))?;
        if item.manual_override {
            return Ok(item);
        }
        self.store.reset_for_rescan(id).await?;

        let tag = match item.detected_type {
            MediaType::Movie => FolderTag::Movies,
            MediaType::Tv => FolderTag::Tv,
            MediaType::Unknown => FolderTag::Mixed,
        };
        let parent_folder_name = item
            .original_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        let file = DiscoveredFile {
            path: item.source_path(),
            parent_folder_name,
            size: item.file_size,
        };

        self.process_one(&tag, &file, true).await?;
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| EngineError::ItemNotFound(id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_excludes_audio_and_subtitles() {
        assert!(SUPPORTED_EXTENSIONS.contains(&"mkv"));
        assert!(!SUPPORTED_EXTENSIONS.contains(&"mp3"));
        assert!(!SUPPORTED_EXTENSIONS.contains(&"srt"));
    }

    #[test]
    fn within_root_rejects_paths_outside_the_tree() {
        assert!(within_root(Path::new("/mnt/media/movies/a.mkv"), Path::new("/mnt/media")));
        assert!(!within_root(Path::new("/etc/passwd"), Path::new("/mnt/media")));
    }

    #[test]
    fn hidden_entries_are_skipped() {
        assert!(is_hidden(".DS_Store"));
        assert!(!is_hidden("Movie.mkv"));
    }

    async fn engine_over(dir: &Path) -> ScanEngine {
        let store = Store::open(dir.join("t.db")).await.unwrap();
        ScanEngine::new(store, CatalogClient::new(None), ProgressBus::new(), JobCoordinator::new())
    }

    #[tokio::test]
    async fn reprocessing_a_size_changed_file_does_not_self_duplicate() {
        let src_dir = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let source_path = src_dir.path().join("Movie.2020.mkv");
        tokio::fs::write(&source_path, b"first cut").await.unwrap();

        let engine = engine_over(db_dir.path()).await;
        let file = DiscoveredFile {
            path: source_path.clone(),
            parent_folder_name: "Movies".to_string(),
            size: 9,
        };
        assert!(engine.process_one(&FolderTag::Movies, &file, false).await.unwrap());

        tokio::fs::write(&source_path, b"second, longer cut").await.unwrap();
        let resized_file = DiscoveredFile {
            path: source_path,
            parent_folder_name: "Movies".to_string(),
            size: 18,
        };
        assert!(!engine
            .process_one(&FolderTag::Movies, &resized_file, false)
            .await
            .unwrap());

        let item = engine
            .store
            .find_item_by_path(&src_dir.path().to_path_buf(), "Movie.2020.mkv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.duplicate_of, None);
        assert_eq!(item.file_size, 18);
    }

    #[tokio::test]
    async fn rescanning_a_manual_override_item_leaves_locked_fields_untouched() {
        let src_dir = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let source_path = src_dir.path().join("Movie.2020.mkv");
        tokio::fs::write(&source_path, b"locked bytes").await.unwrap();

        let store = Store::open(db_dir.path().join("t.db")).await.unwrap();
        let mut locked = MediaItem {
            id: 0,
            original_filename: "Movie.2020.mkv".to_string(),
            original_path: src_dir.path().to_path_buf(),
            file_size: 12,
            extension: "mkv".to_string(),
            detected_type: MediaType::Movie,
            detected_name: Some("Movie".to_string()),
            cleaned_name: Some("Movie".to_string()),
            year: Some(2020),
            season: None,
            episode: None,
            episode_end: None,
            episode_title: None,
            is_season_pack: false,
            confidence: 90.0,
            tmdb_id: Some(42),
            tmdb_name: Some("Manually Picked Title".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            status: ItemStatus::Pending,
            destination_path: None,
            duplicate_of: None,
            manual_override: true,
            duration: None,
            created_at: chrono::Utc::now(),
        };
        let id = store.upsert_item(&locked).await.unwrap();
        locked.id = id;

        let engine = ScanEngine::new(
            store,
            CatalogClient::new(None),
            ProgressBus::new(),
            JobCoordinator::new(),
        );
        let rescanned = engine.rescan_item(id).await.unwrap();

        assert_eq!(rescanned.tmdb_id, Some(42));
        assert_eq!(rescanned.tmdb_name, Some("Manually Picked Title".to_string()));
        assert_eq!(rescanned.poster_path, Some("/poster.jpg".to_string()));
        assert!(rescanned.manual_override);
    }
}
