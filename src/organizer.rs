//! Organization executor: executes the destructive move plan for a requested batch of item ids.
//! See SPEC_FULL.md §4.6. Grounded on the teacher's `organizer.rs` (`OrganizationResult`/
//! statistics shape); the atomic-move/EXDEV/collision/undo logic here is newly authored — the
//! teacher only does a plain `fs::rename`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::error::EngineError;
use crate::events::{JobCoordinator, ProgressBus, ProgressEvent};
use crate::models::{ItemStatus, JobStatus, LogAction, MediaItem, MediaType, OrganizeJob, Settings};
use crate::planner;
use crate::store::Store;

#[derive(Clone)]
pub struct OrganizeEngine {
    store: Store,
    events: ProgressBus,
    coordinator: JobCoordinator,
}

impl OrganizeEngine {
    pub fn new(store: Store, events: ProgressBus, coordinator: JobCoordinator) -> Self {
        OrganizeEngine {
            store,
            events,
            coordinator,
        }
    }

    pub async fn start_organize(&self, ids: Vec<i64>, settings: Settings) -> Result<uuid::Uuid> {
        if settings.movies_root.is_none() && settings.tv_root.is_none() {
            return Err(EngineError::NotConfigured("destination roots").into());
        }

        let guard = self.coordinator.try_start_organize().await?;
        let job = OrganizeJob::new(ids.len() as u64);
        let job_id = job.id;
        self.store.insert_organize_job(&job).await?;

        let engine = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            engine.run_organize(job_id, ids, settings).await;
        });

        Ok(job_id)
    }

    async fn run_organize(&self, job_id: uuid::Uuid, ids: Vec<i64>, settings: Settings) {
        let mut job = match self.store.get_organize_job(job_id).await {
            Ok(Some(j)) => j,
            _ => return,
        };

        for id in ids {
            job.current_file = Some(id.to_string());
            match self.organize_one(id, &settings).await {
                Ok(true) => job.success_count += 1,
                Ok(false) => {} // skipped — advance counters only, not a success or a failure
                Err(err) => {
                    warn!("organize item {id} failed: {err}");
                    job.failed_count += 1;
                }
            }
            job.processed_files += 1;
            let _ = self.store.update_organize_job(&job).await;
            self.events.publish(ProgressEvent::OrganizeProgress {
                job_id,
                total_files: job.total_files,
                processed_files: job.processed_files,
                current_file: job.current_file.clone(),
                success_count: job.success_count,
                failed_count: job.failed_count,
            });
        }

        job.status = JobStatus::Completed;
        job.completed_at = Some(chrono::Utc::now());
        let _ = self.store.update_organize_job(&job).await;
        self.events.publish(ProgressEvent::OrganizeDone {
            job_id,
            status: job.status,
        });
    }

    /// Per-item procedure (§4.6). `Ok(true)` = organized, `Ok(false)` = skip (advance counters
    /// only, no success/failure), `Err` = per-item error (logged, item.status = error).
    async fn organize_one(&self, id: i64, settings: &Settings) -> Result<bool> {
        let Some(item) = self.store.get_item(id).await? else {
            anyhow::bail!(EngineError::ItemNotFound(id));
        };

        if item.status != ItemStatus::Pending || item.is_season_pack {
            return Ok(false);
        }

        let source = item.source_path();

        let destination = match planner::plan(&item, settings) {
            Some(path) => path,
            None => {
                self.fail_item(&item, &source, "no destination root configured for this item's type")
                    .await?;
                anyhow::bail!(EngineError::UnknownDetectedType);
            }
        };

        if let Err(guard_err) = safety_guard(&source, &destination) {
            self.fail_item(&item, &source, &guard_err.to_string()).await?;
            return Err(guard_err);
        }

        let final_destination = match resolve_collision(&destination, item.file_size).await {
            Ok(CollisionResolution::Proceed(path)) => path,
            Ok(CollisionResolution::Skip(existing_path)) => {
                let existing_id = self.existing_item_id_at(&existing_path).await?;
                self.store.mark_skipped(item.id, existing_id).await?;
                self.store
                    .append_log(item.id, LogAction::Skip, &source, Some(&existing_path), None)
                    .await?;
                return Ok(true);
            }
            Err(err) => {
                self.fail_item(&item, &source, &err.to_string()).await?;
                return Err(err);
            }
        };

        if let Err(err) = atomic_move(&source, &final_destination).await {
            self.fail_item(&item, &source, &err.to_string()).await?;
            return Err(err);
        }

        self.store.mark_organized(item.id, &final_destination).await?;
        self.store
            .append_log(item.id, LogAction::Move, &source, Some(&final_destination), None)
            .await?;

        match item.detected_type {
            MediaType::Movie => {
                self.store
                    .upsert_movie(item.tmdb_id, item.tmdb_name.as_deref().unwrap_or(""), item.year)
                    .await?;
            }
            MediaType::Tv => {
                self.store
                    .upsert_tv_series(item.tmdb_id, item.tmdb_name.as_deref().unwrap_or(""))
                    .await?;
            }
            MediaType::Unknown => {}
        }

        Ok(true)
    }

    async fn fail_item(&self, item: &MediaItem, source: &Path, message: &str) -> Result<()> {
        self.store.mark_error(item.id).await?;
        self.store
            .append_log(item.id, LogAction::Error, source, None, Some(message))
            .await?;
        Ok(())
    }

    async fn existing_item_id_at(&self, path: &Path) -> Result<Option<i64>> {
        let items = self.store.list_items().await?;
        Ok(items
            .into_iter()
            .find(|i| i.destination_path.as_deref() == Some(path))
            .map(|i| i.id))
    }

    /// Reverses a single organized item: moves it back to its original location and resets
    /// status to pending. Returns the updated MediaItem (§6 `undoOrganize`).
    pub async fn undo(&self, id: i64) -> Result<MediaItem> {
        let item = self.store.get_item(id).await?.ok_or(EngineError::ItemNotFound(id))?;
        let Some(destination) = item.destination_path.clone() else {
            anyhow::bail!("item {id} has no destinationPath to undo");
        };
        if !tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            anyhow::bail!("destination {} no longer exists", destination.display());
        }

        let original = item.source_path();
        if let Some(parent) = original.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        atomic_move(&destination, &original).await?;

        self.store.mark_undone(item.id).await?;
        self.store
            .append_log(item.id, LogAction::Move, &destination, Some(&original), Some("undo"))
            .await?;
        self.store
            .get_item(item.id)
            .await?
            .ok_or_else(|| EngineError::ItemNotFound(item.id).into())
    }
}

fn safety_guard(source: &Path, destination: &Path) -> Result<()> {
    if source == destination {
        anyhow::bail!(EngineError::SourceEqualsDestination(destination.to_path_buf()));
    }
    if let Some(source_dir) = source.parent() {
        if destination.starts_with(source_dir) {
            anyhow::bail!(EngineError::DestinationInsideSource {
                source_dir: source_dir.to_path_buf(),
                destination: destination.to_path_buf(),
            });
        }
    }
    Ok(())
}

enum CollisionResolution {
    Proceed(PathBuf),
    Skip(PathBuf),
}

async fn resolve_collision(destination: &Path, candidate_size: u64) -> Result<CollisionResolution> {
    let existing_meta = tokio::fs::metadata(destination).await.ok();
    let Some(existing_meta) = existing_meta else {
        return Ok(CollisionResolution::Proceed(destination.to_path_buf()));
    };
    if existing_meta.len() == candidate_size {
        return Ok(CollisionResolution::Skip(destination.to_path_buf()));
    }

    let stem = destination.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = destination.extension().and_then(|s| s.to_str());
    let parent = destination.parent().unwrap_or(Path::new(""));

    for n in 2.. {
        let candidate_name = match ext {
            Some(ext) => format!("{stem} (copy {n}).{ext}"),
            None => format!("{stem} (copy {n})"),
        };
        let candidate = parent.join(candidate_name);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Ok(CollisionResolution::Proceed(candidate));
        }
        if n > 10_000 {
            anyhow::bail!("could not find a free destination name after 10000 attempts");
        }
    }
    unreachable!()
}

/// Atomic move with an EXDEV (cross-device) fallback: rename to a `.tmp` sibling, rename that to
/// the final path; on EXDEV, copy → stat-verify → unlink → rename instead, so a crash mid-way
/// leaves either a clean pre-state or an advanceable post-state (§9).
async fn atomic_move(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = {
        let mut p = destination.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    match tokio::fs::rename(source, &tmp_path).await {
        Ok(()) => {}
        Err(err) if is_cross_device(&err) => {
            tokio::fs::copy(source, &tmp_path).await?;
            let source_size = tokio::fs::metadata(source).await?.len();
            let copied_size = tokio::fs::metadata(&tmp_path).await?.len();
            if source_size != copied_size {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                anyhow::bail!(EngineError::VerificationMismatch {
                    expected: source_size,
                    actual: copied_size,
                });
            }
            tokio::fs::remove_file(source).await?;
        }
        Err(err) => return Err(err.into()),
    }

    tokio::fs::rename(&tmp_path, destination).await?;
    Ok(())
}

fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc_exdev())
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV on Linux and most other unix targets
}
