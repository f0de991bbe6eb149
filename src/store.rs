//! SQLite persistence layer. Grounded on the teacher's `database/mod.rs` (`DatabaseManager`'s
//! `Arc<tokio::sync::Mutex<Connection>>` shape) and `database/schema.rs` (raw-SQL-const schema,
//! `init_schema`/`check_schema` style). See SPEC_FULL.md §3 for the six tables this backs.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    ItemStatus, JobStatus, LogAction, MediaItem, MediaType, MovieRecord, OrganizationLog,
    OrganizeJob, ScanJob, TvSeriesRecord,
};

const CREATE_MEDIA_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS media_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_filename TEXT NOT NULL,
    original_path TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    extension TEXT NOT NULL,
    detected_type TEXT NOT NULL,
    detected_name TEXT,
    cleaned_name TEXT,
    year INTEGER,
    season INTEGER,
    episode INTEGER,
    episode_end INTEGER,
    episode_title TEXT,
    is_season_pack INTEGER NOT NULL DEFAULT 0,
    confidence REAL NOT NULL DEFAULT 0,
    tmdb_id INTEGER,
    tmdb_name TEXT,
    poster_path TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    destination_path TEXT,
    duplicate_of INTEGER,
    manual_override INTEGER NOT NULL DEFAULT 0,
    duration REAL,
    created_at TEXT NOT NULL,
    UNIQUE(original_path, original_filename)
);
"#;

const CREATE_SCAN_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scan_jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    total_files INTEGER NOT NULL DEFAULT 0,
    processed_files INTEGER NOT NULL DEFAULT 0,
    new_items INTEGER NOT NULL DEFAULT 0,
    errors_count INTEGER NOT NULL DEFAULT 0,
    current_folder TEXT,
    error TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
);
"#;

const CREATE_ORGANIZE_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS organize_jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    total_files INTEGER NOT NULL DEFAULT 0,
    processed_files INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    current_file TEXT,
    error TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
);
"#;

const CREATE_TV_SERIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tv_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tmdb_id INTEGER UNIQUE,
    name TEXT NOT NULL,
    episode_count INTEGER NOT NULL DEFAULT 0
);
"#;

const CREATE_MOVIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tmdb_id INTEGER UNIQUE,
    name TEXT NOT NULL,
    year INTEGER
);
"#;

const CREATE_ORGANIZATION_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS organization_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    action TEXT NOT NULL,
    source_path TEXT NOT NULL,
    destination_path TEXT,
    message TEXT,
    created_at TEXT NOT NULL
);
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_media_items_status ON media_items(status);",
    "CREATE INDEX IF NOT EXISTS idx_media_items_duplicate_of ON media_items(duplicate_of);",
    "CREATE INDEX IF NOT EXISTS idx_organization_log_item_id ON organization_log(item_id);",
];

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_MEDIA_ITEMS_TABLE, [])?;
    conn.execute(CREATE_SCAN_JOBS_TABLE, [])?;
    conn.execute(CREATE_ORGANIZE_JOBS_TABLE, [])?;
    conn.execute(CREATE_TV_SERIES_TABLE, [])?;
    conn.execute(CREATE_MOVIES_TABLE, [])?;
    conn.execute(CREATE_ORGANIZATION_LOG_TABLE, [])?;
    for index_sql in CREATE_INDEXES {
        conn.execute(index_sql, [])?;
    }
    Ok(())
}

/// SQLite-backed store. Cheaply `Clone`, sharing one connection behind a mutex — the teacher's
/// `DatabaseManager` shape, since `rusqlite::Connection` is not `Sync`.
#[derive(Clone)]
pub struct Store {
    connection: Arc<Mutex<Connection>>,
}

impl Store {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_owned();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path)
                .with_context(|| format!("failed to open database at {}", path.display()))?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .context("database open task panicked")??;

        Ok(Store {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    // ---- media_items -------------------------------------------------------------------

    pub async fn find_item_by_path(
        &self,
        original_path: &Path,
        original_filename: &str,
    ) -> Result<Option<MediaItem>> {
        let conn = self.connection.lock().await;
        let path_str = original_path.to_string_lossy().to_string();
        let filename = original_filename.to_string();
        conn.query_row(
            "SELECT * FROM media_items WHERE original_path = ?1 AND original_filename = ?2",
            params![path_str, filename],
            row_to_media_item,
        )
        .optional()
        .context("querying media item by path")
    }

    pub async fn get_item(&self, id: i64) -> Result<Option<MediaItem>> {
        let conn = self.connection.lock().await;
        conn.query_row(
            "SELECT * FROM media_items WHERE id = ?1",
            params![id],
            row_to_media_item,
        )
        .optional()
        .context("querying media item by id")
    }

    pub async fn list_items(&self) -> Result<Vec<MediaItem>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM media_items ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_media_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub async fn upsert_item(&self, item: &MediaItem) -> Result<i64> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO media_items (
                original_filename, original_path, file_size, extension, detected_type,
                detected_name, cleaned_name, year, season, episode, episode_end, episode_title,
                is_season_pack, confidence, tmdb_id, tmdb_name, poster_path, status,
                destination_path, duplicate_of, manual_override, duration, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            ON CONFLICT(original_path, original_filename) DO UPDATE SET
                file_size = excluded.file_size,
                detected_type = excluded.detected_type,
                detected_name = excluded.detected_name,
                cleaned_name = excluded.cleaned_name,
                year = excluded.year,
                season = excluded.season,
                episode = excluded.episode,
                episode_end = excluded.episode_end,
                episode_title = excluded.episode_title,
                is_season_pack = excluded.is_season_pack,
                confidence = excluded.confidence,
                tmdb_id = excluded.tmdb_id,
                tmdb_name = excluded.tmdb_name,
                poster_path = excluded.poster_path,
                status = excluded.status,
                destination_path = excluded.destination_path,
                duplicate_of = excluded.duplicate_of,
                duration = excluded.duration
            ",
            params![
                item.original_filename,
                item.original_path.to_string_lossy().to_string(),
                item.file_size as i64,
                item.extension,
                item.detected_type.to_string(),
                item.detected_name,
                item.cleaned_name,
                item.year,
                item.season,
                item.episode,
                item.episode_end,
                item.episode_title,
                item.is_season_pack as i64,
                item.confidence,
                item.tmdb_id,
                item.tmdb_name,
                item.poster_path,
                item.status.to_string(),
                item.destination_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                item.duplicate_of,
                item.manual_override as i64,
                item.duration,
                item.created_at.to_rfc3339(),
            ],
        )
        .context("upserting media item")?;

        let id: i64 = conn.query_row(
            "SELECT id FROM media_items WHERE original_path = ?1 AND original_filename = ?2",
            params![
                item.original_path.to_string_lossy().to_string(),
                item.original_filename
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Update only the `fileSize` column, used when `manualOverride = true` (§4.2 step h).
    pub async fn update_file_size_only(&self, id: i64, file_size: u64) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET file_size = ?1 WHERE id = ?2",
            params![file_size as i64, id],
        )?;
        Ok(())
    }

    /// Clear tmdb fields, duplicateOf, and status back to pending, for `rescan --id`.
    pub async fn reset_for_rescan(&self, id: i64) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET tmdb_id = NULL, tmdb_name = NULL, poster_path = NULL,
                duplicate_of = NULL, status = 'pending', destination_path = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub async fn set_item_status(&self, id: i64, status: ItemStatus) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET status = ?1 WHERE id = ?2",
            params![status.to_string(), id],
        )?;
        Ok(())
    }

    pub async fn mark_organized(&self, id: i64, destination_path: &Path) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET status = 'organized', destination_path = ?1 WHERE id = ?2",
            params![destination_path.to_string_lossy().to_string(), id],
        )?;
        Ok(())
    }

    /// `duplicate_of` is `None` when the colliding destination file isn't itself a tracked
    /// MediaItem (e.g. placed there outside mediatrove) — §4.6's collision handling names the
    /// colliding *path*, but duplicateOf is typed as an item id per §3, so an untracked
    /// collision just leaves it unset rather than inventing a self-reference.
    pub async fn mark_skipped(&self, id: i64, duplicate_of: Option<i64>) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET status = 'skipped', duplicate_of = ?1 WHERE id = ?2",
            params![duplicate_of, id],
        )?;
        Ok(())
    }

    pub async fn mark_error(&self, id: i64) -> Result<()> {
        self.set_item_status(id, ItemStatus::Error).await
    }

    /// Reverse organization on undo: back to pending with no destination path.
    pub async fn mark_undone(&self, id: i64) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE media_items SET status = 'pending', destination_path = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // ---- scan_jobs / organize_jobs -----------------------------------------------------

    pub async fn insert_scan_job(&self, job: &ScanJob) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO scan_jobs (id, status, total_files, processed_files, new_items,
                errors_count, current_folder, error, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_files,
                job.processed_files,
                job.new_items,
                job.errors_count,
                job.current_folder,
                job.error,
                job.started_at.to_rfc3339(),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub async fn update_scan_job(&self, job: &ScanJob) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE scan_jobs SET status = ?2, total_files = ?3, processed_files = ?4,
                new_items = ?5, errors_count = ?6, current_folder = ?7, error = ?8,
                completed_at = ?9 WHERE id = ?1",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_files,
                job.processed_files,
                job.new_items,
                job.errors_count,
                job.current_folder,
                job.error,
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub async fn insert_organize_job(&self, job: &OrganizeJob) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO organize_jobs (id, status, total_files, processed_files, success_count,
                failed_count, current_file, error, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_files,
                job.processed_files,
                job.success_count,
                job.failed_count,
                job.current_file,
                job.error,
                job.started_at.to_rfc3339(),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub async fn update_organize_job(&self, job: &OrganizeJob) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "UPDATE organize_jobs SET status = ?2, total_files = ?3, processed_files = ?4,
                success_count = ?5, failed_count = ?6, current_file = ?7, error = ?8,
                completed_at = ?9 WHERE id = ?1",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_files,
                job.processed_files,
                job.success_count,
                job.failed_count,
                job.current_file,
                job.error,
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub async fn get_scan_job(&self, id: Uuid) -> Result<Option<ScanJob>> {
        let conn = self.connection.lock().await;
        conn.query_row(
            "SELECT * FROM scan_jobs WHERE id = ?1",
            params![id.to_string()],
            row_to_scan_job,
        )
        .optional()
        .context("querying scan job")
    }

    pub async fn get_organize_job(&self, id: Uuid) -> Result<Option<OrganizeJob>> {
        let conn = self.connection.lock().await;
        conn.query_row(
            "SELECT * FROM organize_jobs WHERE id = ?1",
            params![id.to_string()],
            row_to_organize_job,
        )
        .optional()
        .context("querying organize job")
    }

    // ---- organization_log ---------------------------------------------------------------

    pub async fn append_log(
        &self,
        item_id: i64,
        action: LogAction,
        source_path: &Path,
        destination_path: Option<&Path>,
        message: Option<&str>,
    ) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO organization_log (item_id, action, source_path, destination_path,
                message, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item_id,
                action.to_string(),
                source_path.to_string_lossy().to_string(),
                destination_path.map(|p| p.to_string_lossy().to_string()),
                message,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_log_for_item(&self, item_id: i64) -> Result<Vec<OrganizationLog>> {
        let conn = self.connection.lock().await;
        let mut stmt =
            conn.prepare("SELECT * FROM organization_log WHERE item_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![item_id], row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ---- tv_series / movies catalog projections ------------------------------------------

    pub async fn upsert_tv_series(&self, tmdb_id: Option<i64>, name: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        match tmdb_id {
            Some(tid) => {
                conn.execute(
                    "INSERT INTO tv_series (tmdb_id, name, episode_count) VALUES (?1, ?2, 1)
                     ON CONFLICT(tmdb_id) DO UPDATE SET episode_count = episode_count + 1",
                    params![tid, name],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO tv_series (tmdb_id, name, episode_count) VALUES (NULL, ?1, 1)",
                    params![name],
                )?;
            }
        }
        Ok(())
    }

    pub async fn upsert_movie(&self, tmdb_id: Option<i64>, name: &str, year: Option<i32>) -> Result<()> {
        let conn = self.connection.lock().await;
        match tmdb_id {
            Some(tid) => {
                conn.execute(
                    "INSERT INTO movies (tmdb_id, name, year) VALUES (?1, ?2, ?3)
                     ON CONFLICT(tmdb_id) DO UPDATE SET name = excluded.name, year = excluded.year",
                    params![tid, name, year],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO movies (tmdb_id, name, year) VALUES (NULL, ?1, ?2)",
                    params![name, year],
                )?;
            }
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn list_tv_series(&self) -> Result<Vec<TvSeriesRecord>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare("SELECT id, tmdb_id, name, episode_count FROM tv_series")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TvSeriesRecord {
                    id: row.get(0)?,
                    tmdb_id: row.get(1)?,
                    name: row.get(2)?,
                    episode_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[allow(dead_code)]
    pub async fn list_movies(&self) -> Result<Vec<MovieRecord>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare("SELECT id, tmdb_id, name, year FROM movies")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MovieRecord {
                    id: row.get(0)?,
                    tmdb_id: row.get(1)?,
                    name: row.get(2)?,
                    year: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn parse_enum_column<T: FromStr>(raw: String) -> rusqlite::Result<T> {
    T::from_str(&raw).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad enum column")),
        )
    })
}

fn row_to_media_item(row: &Row) -> rusqlite::Result<MediaItem> {
    let detected_type: String = row.get("detected_type")?;
    let status: String = row.get("status")?;
    let original_path: String = row.get("original_path")?;
    let destination_path: Option<String> = row.get("destination_path")?;

    Ok(MediaItem {
        id: row.get("id")?,
        original_filename: row.get("original_filename")?,
        original_path: PathBuf::from(original_path),
        file_size: row.get::<_, i64>("file_size")? as u64,
        extension: row.get("extension")?,
        detected_type: parse_enum_column::<MediaType>(detected_type)?,
        detected_name: row.get("detected_name")?,
        cleaned_name: row.get("cleaned_name")?,
        year: row.get("year")?,
        season: row.get("season")?,
        episode: row.get("episode")?,
        episode_end: row.get("episode_end")?,
        episode_title: row.get("episode_title")?,
        is_season_pack: row.get::<_, i64>("is_season_pack")? != 0,
        confidence: row.get("confidence")?,
        tmdb_id: row.get("tmdb_id")?,
        tmdb_name: row.get("tmdb_name")?,
        poster_path: row.get("poster_path")?,
        status: parse_enum_column::<ItemStatus>(status)?,
        destination_path: destination_path.map(PathBuf::from),
        duplicate_of: row.get("duplicate_of")?,
        manual_override: row.get::<_, i64>("manual_override")? != 0,
        duration: row.get("duration")?,
        created_at: parse_rfc3339(row.get("created_at")?)?,
    })
}

fn parse_rfc3339(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad timestamp")),
            )
        })
}

fn parse_optional_rfc3339(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(parse_rfc3339).transpose()
}

fn row_to_scan_job(row: &Row) -> rusqlite::Result<ScanJob> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    Ok(ScanJob {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        status: parse_enum_column::<JobStatus>(status)?,
        total_files: row.get("total_files")?,
        processed_files: row.get("processed_files")?,
        new_items: row.get("new_items")?,
        errors_count: row.get("errors_count")?,
        current_folder: row.get("current_folder")?,
        error: row.get("error")?,
        started_at: parse_rfc3339(row.get("started_at")?)?,
        completed_at: parse_optional_rfc3339(row.get("completed_at")?)?,
    })
}

fn row_to_organize_job(row: &Row) -> rusqlite::Result<OrganizeJob> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    Ok(OrganizeJob {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        status: parse_enum_column::<JobStatus>(status)?,
        total_files: row.get("total_files")?,
        processed_files: row.get("processed_files")?,
        success_count: row.get("success_count")?,
        failed_count: row.get("failed_count")?,
        current_file: row.get("current_file")?,
        error: row.get("error")?,
        started_at: parse_rfc3339(row.get("started_at")?)?,
        completed_at: parse_optional_rfc3339(row.get("completed_at")?)?,
    })
}

fn row_to_log(row: &Row) -> rusqlite::Result<OrganizationLog> {
    let action: String = row.get("action")?;
    let source_path: String = row.get("source_path")?;
    let destination_path: Option<String> = row.get("destination_path")?;
    Ok(OrganizationLog {
        id: row.get("id")?,
        item_id: row.get("item_id")?,
        action: parse_enum_column::<LogAction>(action)?,
        source_path: PathBuf::from(source_path),
        destination_path: destination_path.map(PathBuf::from),
        message: row.get("message")?,
        created_at: parse_rfc3339(row.get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> MediaItem {
        MediaItem {
            id: 0,
            original_filename: "Breaking.Bad.S01E01.mkv".to_string(),
            original_path: "/downloads".into(),
            file_size: 12345,
            extension: "mkv".to_string(),
            detected_type: MediaType::Tv,
            detected_name: Some("Breaking Bad".to_string()),
            cleaned_name: Some("Breaking Bad".to_string()),
            year: None,
            season: Some(1),
            episode: Some(1),
            episode_end: None,
            episode_title: None,
            is_season_pack: false,
            confidence: 80.0,
            tmdb_id: None,
            tmdb_name: None,
            poster_path: None,
            status: ItemStatus::Pending,
            destination_path: None,
            duplicate_of: None,
            manual_override: false,
            duration: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).await.unwrap();
        let item = sample_item();
        let id = store.upsert_item(&item).await.unwrap();

        let found = store
            .find_item_by_path(Path::new("/downloads"), "Breaking.Bad.S01E01.mkv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.cleaned_name.as_deref(), Some("Breaking Bad"));
    }

    #[tokio::test]
    async fn upsert_on_existing_path_updates_rather_than_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).await.unwrap();
        let mut item = sample_item();
        store.upsert_item(&item).await.unwrap();

        item.file_size = 99999;
        store.upsert_item(&item).await.unwrap();

        let items = store.list_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file_size, 99999);
    }

    #[tokio::test]
    async fn reset_for_rescan_clears_catalog_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).await.unwrap();
        let mut item = sample_item();
        item.tmdb_id = Some(42);
        item.status = ItemStatus::Organized;
        let id = store.upsert_item(&item).await.unwrap();

        store.reset_for_rescan(id).await.unwrap();
        let found = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(found.tmdb_id, None);
        assert_eq!(found.status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn scan_job_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).await.unwrap();
        let job = ScanJob::new();
        store.insert_scan_job(&job).await.unwrap();

        let found = store.get_scan_job(job.id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Running);
    }
}
