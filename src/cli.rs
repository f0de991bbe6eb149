//! Command-line surface. Subcommand shape grounded on the teacher's `cli/commands.rs`
//! (clap derive `Parser`/`Subcommand`, one variant per operation); progress-bar reporting
//! grounded on the teacher's `cli/output.rs` (`indicatif::ProgressBar`), here driven by
//! `events::ProgressBus` instead of a synchronous callback.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::CatalogClient;
use crate::events::{JobCoordinator, ProgressBus, ProgressEvent};
use crate::models::{ItemStatus, MediaType, Settings};
use crate::organizer::OrganizeEngine;
use crate::scanner::ScanEngine;
use crate::store::Store;

#[derive(Parser)]
#[command(name = "mediatrove")]
#[command(about = "Ingests, identifies, and organizes a media library into a Plex-compatible layout")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (defaults to ~/.mediatrove/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan configured source folders for new or changed media files.
    Scan,
    /// Organize pending items into the destination library layout.
    Organize {
        /// Item ids to organize.
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },
    /// Re-run parsing and catalog lookup for a single item.
    Rescan {
        #[arg(long)]
        id: i64,
    },
    /// Reverse a previously organized item, moving it back to its original location.
    Undo {
        #[arg(long)]
        id: i64,
    },
    /// Show library-wide counts by status.
    Stats,
    /// List media items, optionally filtered.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        media_type: Option<String>,
        /// Case-insensitive substring match against the item's display name.
        #[arg(long)]
        search: Option<String>,
        /// Only items with confidence strictly below this value.
        #[arg(long)]
        confidence_below: Option<f64>,
        /// Only items flagged as a duplicate of another item.
        #[arg(long)]
        duplicates_only: bool,
    },
    /// Show the active configuration.
    Config,
}

/// Shared engine wiring, built once per invocation from the loaded `Settings`.
struct App {
    store: Store,
    settings: Settings,
    events: ProgressBus,
    coordinator: JobCoordinator,
}

impl App {
    async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.or_else(Settings::default_path);
        let settings = Settings::load_or_default(config_path.as_deref());

        let db_path = Settings::default_path()
            .and_then(|p| p.parent().map(|d| d.join("mediatrove.db")))
            .unwrap_or_else(|| PathBuf::from("mediatrove.db"));
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
        let store = Store::open(&db_path)
            .await
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        Ok(App {
            store,
            settings,
            events: ProgressBus::new(),
            coordinator: JobCoordinator::new(),
        })
    }

    fn scan_engine(&self) -> ScanEngine {
        let catalog = CatalogClient::new(self.settings.catalog_api_key.clone());
        ScanEngine::new(self.store.clone(), catalog, self.events.clone(), self.coordinator.clone())
    }

    fn organize_engine(&self) -> OrganizeEngine {
        OrganizeEngine::new(self.store.clone(), self.events.clone(), self.coordinator.clone())
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let app = App::new(cli.config).await?;

    match cli.command {
        Commands::Scan => cmd_scan(&app).await,
        Commands::Organize { ids } => cmd_organize(&app, ids).await,
        Commands::Rescan { id } => cmd_rescan(&app, id).await,
        Commands::Undo { id } => cmd_undo(&app, id).await,
        Commands::Stats => cmd_stats(&app).await,
        Commands::List {
            status,
            media_type,
            search,
            confidence_below,
            duplicates_only,
        } => cmd_list(&app, status, media_type, search, confidence_below, duplicates_only).await,
        Commands::Config => cmd_config(&app),
    }
}

async fn cmd_scan(app: &App) -> Result<()> {
    let engine = app.scan_engine();
    let mut subscriber = app.events.subscribe();
    let job_id = engine.start_scan(app.settings.clone()).await?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());

    loop {
        match subscriber.recv().await {
            Ok(ProgressEvent::ScanProgress {
                job_id: id,
                total_files,
                processed_files,
                new_items,
                ..
            }) if id == job_id => {
                bar.set_message(format!(
                    "{processed_files}/{total_files} scanned, {new_items} new"
                ));
                bar.tick();
            }
            Ok(ProgressEvent::ScanDone { job_id: id, status }) if id == job_id => {
                bar.finish_with_message(format!("scan finished: {status}"));
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    Ok(())
}

async fn cmd_organize(app: &App, ids: Vec<i64>) -> Result<()> {
    let engine = app.organize_engine();
    let mut subscriber = app.events.subscribe();
    let job_id = engine.start_organize(ids, app.settings.clone()).await?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());

    loop {
        match subscriber.recv().await {
            Ok(ProgressEvent::OrganizeProgress {
                job_id: id,
                total_files,
                processed_files,
                success_count,
                failed_count,
                ..
            }) if id == job_id => {
                bar.set_message(format!(
                    "{processed_files}/{total_files} organized ({success_count} ok, {failed_count} failed)"
                ));
                bar.tick();
            }
            Ok(ProgressEvent::OrganizeDone { job_id: id, status }) if id == job_id => {
                bar.finish_with_message(format!("organize finished: {status}"));
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    Ok(())
}

async fn cmd_rescan(app: &App, id: i64) -> Result<()> {
    let engine = app.scan_engine();
    let item = engine.rescan_item(id).await?;
    println!("Rescanned item {id}: {}", display_name(&item));
    Ok(())
}

async fn cmd_undo(app: &App, id: i64) -> Result<()> {
    let engine = app.organize_engine();
    let item = engine.undo(id).await?;
    println!("Reverted item {id} to {}", item.source_path().display());
    Ok(())
}

/// `getStats` (§6): total, per-status counts, and per-type catalog counts.
async fn cmd_stats(app: &App) -> Result<()> {
    let items = app.store.list_items().await?;
    let mut pending = 0;
    let mut organized = 0;
    let mut skipped = 0;
    let mut error = 0;
    let mut duplicates = 0;
    let mut tv_shows = 0;
    let mut movies = 0;
    for item in &items {
        match item.status {
            ItemStatus::Pending => pending += 1,
            ItemStatus::Organized => organized += 1,
            ItemStatus::Skipped => skipped += 1,
            ItemStatus::Error => error += 1,
        }
        if item.duplicate_of.is_some() {
            duplicates += 1;
        }
        match item.detected_type {
            MediaType::Tv => tv_shows += 1,
            MediaType::Movie => movies += 1,
            MediaType::Unknown => {}
        }
    }
    println!("Total items   : {}", items.len());
    println!("Pending       : {pending}");
    println!("Organized     : {organized}");
    println!("Duplicates    : {duplicates}");
    println!("Errors        : {error}");
    println!("Skipped       : {skipped}");
    println!("TV shows      : {tv_shows}");
    println!("Movies        : {movies}");
    Ok(())
}

fn display_name(item: &crate::models::MediaItem) -> &str {
    item.tmdb_name
        .as_deref()
        .or(item.cleaned_name.as_deref())
        .unwrap_or(&item.original_filename)
}

/// `listMediaItems` (§6): filters by type/status/search/confidenceBelow/duplicatesOnly,
/// ordered by createdAt desc.
async fn cmd_list(
    app: &App,
    status: Option<String>,
    media_type: Option<String>,
    search: Option<String>,
    confidence_below: Option<f64>,
    duplicates_only: bool,
) -> Result<()> {
    use std::str::FromStr;

    let status_filter = status.map(|s| ItemStatus::from_str(&s)).transpose()?;
    let type_filter = media_type
        .map(|t| match t.as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv_show" | "tv" => Ok(MediaType::Tv),
            other => anyhow::bail!("unknown media type filter: {other}"),
        })
        .transpose()?;
    let search = search.map(|s| s.to_lowercase());

    let mut items = app.store.list_items().await?;
    items.retain(|item| {
        status_filter.map(|s| item.status == s).unwrap_or(true)
            && type_filter.map(|t| item.detected_type == t).unwrap_or(true)
            && confidence_below.map(|c| item.confidence < c).unwrap_or(true)
            && (!duplicates_only || item.duplicate_of.is_some())
            && search
                .as_ref()
                .map(|needle| display_name(item).to_lowercase().contains(needle.as_str()))
                .unwrap_or(true)
    });
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    println!(
        "{:<6} {:<40} {:<10} {:<10} {:<8}",
        "id", "name", "type", "status", "year"
    );
    for item in &items {
        println!(
            "{:<6} {:<40} {:<10} {:<10} {:<8}",
            item.id,
            display_name(item),
            item.detected_type,
            item.status,
            item.year.map(|y| y.to_string()).unwrap_or_default(),
        );
    }
    Ok(())
}

fn cmd_config(app: &App) -> Result<()> {
    let toml_str = toml::to_string_pretty(&app.settings)?;
    println!("{toml_str}");
    Ok(())
}
