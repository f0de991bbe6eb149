//! End-to-end scenarios, scan → organize, over a real temp filesystem and a real SQLite file.
//! Covers SPEC_FULL.md §8's numbered scenarios (catalog lookups are skipped — no network key is
//! configured, so catalog match is always `None` and confidence stays at the parser's base score).

use mediatrove::catalog::CatalogClient;
use mediatrove::events::{JobCoordinator, ProgressBus, ProgressEvent};
use mediatrove::models::{ItemStatus, MediaType, Settings};
use mediatrove::organizer::OrganizeEngine;
use mediatrove::scanner::ScanEngine;
use mediatrove::store::Store;

async fn wait_for_scan_done(bus: &ProgressBus, job_id: uuid::Uuid) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(ProgressEvent::ScanDone { job_id: id, .. }) if id == job_id => return,
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}

async fn wait_for_organize_done(bus: &ProgressBus, job_id: uuid::Uuid) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(ProgressEvent::OrganizeDone { job_id: id, .. }) if id == job_id => return,
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}

struct Harness {
    store: Store,
    events: ProgressBus,
    coordinator: JobCoordinator,
}

impl Harness {
    async fn new() -> (Self, tempfile::TempDir) {
        let db_dir = tempfile::tempdir().unwrap();
        let store = Store::open(db_dir.path().join("t.db")).await.unwrap();
        (
            Harness {
                store,
                events: ProgressBus::new(),
                coordinator: JobCoordinator::new(),
            },
            db_dir,
        )
    }

    fn scan_engine(&self) -> ScanEngine {
        ScanEngine::new(
            self.store.clone(),
            CatalogClient::new(None),
            self.events.clone(),
            self.coordinator.clone(),
        )
    }

    fn organize_engine(&self) -> OrganizeEngine {
        OrganizeEngine::new(self.store.clone(), self.events.clone(), self.coordinator.clone())
    }

    async fn scan(&self, settings: Settings) {
        let engine = self.scan_engine();
        let job_id = engine.start_scan(settings).await.unwrap();
        wait_for_scan_done(&self.events, job_id).await;
    }

    async fn organize(&self, ids: Vec<i64>, settings: Settings) {
        let engine = self.organize_engine();
        let job_id = engine.start_organize(ids, settings).await.unwrap();
        wait_for_organize_done(&self.events, job_id).await;
    }
}

#[tokio::test]
async fn fresh_scan_and_organize_a_single_movie() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    tokio::fs::write(source_dir.path().join("Inception.2010.1080p.mkv"), vec![0u8; 1024])
        .await
        .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![format!("MOVIES:{}", source_dir.path().display())],
        movies_root: Some(dest_dir.path().to_path_buf()),
        tv_root: None,
        auto_organize: false,
    };

    harness.scan(settings.clone()).await;

    let items = harness.store.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.detected_type, MediaType::Movie);
    assert_eq!(item.year, Some(2010));
    assert_eq!(item.cleaned_name.as_deref(), Some("Inception"));
    assert!(item.confidence >= 40.0);

    harness.organize(vec![item.id], settings).await;

    let organized = harness.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(organized.status, ItemStatus::Organized);
    let destination = organized.destination_path.unwrap();
    assert_eq!(
        destination,
        dest_dir.path().join("Inception (2010)").join("Inception (2010).mkv")
    );
    assert!(tokio::fs::try_exists(&destination).await.unwrap());
    assert!(!tokio::fs::try_exists(source_dir.path().join("Inception.2010.1080p.mkv"))
        .await
        .unwrap());
}

#[tokio::test]
async fn multi_episode_file_plans_an_episode_range() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    tokio::fs::write(source_dir.path().join("Friends.S01E01E02.720p.mkv"), vec![0u8; 512])
        .await
        .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![format!("TV:{}", source_dir.path().display())],
        movies_root: None,
        tv_root: Some(dest_dir.path().to_path_buf()),
        auto_organize: false,
    };

    harness.scan(settings.clone()).await;

    let items = harness.store.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.season, Some(1));
    assert_eq!(item.episode, Some(1));
    assert_eq!(item.episode_end, Some(2));

    harness.organize(vec![item.id], settings).await;

    let organized = harness.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(
        organized.destination_path.unwrap(),
        dest_dir
            .path()
            .join("Friends")
            .join("Season 01")
            .join("Friends - S01E01-E02.mkv")
    );
}

#[tokio::test]
async fn rescanning_an_unchanged_tree_adds_no_new_items() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    tokio::fs::write(source_dir.path().join("The.Matrix.1999.mkv"), vec![0u8; 2048])
        .await
        .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![source_dir.path().display().to_string()],
        movies_root: Some(dest_dir.path().to_path_buf()),
        tv_root: None,
        auto_organize: false,
    };

    harness.scan(settings.clone()).await;
    let first_pass = harness.store.list_items().await.unwrap();
    assert_eq!(first_pass.len(), 1);

    harness.scan(settings).await;
    let second_pass = harness.store.list_items().await.unwrap();
    assert_eq!(second_pass.len(), 1);
    assert_eq!(first_pass[0].id, second_pass[0].id);
    assert_eq!(first_pass[0].file_size, second_pass[0].file_size);
}

#[tokio::test]
async fn near_duplicate_release_is_flagged_and_excluded_from_primary_listing() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();

    let base_size = 1_000_000u64;
    tokio::fs::write(
        source_dir.path().join("Breaking.Bad.S01E01.720p.BluRay.x264-DEMAND.mkv"),
        vec![0u8; base_size as usize],
    )
    .await
    .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![format!("TV:{}", source_dir.path().display())],
        movies_root: None,
        tv_root: Some(dest_dir.path().to_path_buf()),
        auto_organize: false,
    };
    harness.scan(settings.clone()).await;

    // Same episode, different release group, size within 5%.
    let near_size = (base_size as f64 * 1.02) as u64;
    tokio::fs::write(
        source_dir.path().join("Breaking.Bad.S01E01.1080p.WEB-DL-OtherGroup.mkv"),
        vec![0u8; near_size as usize],
    )
    .await
    .unwrap();
    harness.scan(settings).await;

    let items = harness.store.list_items().await.unwrap();
    assert_eq!(items.len(), 2);
    let duplicate = items.iter().find(|i| i.duplicate_of.is_some()).unwrap();
    let primary = items.iter().find(|i| i.duplicate_of.is_none()).unwrap();
    assert_eq!(duplicate.duplicate_of, Some(primary.id));
}

#[tokio::test]
async fn collision_with_identical_size_is_skipped_not_overwritten() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();

    let payload = vec![7u8; 4096];
    tokio::fs::write(source_dir.path().join("Dune.2021.mkv"), &payload)
        .await
        .unwrap();

    let planned_dir = dest_dir.path().join("Dune (2021)");
    tokio::fs::create_dir_all(&planned_dir).await.unwrap();
    tokio::fs::write(planned_dir.join("Dune (2021).mkv"), &payload)
        .await
        .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![format!("MOVIES:{}", source_dir.path().display())],
        movies_root: Some(dest_dir.path().to_path_buf()),
        tv_root: None,
        auto_organize: false,
    };
    harness.scan(settings.clone()).await;

    let items = harness.store.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    let id = items[0].id;

    harness.organize(vec![id], settings).await;

    let item = harness.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Skipped);
    assert!(tokio::fs::try_exists(source_dir.path().join("Dune.2021.mkv")).await.unwrap());
    assert!(tokio::fs::try_exists(planned_dir.join("Dune (2021).mkv")).await.unwrap());
}

#[tokio::test]
async fn undo_moves_an_organized_item_back_to_its_original_location() {
    let (harness, _db_dir) = Harness::new().await;
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    tokio::fs::write(source_dir.path().join("Arrival.2016.mkv"), vec![1u8; 1024])
        .await
        .unwrap();

    let settings = Settings {
        catalog_api_key: None,
        source_folders: vec![format!("MOVIES:{}", source_dir.path().display())],
        movies_root: Some(dest_dir.path().to_path_buf()),
        tv_root: None,
        auto_organize: false,
    };
    harness.scan(settings.clone()).await;
    let id = harness.store.list_items().await.unwrap()[0].id;
    harness.organize(vec![id], settings).await;

    let organize_engine = harness.organize_engine();
    let reverted = organize_engine.undo(id).await.unwrap();
    assert_eq!(reverted.status, ItemStatus::Pending);

    let item = harness.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert!(item.destination_path.is_none());
    assert!(tokio::fs::try_exists(source_dir.path().join("Arrival.2016.mkv")).await.unwrap());
}
