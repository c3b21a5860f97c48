use std::sync::Arc;

use sp_video_catcher::boundary::{LogNotifier, StaticTitleSource};
use sp_video_catcher::capture::{CaptureReader, RequestDetails};
use sp_video_catcher::config::ConfigBuilder;
use sp_video_catcher::observer::{ObserverRuntime, RequestObserver};
use sp_video_catcher::storage::JsonFileStore;
use sp_video_catcher::store::{ManifestStore, VideoManifestRecord};
use tempfile::TempDir;
use tokio::sync::mpsc;

async fn file_backed_store(dir: &TempDir) -> Arc<ManifestStore> {
    let area = JsonFileStore::new(dir.path().to_path_buf()).await.unwrap();
    Arc::new(ManifestStore::new(Arc::new(area)))
}

fn observer_over(store: Arc<ManifestStore>, title: Option<&str>) -> RequestObserver {
    let titles = match title {
        Some(title) => StaticTitleSource::new(title),
        None => StaticTitleSource::none(),
    };
    RequestObserver::new(
        ConfigBuilder::new().build(),
        store,
        Arc::new(titles),
        Arc::new(LogNotifier),
    )
    .unwrap()
}

#[tokio::test]
async fn test_video_capture_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    // First run captures one manifest
    let store = file_backed_store(&temp_dir).await;
    let observer = observer_over(Arc::clone(&store), Some("Weekly Sync"));
    let event = RequestDetails::new(
        "https://tenant.sharepoint.com/_api/v2.0/videomanifest?id=%2Fsites%2Fteam%2Fclip.mp4&enableCdn=true",
    );
    let report = observer.process_request(&event).await;
    assert_eq!(report.records_written(), 1);

    // A fresh store over the same directory sees the persisted record,
    // keyed by the manifest endpoint since the URL carries no docid
    let reopened = file_backed_store(&temp_dir).await;
    let records = reopened.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].unique_id,
        "https://tenant.sharepoint.com/_api/v2.0/videomanifest"
    );
    assert_eq!(records[0].title.as_deref(), Some("Weekly Sync.mp4"));
    assert_eq!(
        records[0].url.as_deref(),
        Some("https://tenant.sharepoint.com/_api/v2.0/videomanifest?id=%2Fsites%2Fteam%2Fclip.mp4")
    );
    assert!(records[0].timestamp > 0);
}

#[tokio::test]
async fn test_transcript_fields_merge_into_video_record() {
    let temp_dir = TempDir::new().unwrap();
    let store = file_backed_store(&temp_dir).await;
    let observer = observer_over(Arc::clone(&store), Some("All Hands"));

    // Manifest URL whose docid embeds the drive item path
    let manifest_url = "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2F_api%2Fv2.0%2Fdrives%2Fb%21abc%2Fitems%2FITEM77%2Fcontent";
    observer
        .process_request(&RequestDetails::new(manifest_url))
        .await;

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].unique_id, "ITEM77");
    let command = records[0].ffmpeg_command.clone().unwrap();

    // A later subtitle capture for the same drive item merges in place
    let mut partial = VideoManifestRecord::new("ITEM77");
    partial.subtitle_url = Some("https://cdn.example/subtitle.vtt".to_string());
    partial.subtitle_language = Some("en-US".to_string());
    store.upsert(partial, 20).await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.subtitle_url.as_deref(),
        Some("https://cdn.example/subtitle.vtt")
    );
    assert_eq!(record.subtitle_language.as_deref(), Some("en-US"));
    assert_eq!(record.ffmpeg_command.as_deref(), Some(command.as_str()));
    assert_eq!(record.title.as_deref(), Some("All Hands.mp4"));
}

#[tokio::test]
async fn test_capture_feed_replay_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let feed_path = temp_dir.path().join("capture.jsonl");
    let feed = concat!(
        "{\"url\":\"https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2Fdrives%2Fb%21ab%2Fitems%2FVID1%2Fcontent&id=%2Fsites%2Fa%2Ffirst.mp4\",\"tabTitle\":\"First Video\"}\n",
        "https://example.com/videomanifest?id=ignored\n",
        "{broken\n",
        "https://tenant.sharepoint.com/_api/videomanifest?id=%2Fsites%2Fa%2Fsecond.mp4&subRequest=true\n",
        "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2Fdrives%2Fb%21ab%2Fitems%2FVID3%2Fcontent&id=%2Fsites%2Fa%2Fthird.mp4\n",
    );
    tokio::fs::write(&feed_path, feed).await.unwrap();

    let store = file_backed_store(&temp_dir).await;
    let observer = Arc::new(observer_over(Arc::clone(&store), None));
    // One worker keeps event completion in feed order
    let runtime = ObserverRuntime::new(Arc::clone(&observer), 1);

    let reader = CaptureReader::from_file(&feed_path).await.unwrap();
    let (tx, rx) = mpsc::channel(16);
    let feeder = tokio::spawn(reader.feed(tx));

    let stats = runtime.run(rx).await;
    assert_eq!(feeder.await.unwrap(), 4);

    assert_eq!(stats.events, 4);
    assert_eq!(stats.out_of_scope, 1);
    assert_eq!(stats.skipped_subrequests, 1);
    assert_eq!(stats.matched_events, 2);
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.branch_errors, 0);

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unique_id, "VID3");
    assert_eq!(records[0].title.as_deref(), Some("third.mp4"));
    assert_eq!(records[1].unique_id, "VID1");
    assert_eq!(records[1].title.as_deref(), Some("First Video.mp4"));
}

#[tokio::test]
async fn test_history_bound_keeps_newest() {
    let temp_dir = TempDir::new().unwrap();
    let store = file_backed_store(&temp_dir).await;
    let observer = RequestObserver::new(
        ConfigBuilder::new().with_max_items(3).build(),
        Arc::clone(&store),
        Arc::new(StaticTitleSource::none()),
        Arc::new(LogNotifier),
    )
    .unwrap();

    // Five distinct drive items; each docid keys its own record
    for n in 1..=5 {
        let url = format!(
            "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2Fdrives%2Fb%21ab%2Fitems%2FVID{}%2Fcontent",
            n
        );
        observer.process_request(&RequestDetails::new(url)).await;
    }

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 3);
    let ids: Vec<&str> = records.iter().map(|r| r.unique_id.as_str()).collect();
    assert_eq!(ids, vec!["VID5", "VID4", "VID3"]);
}

#[tokio::test]
async fn test_redetection_moves_record_to_front() {
    let temp_dir = TempDir::new().unwrap();
    let store = file_backed_store(&temp_dir).await;
    let observer = observer_over(Arc::clone(&store), None);

    let first = "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2Fdrives%2Fb%21ab%2Fitems%2FITEMA%2Fcontent";
    let second = "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2Fdrives%2Fb%21ab%2Fitems%2FITEMB%2Fcontent";
    observer.process_request(&RequestDetails::new(first)).await;
    observer.process_request(&RequestDetails::new(second)).await;
    observer.process_request(&RequestDetails::new(first)).await;

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unique_id, "ITEMA");
    assert_eq!(records[1].unique_id, "ITEMB");
}
