use crate::storage::StorageArea;
use crate::{CatcherError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Storage key holding the manifest collection
pub const MANIFESTS_KEY: &str = "videoManifests";

/// Per-video metadata record assembled from correlated detections.
///
/// All fields except `unique_id` are optional; a record grows as video,
/// subtitle, and transcript detections for the same identity arrive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoManifestRecord {
    pub unique_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_json_url: Option<String>,

    /// Epoch milliseconds of the last write to this record
    pub timestamp: i64,
}

impl VideoManifestRecord {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            ..Default::default()
        }
    }

    /// Shallow overwrite-if-present merge of an incoming partial.
    ///
    /// Fields already captured survive unless the incoming record names a
    /// replacement; the timestamp always follows the incoming record.
    pub fn merge(&mut self, incoming: VideoManifestRecord) {
        if incoming.title.is_some() {
            self.title = incoming.title;
        }
        if incoming.url.is_some() {
            self.url = incoming.url;
        }
        if incoming.ffmpeg_command.is_some() {
            self.ffmpeg_command = incoming.ffmpeg_command;
        }
        if incoming.subtitle_url.is_some() {
            self.subtitle_url = incoming.subtitle_url;
        }
        if incoming.subtitle_language.is_some() {
            self.subtitle_language = incoming.subtitle_language;
        }
        if incoming.transcript_text.is_some() {
            self.transcript_text = incoming.transcript_text;
        }
        if incoming.transcript_json_url.is_some() {
            self.transcript_json_url = incoming.transcript_json_url;
        }
        self.timestamp = incoming.timestamp;
    }
}

/// Summary counts over the persisted collection
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub with_command: usize,
    pub with_subtitles: usize,
    pub with_transcripts: usize,
}

/// Bounded, persisted, newest-first collection of video manifest records.
///
/// Every mutation is a read-modify-write against the storage area,
/// serialized through a single async mutex so concurrent pipeline
/// instances cannot clobber each other's updates.
pub struct ManifestStore {
    area: Arc<dyn StorageArea>,
    write_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self {
            area,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<VideoManifestRecord>> {
        match self.area.get(MANIFESTS_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| CatcherError::Storage(format!("Corrupt manifest collection: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, manifests: &[VideoManifestRecord]) -> Result<()> {
        let value = serde_json::to_value(manifests)
            .map_err(|e| CatcherError::Storage(format!("Cannot serialize manifests: {}", e)))?;
        self.area.set(MANIFESTS_KEY, value).await
    }

    /// Merge a partial record into the collection and persist it.
    ///
    /// The record keyed by the partial's `unique_id` is created or updated
    /// in place, stamped with the current time, and moved to the front;
    /// entries beyond `max_items` fall off the tail. Returns the updated
    /// collection.
    pub async fn upsert(
        &self,
        partial: VideoManifestRecord,
        max_items: usize,
    ) -> Result<Vec<VideoManifestRecord>> {
        if partial.unique_id.is_empty() {
            return Err(CatcherError::Validation(
                "no uniqueId provided for video manifest".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let mut manifests = self.load().await?;

        let mut record = partial;
        record.timestamp = Utc::now().timestamp_millis();

        if let Some(index) = manifests
            .iter()
            .position(|m| m.unique_id == record.unique_id)
        {
            let mut existing = manifests.remove(index);
            existing.merge(record);
            record = existing;
        }

        let saved_id = record.unique_id.clone();
        manifests.insert(0, record);
        if manifests.len() > max_items {
            manifests.truncate(max_items);
        }

        self.persist(&manifests).await?;
        debug!(
            "💾 Video manifest inserted/updated: {} ({} total)",
            saved_id,
            manifests.len()
        );
        Ok(manifests)
    }

    /// All records, newest-first (the persisted order)
    pub async fn list(&self) -> Result<Vec<VideoManifestRecord>> {
        self.load().await
    }

    /// Number of records in the collection
    pub async fn count(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Summary counts for the management surface
    pub async fn stats(&self) -> Result<StoreStats> {
        let manifests = self.load().await?;
        Ok(StoreStats {
            total_records: manifests.len(),
            with_command: manifests.iter().filter(|m| m.ffmpeg_command.is_some()).count(),
            with_subtitles: manifests.iter().filter(|m| m.subtitle_url.is_some()).count(),
            with_transcripts: manifests
                .iter()
                .filter(|m| m.transcript_text.is_some())
                .count(),
        })
    }

    /// Reset the collection to empty
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(&[]).await?;
        info!("🧹 Cleared video manifest collection");
        Ok(())
    }

    /// Drop a single record; returns whether it existed
    pub async fn remove(&self, unique_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut manifests = self.load().await?;
        let before = manifests.len();
        manifests.retain(|m| m.unique_id != unique_id);
        let removed = manifests.len() < before;
        if removed {
            self.persist(&manifests).await?;
            info!("🗑️ Removed video manifest: {}", unique_id);
        }
        Ok(removed)
    }
}
