//! SharePoint Video Catcher - Rust Implementation
//!
//! Passive observation of network request events on SharePoint-style
//! platforms: detects streaming-video manifest URLs and transcript API
//! calls, and assembles per-video metadata records (manifest URL, derived
//! filename, ffmpeg command, subtitle/transcript text) into a bounded,
//! persisted, newest-first history.

pub mod boundary;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod identity;
pub mod observer;
pub mod storage;
pub mod store;
pub mod transcript;

// Re-export main types for easy access
pub use crate::boundary::{LogNotifier, Notifier, PageTitleSource, StaticTitleSource};
pub use crate::capture::{CaptureReader, RequestDetails};
pub use crate::classifier::{Classification, RequestCategory};
pub use crate::config::{CatcherConfig, ConfigBuilder};
pub use crate::observer::{ObserverRuntime, RequestObserver, RequestReport};
pub use crate::storage::{JsonFileStore, MemoryStore, StorageArea};
pub use crate::store::{ManifestStore, VideoManifestRecord};
pub use crate::transcript::{ApiPayload, TranscriptFetcher};

/// Result type for catcher operations
pub type Result<T> = std::result::Result<T, CatcherError>;

/// Error types for catcher operations
#[derive(thiserror::Error, Debug)]
pub enum CatcherError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Fetch failed with HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
