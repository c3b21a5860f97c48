//! Request observation pipeline.
//!
//! Classifies each observed request URL, runs the matching capture
//! branches, and records results in the manifest store. Branches fail
//! independently; one bad response never takes down the pipeline.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::boundary::{Notifier, PageTitleSource};
use crate::capture::RequestDetails;
use crate::classifier::{self, RequestCategory};
use crate::config::CatcherConfig;
use crate::identity;
use crate::store::{ManifestStore, VideoManifestRecord};
use crate::transcript::TranscriptFetcher;
use crate::{CatcherError, Result};

/// Strip the named query parameters from a URL.
///
/// Each removed parameter keeps the surrounding joiners valid: a
/// parameter consumed together with a trailing `&` re-emits the leading
/// joiner so the next parameter stays attached.
pub fn remove_query_params(url: &str, remove_params: &[String]) -> String {
    let mut modified = url.to_string();
    for param in remove_params {
        let pattern = format!(r"([&?]){}=[^&]*(&|$)", regex::escape(param));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        modified = re
            .replace_all(&modified, |caps: &regex::Captures| {
                if &caps[2] == "&" {
                    caps[1].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
    }
    modified
}

/// Render the download command template.
///
/// Only the first occurrence of each placeholder is substituted.
pub fn render_command_template(template: &str, url: &str, file_name: &str) -> String {
    template
        .replacen("{url}", url, 1)
        .replacen("{filename}", file_name, 1)
}

/// Trim a display title and append the capture extension unless the
/// name already carries it (case-insensitive on the name side).
pub fn apply_file_extension(title: &str, extension: &str) -> String {
    let trimmed = title.trim();
    if trimmed.to_lowercase().ends_with(extension) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, extension)
    }
}

/// Outcome of a single capture branch within one request event
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub category: RequestCategory,
    /// Whether the branch wrote a record to the store
    pub stored: bool,
    pub error: Option<String>,
}

/// Structured outcome for one observed request event
#[derive(Debug, Clone)]
pub struct RequestReport {
    pub url: String,
    /// False when the URL fell outside the configured domain patterns
    pub in_scope: bool,
    /// True when the event was the observer's own augmented traffic
    pub skipped_as_subrequest: bool,
    pub branches: Vec<BranchOutcome>,
}

impl RequestReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            in_scope: true,
            skipped_as_subrequest: false,
            branches: Vec::new(),
        }
    }

    /// Number of branches that wrote a record
    pub fn records_written(&self) -> usize {
        self.branches.iter().filter(|b| b.stored).count()
    }

    pub fn has_errors(&self) -> bool {
        self.branches.iter().any(|b| b.error.is_some())
    }
}

/// Configuration and fetcher swapped together on reconfigure
struct ActiveState {
    config: Arc<CatcherConfig>,
    fetcher: Arc<TranscriptFetcher>,
}

/// Passive observer turning request events into manifest records.
///
/// Every event snapshots the active configuration once, so a
/// reconfigure never changes rules mid-pipeline.
pub struct RequestObserver {
    state: RwLock<ActiveState>,
    store: Arc<ManifestStore>,
    titles: Arc<dyn PageTitleSource>,
    notifier: Arc<dyn Notifier>,
}

impl RequestObserver {
    pub fn new(
        config: CatcherConfig,
        store: Arc<ManifestStore>,
        titles: Arc<dyn PageTitleSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let fetcher = TranscriptFetcher::new(&config.fetcher)?;
        Ok(Self {
            state: RwLock::new(ActiveState {
                config: Arc::new(config),
                fetcher: Arc::new(fetcher),
            }),
            store,
            titles,
            notifier,
        })
    }

    /// Replace the active configuration in one step.
    ///
    /// The replacement is validated before it takes effect; events
    /// already in flight finish under the configuration they started
    /// with.
    pub async fn reconfigure(&self, config: CatcherConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| CatcherError::Validation(e.to_string()))?;
        let fetcher = TranscriptFetcher::new(&config.fetcher)?;

        let mut state = self.state.write().await;
        *state = ActiveState {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
        };
        info!("🔄 Observer reconfigured");
        Ok(())
    }

    pub fn store(&self) -> Arc<ManifestStore> {
        Arc::clone(&self.store)
    }

    async fn snapshot(&self) -> (Arc<CatcherConfig>, Arc<TranscriptFetcher>) {
        let state = self.state.read().await;
        (Arc::clone(&state.config), Arc::clone(&state.fetcher))
    }

    /// Run the full pipeline for one observed request event.
    ///
    /// Never returns an error: every branch failure is captured in the
    /// report and logged, and the remaining branches still run.
    pub async fn process_request(&self, details: &RequestDetails) -> RequestReport {
        let (config, fetcher) = self.snapshot().await;
        let url = details.url.as_str();
        let mut report = RequestReport::new(url);

        if !classifier::matches_domain_patterns(url, &config.rules.domains) {
            report.in_scope = false;
            return report;
        }

        let classification = classifier::classify(url, &config.rules);
        if classification.subrequest {
            debug!("Skipping augmented subrequest traffic: {}", url);
            report.skipped_as_subrequest = true;
            return report;
        }

        if classification.video {
            let outcome = self.process_video(details, &config).await;
            report
                .branches
                .push(Self::branch_outcome(RequestCategory::Video, outcome));
        }

        if classification.transcript_metadata {
            let outcome = self
                .process_transcript_metadata(url, &config, &fetcher)
                .await;
            report.branches.push(Self::branch_outcome(
                RequestCategory::TranscriptMetadata,
                outcome,
            ));
        }

        if classification.transcript_json {
            let outcome = self.process_transcript_json(url, &config, &fetcher).await;
            report.branches.push(Self::branch_outcome(
                RequestCategory::TranscriptJson,
                outcome,
            ));
        }

        report
    }

    fn branch_outcome(category: RequestCategory, outcome: Result<bool>) -> BranchOutcome {
        match outcome {
            Ok(stored) => BranchOutcome {
                category,
                stored,
                error: None,
            },
            Err(e) => {
                error!("❌ Error in {} branch: {}", category, e);
                BranchOutcome {
                    category,
                    stored: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Capture a streaming-video manifest URL.
    async fn process_video(
        &self,
        details: &RequestDetails,
        config: &CatcherConfig,
    ) -> Result<bool> {
        info!("🎯 Video manifest detected: {}", details.url);

        let cleaned_url = remove_query_params(&details.url, &config.rules.remove_params);
        debug!("Cleaned manifest URL: {}", cleaned_url);

        // Page title, then the recorded tab title, then a name derived
        // from the manifest URL itself
        let title = match self.titles.active_title().await {
            Some(title) if !title.is_empty() => title,
            _ => match &details.tab_title {
                Some(title) if !title.is_empty() => title.clone(),
                _ => identity::derive_file_name(&cleaned_url),
            },
        };
        let file_name = apply_file_extension(&title, &config.capture.file_extension);

        let ffmpeg_command =
            render_command_template(&config.capture.ffmpeg_template, &cleaned_url, &file_name);
        info!("🎬 FFMPEG command: {}", ffmpeg_command);

        let mut partial = VideoManifestRecord::new(identity::derive_unique_id(&cleaned_url));
        partial.title = Some(file_name.clone());
        partial.url = Some(cleaned_url);
        partial.ffmpeg_command = Some(ffmpeg_command);
        self.store.upsert(partial, config.capture.max_items).await?;

        if config.capture.notify_on_detection {
            self.notifier
                .notify("Sharepoint Video Detected", &format!("Found: {}", file_name))
                .await;
        }

        Ok(true)
    }

    /// Follow a transcript listing to its subtitle download track.
    async fn process_transcript_metadata(
        &self,
        url: &str,
        config: &CatcherConfig,
        fetcher: &TranscriptFetcher,
    ) -> Result<bool> {
        debug!("Potential subtitle listing detected: {}", url);

        let track = match fetcher
            .fetch_subtitle_track(url, &config.rules.subrequest_params)
            .await?
        {
            Some(track) => track,
            None => return Ok(false),
        };
        info!("📝 Found VTT URL: {}", track.download_url);

        let unique_id =
            identity::extract_path_token(url, identity::DEFAULT_ID_TOKEN).unwrap_or_default();
        let mut partial = VideoManifestRecord::new(unique_id);
        partial.subtitle_url = Some(track.download_url);
        partial.subtitle_language = Some(track.language);
        self.store.upsert(partial, config.capture.max_items).await?;
        info!("✅ Added subtitle URL to video record");

        Ok(true)
    }

    /// Pull the caption JSON body and flatten it to tab-indented text.
    async fn process_transcript_json(
        &self,
        url: &str,
        config: &CatcherConfig,
        fetcher: &TranscriptFetcher,
    ) -> Result<bool> {
        debug!("Potential transcript content detected: {}", url);

        let transcript_text = match fetcher
            .fetch_caption_text(url, &config.rules.subrequest_params)
            .await?
        {
            Some(text) => text,
            None => return Ok(false),
        };

        let unique_id =
            identity::extract_path_token(url, identity::DEFAULT_ID_TOKEN).unwrap_or_default();
        let mut partial = VideoManifestRecord::new(unique_id);
        partial.transcript_text = Some(transcript_text);
        partial.transcript_json_url = Some(url.to_string());
        self.store.upsert(partial, config.capture.max_items).await?;
        info!("✅ Added transcript text to video record");

        Ok(true)
    }
}

/// Aggregate counters for a processed event stream
#[derive(Debug, Clone, Default)]
pub struct ObserverStats {
    pub events: usize,
    pub out_of_scope: usize,
    pub skipped_subrequests: usize,
    /// Events where at least one capture branch ran
    pub matched_events: usize,
    pub records_written: usize,
    pub branch_errors: usize,
}

impl ObserverStats {
    pub fn absorb(&mut self, report: &RequestReport) {
        self.events += 1;
        if !report.in_scope {
            self.out_of_scope += 1;
            return;
        }
        if report.skipped_as_subrequest {
            self.skipped_subrequests += 1;
        }
        if !report.branches.is_empty() {
            self.matched_events += 1;
        }
        self.records_written += report.records_written();
        self.branch_errors += report.branches.iter().filter(|b| b.error.is_some()).count();
    }

    pub fn summary(&self) -> String {
        format!(
            "Events: {} ({} out of scope, {} subrequests skipped)\n\
             Matched: {} events, {} records written, {} branch errors",
            self.events,
            self.out_of_scope,
            self.skipped_subrequests,
            self.matched_events,
            self.records_written,
            self.branch_errors
        )
    }
}

/// Drives an observer over a stream of request events.
///
/// Each event is processed on its own task; a semaphore bounds how many
/// run at once, and every event yields a report on an internal channel.
pub struct ObserverRuntime {
    observer: Arc<RequestObserver>,
    max_concurrent: usize,
}

impl ObserverRuntime {
    pub fn new(observer: Arc<RequestObserver>, max_concurrent: usize) -> Self {
        Self {
            observer,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Consume events until the channel closes, then return aggregate
    /// stats once every in-flight task has reported.
    pub async fn run(&self, mut events: mpsc::Receiver<RequestDetails>) -> ObserverStats {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (report_tx, mut report_rx) = mpsc::channel::<RequestReport>(self.max_concurrent);

        // Reports are drained concurrently so slow fetches never stall
        // event admission
        let collector = tokio::spawn(async move {
            let mut stats = ObserverStats::default();
            while let Some(report) = report_rx.recv().await {
                if report.has_errors() {
                    warn!("⚠️ Event finished with errors: {}", report.url);
                }
                stats.absorb(&report);
            }
            stats
        });

        while let Some(details) = events.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let observer = Arc::clone(&self.observer);
            let tx = report_tx.clone();
            tokio::spawn(async move {
                let report = observer.process_request(&details).await;
                let _ = tx.send(report).await;
                drop(permit);
            });
        }

        drop(report_tx);
        match collector.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("⚠️ Report collector failed: {}", e);
                ObserverStats::default()
            }
        }
    }
}
