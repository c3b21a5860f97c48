use crate::config::FetcherConfig;
use crate::{CatcherError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Language assumed for subtitle tracks that carry no tag
pub const DEFAULT_SUBTITLE_LANGUAGE: &str = "en-US";

/// Name emitted for caption entries without a speaker display name
pub const DEFAULT_SPEAKER_NAME: &str = "Speaker";

/// Parsed body of a secondary API fetch
#[derive(Debug, Clone)]
pub enum ApiPayload {
    Json(Value),
    Text(String),
}

/// Subtitle track selected from a transcript-metadata response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub download_url: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptListing {
    media: Option<MediaElement>,
}

#[derive(Debug, Deserialize)]
struct MediaElement {
    transcripts: Option<Vec<TranscriptEntry>>,
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    #[serde(rename = "transcriptType")]
    transcript_type: Option<String>,
    #[serde(rename = "temporaryDownloadUrl")]
    temporary_download_url: Option<String>,
    #[serde(rename = "languageTag")]
    language_tag: Option<String>,
}

/// Issues secondary fetches against transcript-bearing URLs
pub struct TranscriptFetcher {
    client: reqwest::Client,
}

impl TranscriptFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Append each subrequest marker missing from the URL, so the observer
    /// can recognize and skip the resulting traffic as our own
    pub fn build_fetch_url(url: &str, subrequest_params: &[String]) -> String {
        let mut fetch_url = url.to_string();
        for param in subrequest_params {
            if fetch_url.contains(param.as_str()) {
                continue;
            }
            let separator = if fetch_url.contains('?') { '&' } else { '?' };
            fetch_url.push(separator);
            fetch_url.push_str(param);
        }
        fetch_url
    }

    /// Fetch a transcript API URL and return its parsed body.
    ///
    /// The body is JSON when the response declares it; anything else comes
    /// back as raw text with a warning.
    pub async fn fetch_api_data(
        &self,
        url: &str,
        subrequest_params: &[String],
    ) -> Result<ApiPayload> {
        let fetch_url = Self::build_fetch_url(url, subrequest_params);
        debug!("🔍 Fetching API data from: {}", fetch_url);

        let response = self.client.get(&fetch_url).send().await?;

        if !response.status().is_success() {
            return Err(CatcherError::HttpStatus {
                status: response.status().as_u16(),
                url: fetch_url,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("application/json") {
            Ok(ApiPayload::Json(response.json().await?))
        } else {
            warn!(
                "⚠️ Non-JSON response for {} (content-type: {})",
                fetch_url, content_type
            );
            Ok(ApiPayload::Text(response.text().await?))
        }
    }

    /// Fetch a transcript-metadata URL and pick its subtitle track, if any
    pub async fn fetch_subtitle_track(
        &self,
        url: &str,
        subrequest_params: &[String],
    ) -> Result<Option<SubtitleTrack>> {
        match self.fetch_api_data(url, subrequest_params).await? {
            ApiPayload::Json(payload) => Ok(select_subtitle_track(&payload)),
            ApiPayload::Text(_) => Ok(None),
        }
    }

    /// Fetch a caption-stream URL and format its entries as plain text
    pub async fn fetch_caption_text(
        &self,
        url: &str,
        subrequest_params: &[String],
    ) -> Result<Option<String>> {
        match self.fetch_api_data(url, subrequest_params).await? {
            ApiPayload::Json(payload) => Ok(format_caption_entries(&payload)),
            ApiPayload::Text(_) => {
                warn!("⚠️ No valid transcript entries found in response");
                Ok(None)
            }
        }
    }
}

/// Select the first subtitle track carrying a download URL.
///
/// A missing tag, an empty listing, or a malformed payload all mean "no
/// subtitle" rather than an error.
pub fn select_subtitle_track(payload: &Value) -> Option<SubtitleTrack> {
    let listing: TranscriptListing = serde_json::from_value(payload.clone()).ok()?;
    let transcripts = listing.media?.transcripts?;

    transcripts.into_iter().find_map(|entry| {
        if entry.transcript_type.as_deref() != Some("subtitle") {
            return None;
        }
        let download_url = entry.temporary_download_url.filter(|u| !u.is_empty())?;
        let language = entry
            .language_tag
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBTITLE_LANGUAGE.to_string());
        Some(SubtitleTrack {
            download_url,
            language,
        })
    })
}

/// Format caption entries as a speaker-grouped plain-text transcript.
///
/// A speaker name line is emitted whenever the entry's speaker id differs
/// from the previous one; every entry's text goes on its own tab-indented
/// line; lines are joined with CRLF. Returns `None` (with a warning) when
/// the payload has no entries array.
pub fn format_caption_entries(payload: &Value) -> Option<String> {
    let entries = match payload.get("entries").and_then(Value::as_array) {
        Some(entries) => entries,
        None => {
            warn!("⚠️ No valid transcript entries found in response");
            return None;
        }
    };

    let mut lines: Vec<String> = Vec::new();
    // Null and absent speaker ids are distinct grouping states
    let mut current_speaker: Option<Value> = Some(Value::Null);

    for entry in entries {
        let speaker = entry.get("speakerId").cloned();
        if speaker != current_speaker {
            let name = entry
                .get("speakerDisplayName")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_SPEAKER_NAME);
            lines.push(name.to_string());
            current_speaker = speaker;
        }

        let text = entry.get("text").and_then(Value::as_str).unwrap_or("");
        lines.push(format!("\t{}", text));
    }

    Some(lines.join("\r\n"))
}
