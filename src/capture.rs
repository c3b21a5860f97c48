//! Request event feed.
//!
//! Replays observed request events from a capture file or stdin. Lines
//! starting with `{` are parsed as JSON event objects; anything else is
//! treated as a bare request URL. Malformed lines are logged and
//! skipped so one bad entry never stops the feed.

use std::path::Path;

use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::Result;

/// One observed network request event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub url: String,

    /// Title of the tab the request originated from, when recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_title: Option<String>,
}

impl RequestDetails {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tab_title: None,
        }
    }
}

fn parse_line(line: &str) -> Option<RequestDetails> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        match serde_json::from_str::<RequestDetails>(trimmed) {
            Ok(details) => Some(details),
            Err(e) => {
                warn!("⚠️ Skipping malformed capture line: {}", e);
                None
            }
        }
    } else {
        Some(RequestDetails::new(trimmed))
    }
}

/// Line-oriented reader for capture feeds
pub struct CaptureReader {
    lines: Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>,
}

impl CaptureReader {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        debug!("📄 Reading capture feed from {}", path.display());
        Ok(Self::from_reader(Box::new(file)))
    }

    pub fn stdin() -> Self {
        Self::from_reader(Box::new(tokio::io::stdin()))
    }

    pub fn from_reader(reader: Box<dyn AsyncRead + Unpin + Send>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next event from the feed, skipping unusable lines
    pub async fn next_event(&mut self) -> Result<Option<RequestDetails>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    if let Some(details) = parse_line(&line) {
                        return Ok(Some(details));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// Turn the reader into a stream of events
    pub fn into_stream(self) -> impl Stream<Item = RequestDetails> + Send {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_event().await {
                Ok(Some(details)) => Some((details, reader)),
                Ok(None) => None,
                Err(e) => {
                    warn!("⚠️ Capture feed ended early: {}", e);
                    None
                }
            }
        })
    }

    /// Forward every event into a processing channel, returning how
    /// many were sent before the receiver went away
    pub async fn feed(self, tx: mpsc::Sender<RequestDetails>) -> usize {
        let mut stream = Box::pin(self.into_stream());
        let mut forwarded = 0usize;
        while let Some(details) = stream.next().await {
            if tx.send(details).await.is_err() {
                break;
            }
            forwarded += 1;
        }
        forwarded
    }
}
