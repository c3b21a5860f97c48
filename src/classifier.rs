use crate::config::RuleConfig;
use regex::Regex;
use std::fmt;
use url::Url;

/// Substrings that must both appear in a caption-stream URL
pub const TRANSCRIPT_JSON_MARKERS: [&str; 2] = ["transcripts", "streamContent"];

/// Category of a detected request URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCategory {
    Video,
    TranscriptMetadata,
    TranscriptJson,
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestCategory::Video => write!(f, "video"),
            RequestCategory::TranscriptMetadata => write!(f, "transcript-metadata"),
            RequestCategory::TranscriptJson => write!(f, "transcript-json"),
        }
    }
}

/// Classification outcome for one request URL.
///
/// Categories are evaluated independently and are not mutually exclusive;
/// a URL marked as a subrequest is never evaluated further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub subrequest: bool,
    pub video: bool,
    pub transcript_metadata: bool,
    pub transcript_json: bool,
}

impl Classification {
    /// True when no processing branch applies
    pub fn matches_nothing(&self) -> bool {
        !self.video && !self.transcript_metadata && !self.transcript_json
    }

    /// The categories this URL belongs to
    pub fn categories(&self) -> Vec<RequestCategory> {
        let mut categories = Vec::new();
        if self.video {
            categories.push(RequestCategory::Video);
        }
        if self.transcript_metadata {
            categories.push(RequestCategory::TranscriptMetadata);
        }
        if self.transcript_json {
            categories.push(RequestCategory::TranscriptJson);
        }
        categories
    }
}

/// Case-insensitive test for whether any keyword occurs in the URL.
///
/// An empty URL or empty keyword set matches nothing.
pub fn matches_any(url: &str, keywords: &[String]) -> bool {
    if url.is_empty() || keywords.is_empty() {
        return false;
    }
    let lower_url = url.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lower_url.contains(&keyword.to_lowercase()))
}

/// Case-sensitive test for whether every required substring occurs in the text
pub fn contains_all(text: &str, required: &[&str]) -> bool {
    required.iter().all(|substring| text.contains(substring))
}

/// Classify a request URL against the configured rule set
pub fn classify(url: &str, rules: &RuleConfig) -> Classification {
    // Traffic generated by our own secondary fetches is never reprocessed
    if matches_any(url, &rules.subrequest_params) {
        return Classification {
            subrequest: true,
            ..Default::default()
        };
    }

    let without_query = url.split_once('?').map_or(url, |(base, _)| base);

    Classification {
        subrequest: false,
        video: matches_any(without_query, &rules.video_keywords)
            || matches_any(url, &rules.video_keywords),
        transcript_metadata: matches_any(url, &rules.transcript_keywords),
        transcript_json: contains_all(url, &TRANSCRIPT_JSON_MARKERS),
    }
}

/// Check a URL against the configured observation scope.
///
/// Patterns use the browser match-pattern form `<scheme>://<host><path>`:
/// scheme `*` stands for http or https, a `*.host` pattern covers the host
/// and all subdomains, and the path part is a `*` glob. Unparseable URLs
/// are out of scope.
pub fn matches_domain_patterns(url: &str, patterns: &[String]) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    patterns
        .iter()
        .any(|pattern| matches_pattern(&parsed, pattern))
}

fn matches_pattern(url: &Url, pattern: &str) -> bool {
    let (scheme_pattern, rest) = match pattern.split_once("://") {
        Some(parts) => parts,
        None => return false,
    };

    let scheme_ok = match scheme_pattern {
        "*" => url.scheme() == "http" || url.scheme() == "https",
        other => url.scheme() == other,
    };
    if !scheme_ok {
        return false;
    }

    let (host_pattern, path_pattern) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/*"),
    };

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    let host_ok = if host_pattern == "*" {
        true
    } else if let Some(base) = host_pattern.strip_prefix("*.") {
        let base = base.to_ascii_lowercase();
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == host_pattern.to_ascii_lowercase()
    };
    if !host_ok {
        return false;
    }

    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    glob_match(&path_and_query, path_pattern)
}

/// Match text against a pattern where `*` spans any run of characters
fn glob_match(text: &str, pattern: &str) -> bool {
    let mut regex_pattern = String::from("^");
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            regex_pattern.push_str(".*");
        }
        regex_pattern.push_str(&regex::escape(literal));
    }
    regex_pattern.push('$');
    Regex::new(&regex_pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
