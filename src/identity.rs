use regex::Regex;
use tracing::warn;
use url::Url;

/// Path token marking the item identifier segment in SharePoint URLs
pub const DEFAULT_ID_TOKEN: &str = "items";

/// Fallback filename when none can be derived from the URL
pub const DEFAULT_VIDEO_FILE_NAME: &str = "video.mp4";

/// Get a query parameter value (percent-decoded) from a parsed URL
fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Extract the path segment immediately following `/{token}/` from a URL.
///
/// Returns `None` when the pattern is absent or the URL does not parse.
pub fn extract_path_token(url: &str, token: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let pattern = format!(r"/{}/([^/]+)", regex::escape(token));
    let re = Regex::new(&pattern).ok()?;
    re.captures(parsed.path())
        .map(|captures| captures[1].to_string())
}

/// Derive a stable unique identifier for a video from its URL.
///
/// Prefers the `docid` query parameter: when its decoded value is itself an
/// absolute URL, the `items` path token of that URL wins; otherwise the
/// `docid` value is used as-is. Without `docid` the identifier is
/// `origin + path` with the query stripped. Never fails: an unparseable
/// URL becomes its own identifier.
pub fn derive_unique_id(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("⚠️ Unparseable URL used verbatim as unique id: {}", e);
            return url.to_string();
        }
    };

    if let Some(docid) = query_param(&parsed, "docid") {
        // A docid holding an encoded URL yields its items token; any other
        // docid is the identity itself
        if let Ok(decoded) = urlencoding::decode(&docid) {
            if decoded.starts_with("http") {
                if let Some(token) = extract_path_token(&decoded, DEFAULT_ID_TOKEN) {
                    return token;
                }
            }
        }
        docid
    } else {
        // No docid: the URL itself without query parameters is the identity
        format!("{}{}", parsed.origin().ascii_serialization(), parsed.path())
    }
}

/// Derive a display filename from a video URL.
///
/// Takes the final `/`-delimited segment of the decoded `id` query
/// parameter. Any missing piece yields the default name.
pub fn derive_file_name(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("⚠️ Unparseable URL, using default filename: {}", e);
            return DEFAULT_VIDEO_FILE_NAME.to_string();
        }
    };

    if let Some(id) = query_param(&parsed, "id") {
        if let Ok(decoded) = urlencoding::decode(&id) {
            if let Some(slash) = decoded.rfind('/') {
                let name = &decoded[slash + 1..];
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    DEFAULT_VIDEO_FILE_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_path_token() {
        let url = "https://tenant.sharepoint.com/_api/v2.1/drives/b!x/items/42/content";
        assert_eq!(extract_path_token(url, "items"), Some("42".to_string()));

        let url = "https://tenant.sharepoint.com/_api/v2.1/drives/b!x/content";
        assert_eq!(extract_path_token(url, "items"), None);

        assert_eq!(extract_path_token("not a url", "items"), None);
    }

    #[test]
    fn test_extract_path_token_ignores_query() {
        let url = "https://host.example/_api/items/abc123?select=items/99";
        assert_eq!(extract_path_token(url, "items"), Some("abc123".to_string()));
    }

    #[test]
    fn test_unique_id_from_encoded_docid_url() {
        let url = "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Ftenant.sharepoint.com%2F_api%2Fv2.1%2Fdrives%2Fb!x%2Fitems%2F42%2Fcontent";
        assert_eq!(derive_unique_id(url), "42");
    }

    #[test]
    fn test_unique_id_plain_docid_value() {
        let url = "https://tenant.sharepoint.com/_api/videomanifest?docid=VIDEO-42";
        assert_eq!(derive_unique_id(url), "VIDEO-42");
    }

    #[test]
    fn test_unique_id_docid_url_without_token() {
        // docid decodes to a URL but carries no items segment
        let url = "https://tenant.sharepoint.com/_api/videomanifest?docid=https%3A%2F%2Fother.example%2Fmedia%2Fstream";
        assert_eq!(derive_unique_id(url), "https://other.example/media/stream");
    }

    #[test]
    fn test_unique_id_falls_back_to_origin_and_path() {
        let a = "https://tenant.sharepoint.com/media/videomanifest?alt=json&session=1";
        let b = "https://tenant.sharepoint.com/media/videomanifest?session=2";
        let id = derive_unique_id(a);
        assert_eq!(id, "https://tenant.sharepoint.com/media/videomanifest");
        assert_eq!(id, derive_unique_id(b));
    }

    #[test]
    fn test_unique_id_unparseable_url_is_identity() {
        assert_eq!(derive_unique_id("nonsense"), "nonsense");
        assert_eq!(derive_unique_id(""), "");
    }

    #[test]
    fn test_file_name_from_id_param() {
        let url = "https://tenant.sharepoint.com/_api/videomanifest?id=%2Fsites%2Fteam%2FShared%20Documents%2FTraining%20Session.mp4&enableCdn=true";
        assert_eq!(derive_file_name(url), "Training Session.mp4");
    }

    #[test]
    fn test_file_name_defaults() {
        // No id parameter at all
        assert_eq!(
            derive_file_name("https://tenant.sharepoint.com/_api/videomanifest"),
            DEFAULT_VIDEO_FILE_NAME
        );
        // id without any path separator
        assert_eq!(
            derive_file_name("https://tenant.sharepoint.com/x?id=abc"),
            DEFAULT_VIDEO_FILE_NAME
        );
        // id ending in a separator
        assert_eq!(
            derive_file_name("https://tenant.sharepoint.com/x?id=%2Fsites%2Fteam%2F"),
            DEFAULT_VIDEO_FILE_NAME
        );
        // Unparseable URL
        assert_eq!(derive_file_name("::::"), DEFAULT_VIDEO_FILE_NAME);
    }

    #[test]
    fn test_unique_id_is_deterministic() {
        let url = "https://tenant.sharepoint.com/_api/videomanifest?docid=VIDEO-7";
        assert_eq!(derive_unique_id(url), derive_unique_id(url));
    }
}
