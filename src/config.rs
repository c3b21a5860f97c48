use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the SharePoint Video Catcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatcherConfig {
    /// Request classification rules
    pub rules: RuleConfig,

    /// Manifest capture settings
    pub capture: CaptureConfig,

    /// Secondary transcript fetch settings
    pub fetcher: FetcherConfig,

    /// Persistence settings
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// URL match patterns scoping which requests are observed at all
    pub domains: Vec<String>,

    /// Case-insensitive substrings marking a video manifest URL
    pub video_keywords: Vec<String>,

    /// Case-insensitive substrings marking a transcript-metadata URL
    pub transcript_keywords: Vec<String>,

    /// Query markers identifying this system's own secondary fetches
    pub subrequest_params: Vec<String>,

    /// Query parameters stripped from detected manifest URLs
    pub remove_params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Extension appended to derived filenames when absent
    pub file_extension: String,

    /// Download command template with {url} and {filename} placeholders
    pub ffmpeg_template: String,

    /// Maximum number of records kept in the manifest collection
    pub max_items: usize,

    /// Raise a user notification on each video detection
    pub notify_on_detection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,

    /// User agent sent on secondary fetches
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted manifest collection
    pub data_dir: PathBuf,
}

impl CatcherConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        // Try to load from various locations
        let config_paths = [
            "sp-video-catcher.toml",
            "config/sp-video-catcher.toml",
            "~/.config/sp-video-catcher/config.toml",
            "/etc/sp-video-catcher/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to defaults with environment overrides
        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path, e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Cannot parse config file {}: {}", path, e))?;
        tracing::info!("📄 Loaded configuration from: {}", path);
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(max_items) = std::env::var("SPVC_MAX_ITEMS") {
            config.capture.max_items = max_items.parse().unwrap_or(20);
        }

        if let Ok(extension) = std::env::var("SPVC_FILE_EXTENSION") {
            config.capture.file_extension = extension;
        }

        if let Ok(template) = std::env::var("SPVC_FFMPEG_TEMPLATE") {
            config.capture.ffmpeg_template = template;
        }

        if let Ok(data_dir) = std::env::var("SPVC_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(timeout) = std::env::var("SPVC_FETCH_TIMEOUT") {
            config.fetcher.request_timeout_seconds = timeout.parse().unwrap_or(30);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rules.domains.is_empty() {
            return Err(anyhow!("at least one domain pattern is required"));
        }

        if self.capture.max_items == 0 {
            return Err(anyhow!("max_items must be greater than 0"));
        }

        if !self.capture.ffmpeg_template.contains("{url}")
            || !self.capture.ffmpeg_template.contains("{filename}")
        {
            return Err(anyhow!(
                "ffmpeg_template must contain {{url}} and {{filename}} placeholders"
            ));
        }

        if !self.capture.file_extension.starts_with('.') {
            return Err(anyhow!("file_extension must start with a dot"));
        }

        if self.fetcher.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be greater than 0"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Catcher Configuration:\n\
            - Observed Domains: {}\n\
            - Video Keywords: {}\n\
            - Transcript Keywords: {}\n\
            - Max Items: {}\n\
            - File Extension: {}\n\
            - Notify On Detection: {}\n\
            - Data Directory: {}",
            self.rules.domains.join(", "),
            self.rules.video_keywords.join(", "),
            self.rules.transcript_keywords.join(", "),
            self.capture.max_items,
            self.capture.file_extension,
            self.capture.notify_on_detection,
            self.storage.data_dir.display()
        )
    }
}

impl Default for CatcherConfig {
    fn default() -> Self {
        Self {
            rules: RuleConfig {
                domains: vec![
                    "*://*.sharepoint.com/*".to_string(),
                    "*://*.svc.ms/*".to_string(),
                ],
                video_keywords: vec!["videomanifest".to_string()],
                transcript_keywords: vec![
                    "select=media/transcripts".to_string(),
                    "select=media%2Ftranscripts".to_string(),
                ],
                subrequest_params: vec![
                    "subRequest=true".to_string(),
                    "isCustomized=true".to_string(),
                ],
                remove_params: vec!["enableCdn".to_string()],
            },
            capture: CaptureConfig {
                file_extension: ".mp4".to_string(),
                ffmpeg_template: "ffmpeg -i \"{url}\" -codec copy \"{filename}\"".to_string(),
                max_items: 20,
                notify_on_detection: false,
            },
            fetcher: FetcherConfig {
                request_timeout_seconds: 30, // API calls, not media downloads
                user_agent: "sp-video-catcher/0.1".to_string(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(".sp_video_catcher"),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: CatcherConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CatcherConfig::default(),
        }
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.config.rules.domains = domains;
        self
    }

    pub fn with_video_keywords(mut self, keywords: Vec<String>) -> Self {
        self.config.rules.video_keywords = keywords;
        self
    }

    pub fn with_transcript_keywords(mut self, keywords: Vec<String>) -> Self {
        self.config.rules.transcript_keywords = keywords;
        self
    }

    pub fn with_remove_params(mut self, params: Vec<String>) -> Self {
        self.config.rules.remove_params = params;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.config.capture.max_items = max_items;
        self
    }

    pub fn with_file_extension(mut self, extension: String) -> Self {
        self.config.capture.file_extension = extension;
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = dir;
        self
    }

    pub fn notify_on_detection(mut self, enable: bool) -> Self {
        self.config.capture.notify_on_detection = enable;
        self
    }

    pub fn build(self) -> CatcherConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatcherConfig::default();
        assert_eq!(config.capture.max_items, 20);
        assert_eq!(config.capture.file_extension, ".mp4");
        assert!(!config.capture.notify_on_detection);
        assert!(config.rules.domains.contains(&"*://*.sharepoint.com/*".to_string()));
        assert_eq!(config.rules.remove_params, vec!["enableCdn".to_string()]);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_max_items(5)
            .with_file_extension(".webm".to_string())
            .notify_on_detection(true)
            .build();

        assert_eq!(config.capture.max_items, 5);
        assert_eq!(config.capture.file_extension, ".webm");
        assert!(config.capture.notify_on_detection);
    }

    #[test]
    fn test_config_validation() {
        let config = CatcherConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CatcherConfig::default();
        config.capture.max_items = 0;
        assert!(config.validate().is_err());

        let mut config = CatcherConfig::default();
        config.capture.ffmpeg_template = "ffmpeg -i {url}".to_string();
        assert!(config.validate().is_err());

        let mut config = CatcherConfig::default();
        config.rules.domains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = CatcherConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: CatcherConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.capture.max_items, config.capture.max_items);
        assert_eq!(parsed.rules.video_keywords, config.rules.video_keywords);
    }
}
