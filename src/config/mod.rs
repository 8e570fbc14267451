use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::PipelineError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone used to compute the target window
    pub schedule: ScheduleConfig,

    /// Source page and acquisition settings
    pub crawl: CrawlConfig,

    /// Headless browser settings for the driven session tier
    pub browser: BrowserConfig,

    /// Vocabulary analysis settings
    pub vocabulary: VocabularyConfig,

    /// Output directories
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily run time (informational, scheduling is external)
    pub time: String,

    /// Fixed offset of the source timezone from UTC, in hours
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Podcast page holding the episode list
    pub target_url: String,

    /// Static media page used when browser automation is unavailable
    pub fallback_url: String,

    /// Directory for transcript, audio and metadata artifacts
    pub download_path: PathBuf,

    /// Attempts per outbound request
    pub retry_count: u32,

    /// Delay between attempts in seconds
    pub retry_delay_secs: f64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Target broadcast time (HH:MM)
    pub slot: String,

    /// Program name as printed in episode markers
    pub program_name: String,

    /// Tag used in artifact file names
    pub source_tag: String,

    /// Source identifier of the podcast
    pub source_id: String,

    /// Same-origin JSON endpoints used from inside the browser session
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Metadata endpoint; `{source_id}` is substituted
    pub metadata_path: String,

    /// List endpoint; `{program_id}` and `{date}` are substituted
    pub list_path: String,

    /// Detail endpoint; `{item_id}` is substituted
    pub detail_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Disable for Docker/CI environments
    pub sandbox: bool,

    /// Wait after selecting a row, in milliseconds
    pub settle_ms: u64,

    /// Wait after triggering playback, in milliseconds
    pub playback_wait_ms: u64,

    pub page_load_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Minimum lemma length kept as a candidate
    pub min_word_length: usize,

    /// Maximum number of items in the dataset
    pub top_n_words: usize,

    /// Language code used for offline translations
    pub translation_language: String,

    /// CSV file with `word,frequency` rows
    pub frequency_path: Option<PathBuf>,

    /// JSON offline lexical database
    pub lexicon_path: Option<PathBuf>,

    /// Tab-separated secondary dictionary
    pub glossary_path: Option<PathBuf>,

    /// Base URL of the networked dictionary; the word is appended
    pub remote_dictionary_url: String,

    pub remote_enabled: bool,

    /// Fixed delay after each networked lookup, in milliseconds
    pub remote_delay_ms: u64,

    pub remote_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub logs_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: "07:30".to_string(),
            utc_offset_hours: 9,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            target_url: "https://www.arirang.com/radio/132/podcast/668?lang=en".to_string(),
            fallback_url: "https://v.kr.kollus.com/lstBUSaP?cdn=arirang-dd".to_string(),
            download_path: PathBuf::from("./downloads"),
            retry_count: 3,
            retry_delay_secs: 1.5,
            timeout_secs: 20,
            slot: "21:55".to_string(),
            program_name: "Arirang News".to_string(),
            source_tag: "arirang".to_string(),
            source_id: "668".to_string(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            metadata_path: "/api/v1/radio/podcast/{source_id}".to_string(),
            list_path: "/api/v1/radio/podcast/{program_id}/list?date={date}".to_string(),
            detail_path: "/api/v1/radio/podcast/detail/{item_id}".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            settle_ms: 1200,
            playback_wait_ms: 3000,
            page_load_timeout_secs: 30,
        }
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            min_word_length: 4,
            top_n_words: 30,
            translation_language: "ko".to_string(),
            frequency_path: None,
            lexicon_path: None,
            glossary_path: None,
            remote_dictionary_url: "https://api.dictionaryapi.dev/api/v2/entries/en/".to_string(),
            remote_enabled: true,
            remote_delay_ms: 200,
            remote_timeout_secs: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the local directory, or the user config dir.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            tracing::warn!("Config not found: {}. Using defaults.", config_path.display());
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("daily-lexicon").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(-12..=14).contains(&self.schedule.utc_offset_hours) {
            return Err(PipelineError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.schedule.utc_offset_hours
            ))
            .into());
        }

        if crate::window::slot_hhmm(&self.crawl.slot).is_none() {
            return Err(PipelineError::Config(format!(
                "crawl.slot must be HH:MM, got {:?}",
                self.crawl.slot
            ))
            .into());
        }

        if !crate::episodes::is_valid_source_tag(&self.crawl.source_tag) {
            return Err(PipelineError::Config(format!(
                "crawl.source_tag must be lowercase [a-z0-9_-], got {:?}",
                self.crawl.source_tag
            ))
            .into());
        }

        if self.crawl.retry_count == 0 {
            return Err(PipelineError::Config("crawl.retry_count must be at least 1".to_string()).into());
        }

        if self.vocabulary.min_word_length == 0 {
            return Err(PipelineError::Config("vocabulary.min_word_length must be positive".to_string()).into());
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Target URL: {}", self.crawl.target_url);
        println!("  Fallback URL: {}", self.crawl.fallback_url);
        println!("  Slot: {} ({})", self.crawl.slot, self.crawl.program_name);
        println!("  UTC offset: {:+}h", self.schedule.utc_offset_hours);
        println!("  Downloads: {}", self.crawl.download_path.display());
        println!("  Logs: {}", self.paths.logs_dir.display());
        println!("  Reports: {}", self.paths.reports_dir.display());
        println!("  Min word length: {}", self.vocabulary.min_word_length);
        println!("  Top N words: {}", self.vocabulary.top_n_words);
        println!(
            "  Remote dictionary: {}",
            if self.vocabulary.remote_enabled { self.vocabulary.remote_dictionary_url.as_str() } else { "disabled" }
        );
    }

    /// Delay between retry attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.crawl.retry_delay_secs.max(0.0))
    }

    /// Ledger document location
    pub fn ledger_path(&self) -> PathBuf {
        self.paths.logs_dir.join("download_log.json")
    }
}
