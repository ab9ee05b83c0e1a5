//! Application configuration for reviewtopics.
//!
//! User config lives at `~/.reviewtopics/reviewtopics.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ReviewTopicsError};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reviewtopics.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reviewtopics";

// ---------------------------------------------------------------------------
// Config structs (matching reviewtopics.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store API endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Game discovery.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Review fetching.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Topic-model bridge.
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Output file locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Ordered `run` retry settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Store base URL; every endpoint path is joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Region code for search (`cc`).
    #[serde(default = "default_country")]
    pub country: String,

    /// Language for search, details, and review filtering.
    #[serde(default = "default_language")]
    pub language: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            country: default_country(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Parse `base_url`, normalized to end with `/` so relative joins keep any path prefix.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| {
            ReviewTopicsError::config(format!("invalid api.base_url '{}': {e}", self.base_url))
        })
    }
}

fn default_base_url() -> String {
    "https://store.steampowered.com".into()
}
fn default_country() -> String {
    "US".into()
}
fn default_language() -> String {
    "english".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Free-text search query.
    #[serde(default = "default_query")]
    pub query: String,

    /// Phrase a result name must contain. Falls back to `query` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,

    /// Substrings marking non-primary products (DLC, packs, ...).
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            keyword: None,
            exclusions: default_exclusions(),
        }
    }
}

impl DiscoveryConfig {
    /// The keyword phrase names are matched against.
    pub fn effective_keyword(&self) -> &str {
        self.keyword.as_deref().unwrap_or(&self.query)
    }
}

fn default_query() -> String {
    "helldivers 2".into()
}
fn default_exclusions() -> Vec<String> {
    vec!["dlc".into(), "pack".into(), "expansion".into()]
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on reviews collected per game.
    #[serde(default = "default_max_reviews")]
    pub max_reviews: usize,

    /// Failed requests tolerated per game before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between successful pages.
    #[serde(default = "default_polite_delay")]
    pub polite_delay_secs: u64,

    /// Pause after a failed request.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Review ordering filter sent to the API.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_reviews: default_max_reviews(),
            max_retries: default_max_retries(),
            polite_delay_secs: default_polite_delay(),
            retry_backoff_secs: default_retry_backoff(),
            filter: default_filter(),
        }
    }
}

impl FetchConfig {
    pub fn polite_delay(&self) -> Duration {
        Duration::from_secs(self.polite_delay_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.retry_backoff_secs),
        )
    }
}

fn default_max_reviews() -> usize {
    100_000
}
fn default_max_retries() -> u32 {
    5
}
fn default_polite_delay() -> u64 {
    5
}
fn default_retry_backoff() -> u64 {
    10
}
fn default_filter() -> String {
    "recent".into()
}

/// `[topics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Interpreter or executable that runs the bridge.
    #[serde(default = "default_bridge_cmd")]
    pub bridge_cmd: String,

    /// Bridge script passed as the first argument.
    #[serde(default = "default_bridge_script")]
    pub bridge_script: String,

    /// Sentence-embedding model name.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// HDBSCAN `min_samples`.
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,

    /// HDBSCAN `min_cluster_size`.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: u32,

    #[serde(default = "default_true")]
    pub calculate_probabilities: bool,

    /// Serialization format for the saved model.
    #[serde(default = "default_serialization")]
    pub serialization: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            bridge_cmd: default_bridge_cmd(),
            bridge_script: default_bridge_script(),
            embedding_model: default_embedding_model(),
            min_samples: default_min_samples(),
            min_cluster_size: default_min_cluster_size(),
            calculate_probabilities: true,
            serialization: default_serialization(),
        }
    }
}

fn default_bridge_cmd() -> String {
    "python3".into()
}
fn default_bridge_script() -> String {
    "packages/py/topic-bridge/bridge.py".into()
}
fn default_embedding_model() -> String {
    "all-mpnet-base-v2".into()
}
fn default_min_samples() -> u32 {
    15
}
fn default_min_cluster_size() -> u32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_serialization() -> String {
    "pickle".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Intermediate file written by `extract`.
    #[serde(default = "default_reviews_csv")]
    pub reviews_csv: PathBuf,

    /// Enriched file written by `model`.
    #[serde(default = "default_topics_csv")]
    pub topics_csv: PathBuf,

    /// Where the bridge saves the fitted model.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            reviews_csv: default_reviews_csv(),
            topics_csv: default_topics_csv(),
            model_path: default_model_path(),
        }
    }
}

fn default_reviews_csv() -> PathBuf {
    PathBuf::from("var/reviews.csv")
}
fn default_topics_csv() -> PathBuf {
    PathBuf::from("var/review_topics.csv")
}
fn default_model_path() -> PathBuf {
    PathBuf::from("var/topic_model")
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Attempts per stage in `run`, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Pause between attempts of a failed stage.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl ScheduleConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

fn default_attempts() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reviewtopics/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReviewTopicsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reviewtopics/reviewtopics.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReviewTopicsError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ReviewTopicsError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReviewTopicsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReviewTopicsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReviewTopicsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("all-mpnet-base-v2"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.max_retries, 5);
        assert_eq!(parsed.fetch.polite_delay_secs, 5);
        assert_eq!(parsed.fetch.retry_backoff_secs, 10);
        assert_eq!(parsed.discovery.exclusions, vec!["dlc", "pack", "expansion"]);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[api]
base_url = "http://127.0.0.1:9000"

[discovery]
query = "deep rock galactic"
keyword = "deep rock"

[fetch]
max_reviews = 250
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.api.language, "english");
        assert_eq!(config.discovery.effective_keyword(), "deep rock");
        assert_eq!(config.fetch.max_reviews, 250);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.schedule.attempts, 2);
    }

    #[test]
    fn keyword_falls_back_to_query() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.effective_keyword(), "helldivers 2");
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let api = ApiConfig {
            base_url: "http://localhost:8080/steam".into(),
            ..ApiConfig::default()
        };
        let url = api.base_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/steam/");
        assert_eq!(
            url.join("appreviews/10").unwrap().as_str(),
            "http://localhost:8080/steam/appreviews/10"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let api = ApiConfig {
            base_url: "not a url".into(),
            ..ApiConfig::default()
        };
        assert!(matches!(api.base_url(), Err(ReviewTopicsError::Config { .. })));
    }

    #[test]
    fn retry_policies_from_config() {
        let config = AppConfig::default();
        let fetch = config.fetch.retry_policy();
        assert_eq!(fetch.max_attempts, 5);
        assert_eq!(fetch.delay, Duration::from_secs(10));

        let schedule = config.schedule.retry_policy();
        assert_eq!(schedule.max_attempts, 2);
        assert_eq!(schedule.delay, Duration::from_secs(300));
    }
}
