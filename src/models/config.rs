//! Configuration model loaded from external sources.

use std::path::PathBuf;
use std::time::Duration;

use config::{ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

use crate::crawlers::chrome::ChromeOptions;
use crate::crawlers::{CatalogSection, ScrapeTimeouts};
use crate::processing::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::{DEFAULT_BASE_URL, DEFAULT_TOP_K};

/// Prefix of environment variables overriding the configuration files,
/// e.g. `APP__STORAGE__DATA_DIR`.
const ENV_PREFIX: &str = "APP";

#[derive(Clone, Debug, Deserialize)]
/// Settings of the worker process.
pub struct ServerConfig {
    pub zmq: ZmqConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ZmqConfig {
    /// PULL socket receiving pipeline jobs.
    pub jobs_address: String,
    /// REP socket answering recommendation requests; serving is off when
    /// unset.
    #[serde(default)]
    pub recommend_address: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogConfig {
    /// Origin relative assessment links are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub catalog_url: String,
    /// Scraped and normalized in this order.
    pub sections: Vec<CatalogSection>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_load_secs: u64,
    pub wrapper_secs: u64,
    pub rows_secs: u64,
    pub pagination_secs: u64,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: Option<String>,
    pub navigation_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Where model files are cached; `fastembed` picks its default when
    /// unset.
    pub cache_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub top_k: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let timeouts = ScrapeTimeouts::default();
        Self {
            page_load_secs: timeouts.page_load.as_secs(),
            wrapper_secs: timeouts.wrapper.as_secs(),
            rows_secs: timeouts.rows.as_secs(),
            pagination_secs: timeouts.pagination.as_secs(),
            poll_interval_ms: timeouts.poll_interval.as_millis() as u64,
            settle_ms: timeouts.settle.as_millis() as u64,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            navigation_timeout_secs: 30,
            idle_timeout_secs: 120,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            cache_dir: None,
            batch_size: 32,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl From<&TimeoutConfig> for ScrapeTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            page_load: Duration::from_secs(config.page_load_secs),
            wrapper: Duration::from_secs(config.wrapper_secs),
            rows: Duration::from_secs(config.rows_secs),
            pagination: Duration::from_secs(config.pagination_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle: Duration::from_millis(config.settle_ms),
        }
    }
}

impl From<&BrowserConfig> for ChromeOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            window_size: (config.window_width, config.window_height),
            user_agent: config.user_agent.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }
}

impl CatalogConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Message(format!("catalog.base_url: {e}")))
    }
}

impl ServerConfig {
    /// Loads `config/default.yaml` (if present) overlaid with `APP__`
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Self::from_settings(settings)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.catalog.base_url()?;
        Url::parse(&self.catalog.catalog_url)
            .map_err(|e| ConfigError::Message(format!("catalog.catalog_url: {e}")))?;
        if self.catalog.sections.is_empty() {
            return Err(ConfigError::Message(
                "catalog.sections must name at least one section".into(),
            ));
        }
        for section in &self.catalog.sections {
            if section.max_pages == 0 {
                return Err(ConfigError::Message(format!(
                    "section '{}': max_pages must be greater than 0",
                    section.label
                )));
            }
            if section.slug.is_empty() || section.slug.contains(['/', '\\']) {
                return Err(ConfigError::Message(format!(
                    "section '{}': slug must be a plain file name",
                    section.label
                )));
            }
        }
        if self.embedding.top_k == 0 {
            return Err(ConfigError::Message(
                "embedding.top_k must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
