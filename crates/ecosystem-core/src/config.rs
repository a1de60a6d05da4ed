use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{EcosystemError, SecretValue, optional_env};

const DEFAULT_CONFIG_PATH: &str = "ecosystem.toml";
const CONFIG_PATH_ENV: &str = "ECOSYSTEM_CONFIG";

/// Top-level configuration structure. Every section falls back to defaults so
/// an empty file (or no file at all) yields a runnable pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub sources: SourcesConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the language backend credential (from environment only).
    pub fn backend_api_key(&self) -> Option<SecretValue> {
        optional_env(&self.backend.api_key_env)
    }

    /// Resolve the optional repository-search token.
    pub fn github_token(&self) -> Option<SecretValue> {
        self.sources
            .github_token_env
            .as_deref()
            .and_then(optional_env)
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument (must exist).
    /// 2. `ECOSYSTEM_CONFIG` environment variable (must exist).
    /// 3. `ecosystem.toml` in the current working directory, if present.
    /// 4. Built-in defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Config, EcosystemError> {
        let config = match resolve_path(path) {
            Some(candidate) => {
                let raw = fs::read_to_string(&candidate)
                    .map_err(|err| EcosystemError::config_io(candidate.clone(), err))?;
                Self::parse(&raw)?
            }
            None => Config::default(),
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a TOML document without touching the filesystem.
    pub fn parse(raw: &str) -> Result<Config, EcosystemError> {
        toml::from_str(raw).map_err(|err| EcosystemError::InvalidConfiguration(err.to_string()))
    }

    pub fn validate(config: &Config) -> Result<(), EcosystemError> {
        if config.backend.api_key_env.trim().is_empty() {
            return Err(EcosystemError::InvalidConfiguration(
                "backend.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.backend.timeout_ms == 0 || config.sources.timeout_ms == 0 {
            return Err(EcosystemError::InvalidConfiguration(
                "backend.timeout_ms and sources.timeout_ms must be greater than zero".into(),
            ));
        }
        if config.sources.papers_per_term == 0 || config.sources.repo_limit == 0 {
            return Err(EcosystemError::InvalidConfiguration(
                "sources.papers_per_term and sources.repo_limit must be greater than zero".into(),
            ));
        }
        if let Some(feed) = config
            .sources
            .feeds
            .iter()
            .find(|feed| feed.name.trim().is_empty() || feed.url.trim().is_empty())
        {
            return Err(EcosystemError::InvalidConfiguration(format!(
                "feed entries need a name and url (got name={:?}, url={:?})",
                feed.name, feed.url
            )));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some(PathBuf::from(from_env));
        }
    }

    let fallback = Path::new(DEFAULT_CONFIG_PATH);
    fallback.exists().then(|| fallback.to_path_buf())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub arxiv_url: String,
    pub github_url: String,
    pub github_token_env: Option<String>,
    pub papers_per_term: usize,
    pub repo_limit: usize,
    pub timeout_ms: u64,
    pub feeds: Vec<FeedSource>,
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            arxiv_url: "https://export.arxiv.org/api/query".to_string(),
            github_url: "https://api.github.com/search/repositories".to_string(),
            github_token_env: Some("GITHUB_TOKEN".to_string()),
            papers_per_term: 5,
            repo_limit: 8,
            timeout_ms: 10_000,
            feeds: FeedSource::defaults(),
        }
    }
}

/// A named news feed scanned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    fn defaults() -> Vec<Self> {
        vec![
            Self::new("TechCrunch", "https://techcrunch.com/feed/"),
            Self::new(
                "BBC Technology",
                "https://feeds.bbci.co.uk/news/technology/rss.xml",
            ),
            Self::new("Wired", "https://www.wired.com/feed/rss"),
            Self::new("AI News", "https://www.artificialintelligence-news.com/feed/"),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: String,
    /// Drop and recreate the results table when the process starts.
    pub reset_on_start: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ecosystem_data.db?mode=rwc".to_string(),
            reset_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub audit_dir: PathBuf,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            audit_dir: PathBuf::from("data/logs"),
            retention_days: 90,
        }
    }
}
