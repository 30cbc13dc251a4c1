//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_SEARCH_INDEX: &str = "azureblob-index";
pub const DEFAULT_SEARCH_API_VERSION: &str = "2023-07-01-Preview";
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Paths to the ForecastIQ data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the root if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            llm_config_file: root.join("llm-config.json"),
            root,
        })
    }
}

/// Connection settings for the document search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Service root, e.g. `https://my-search.search.windows.net`.
    pub endpoint: String,
    pub index: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Read search settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read search settings through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("FORECASTIQ_SEARCH_ENDPOINT")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_default();
        let index = lookup("FORECASTIQ_SEARCH_INDEX")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SEARCH_INDEX.into());
        let api_version = lookup("FORECASTIQ_SEARCH_API_VERSION")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.into());
        let timeout_secs = parse_secs(
            lookup("FORECASTIQ_SEARCH_TIMEOUT_SECS"),
            DEFAULT_SEARCH_TIMEOUT_SECS,
            "FORECASTIQ_SEARCH_TIMEOUT_SECS",
        )?;

        Ok(Self {
            endpoint,
            index,
            api_key: lookup("FORECASTIQ_SEARCH_API_KEY").filter(|s| !s.is_empty()),
            api_version,
            timeout_secs,
        })
    }

    /// Whether an endpoint has been configured at all.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty()
    }

    /// Full URL of the index search endpoint.
    pub fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index, self.api_version
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level ForecastIQ configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastIqConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Search index settings.
    pub search: SearchConfig,
    /// Upper bound on a single LLM call.
    pub llm_timeout_secs: u64,
}

impl ForecastIqConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let data_paths = DataPaths::new(data_dir)?;
        let search = SearchConfig::from_env()?;
        let llm_timeout_secs = parse_secs(
            std::env::var("FORECASTIQ_LLM_TIMEOUT_SECS").ok(),
            DEFAULT_LLM_TIMEOUT_SECS,
            "FORECASTIQ_LLM_TIMEOUT_SECS",
        )?;

        Ok(Self {
            port,
            data_paths,
            search,
            llm_timeout_secs,
        })
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

/// Timeouts must be positive; an unbounded outbound call is not allowed.
fn parse_secs(raw: Option<String>, default: u64, name: &str) -> Result<u64> {
    match raw {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Ok(default),
        Some(s) => match s.trim().parse::<u64>() {
            Ok(0) => Err(Error::Config(format!("{} must be greater than zero", name))),
            Ok(v) => Ok(v),
            Err(_) => Err(Error::Config(format!("{} is not a number: {}", name, s))),
        },
    }
}
