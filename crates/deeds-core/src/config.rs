//! Configuration management for the deeds scraper.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{parse_iso_date, DateRange, DocTypeCode};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default search page of the Taunton registry of deeds.
pub const DEFAULT_SEARCH_URL: &str = "http://www.tauntondeeds.com/Searches/ImageSearch.aspx";

/// Main application configuration.
///
/// This is loaded from `~/.config/deeds/config.toml` (or platform equivalent)
/// unless an explicit path is given. If the default file doesn't exist,
/// default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search form parameters
    pub search: SearchConfig,
    /// HTTP client behavior
    pub http: HttpConfig,
    /// Whole-run limits
    pub run: RunConfig,
    /// Output destination
    pub output: OutputConfig,
    /// Results grid markup
    pub grid: GridLayout,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `DEEDS_SEARCH_URL`: Override the search page URL
    /// - `DEEDS_START_DATE`: Override the range start (`YYYY-MM-DD`)
    /// - `DEEDS_END_DATE`: Override the range end (`YYYY-MM-DD`)
    /// - `DEEDS_DOC_TYPE`: Override the document type code
    /// - `DEEDS_TIMEOUT_SECS`: Override the per-request timeout
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Malformed dates and document codes are rejected; a malformed timeout is ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DEEDS_SEARCH_URL") {
            tracing::debug!("Override search.url from env: {}", val);
            self.search.url = val;
        }

        if let Some(val) = lookup("DEEDS_START_DATE") {
            self.search.start_date = parse_iso_date(&val)
                .map_err(|e| ConfigError::invalid("DEEDS_START_DATE", e.to_string()))?;
            tracing::debug!("Override search.start_date from env: {}", val);
        }

        if let Some(val) = lookup("DEEDS_END_DATE") {
            self.search.end_date = parse_iso_date(&val)
                .map_err(|e| ConfigError::invalid("DEEDS_END_DATE", e.to_string()))?;
            tracing::debug!("Override search.end_date from env: {}", val);
        }

        if let Some(val) = lookup("DEEDS_DOC_TYPE") {
            self.search.doc_type_code = DocTypeCode::new(val.as_str())
                .map_err(|e| ConfigError::invalid("DEEDS_DOC_TYPE", e.to_string()))?;
            tracing::debug!("Override search.doc_type_code from env: {}", val);
        }

        if let Some(val) = lookup("DEEDS_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.http.timeout_secs = secs;
                tracing::debug!("Override http.timeout_secs from env: {}", secs);
            }
        }

        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        self.search
            .date_range()
            .map_err(|e| ConfigError::invalid("search.end_date", e.to_string()))?;

        let url = url::Url::parse(&self.search.url)
            .map_err(|e| ConfigError::invalid("search.url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "search.url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs", "must be at least 1"));
        }

        if self.http.max_retries > 10 {
            return Err(ConfigError::invalid(
                "http.max_retries",
                format!("must be 0-10, got {}", self.http.max_retries),
            ));
        }

        if self.http.max_concurrent_pages == 0 {
            return Err(ConfigError::invalid(
                "http.max_concurrent_pages",
                "must be at least 1",
            ));
        }

        if self.grid.grid_id.trim().is_empty() {
            return Err(ConfigError::invalid("grid.grid_id", "must not be empty"));
        }

        if self.grid.row_classes.is_empty() {
            return Err(ConfigError::invalid(
                "grid.row_classes",
                "must name at least one row class",
            ));
        }

        if self.run.deadline_secs != 0 && self.run.deadline_secs < self.http.timeout_secs {
            return Err(ConfigError::invalid(
                "run.deadline_secs",
                "must not be shorter than http.timeout_secs",
            ));
        }

        Ok(())
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to the given path.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path
            .parent()
            .ok_or_else(|| ConfigError::invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/deeds/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "bldup", "deeds").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Search form parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// URL of the registry search page
    pub url: String,
    /// First recording date to include
    pub start_date: NaiveDate,
    /// Last recording date to include
    pub end_date: NaiveDate,
    /// Registry document-type dropdown value
    pub doc_type_code: DocTypeCode,
}

impl SearchConfig {
    /// Build the validated date range for this search.
    pub fn date_range(&self) -> crate::Result<DateRange> {
        DateRange::new(self.start_date, self.end_date)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SEARCH_URL.to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2020, 12, 31).expect("valid date"),
            doc_type_code: DocTypeCode::default(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Base delay for retry backoff in milliseconds
    pub retry_delay_ms: u64,
    /// Pause before each request in milliseconds
    pub delay_between_requests_ms: u64,
    /// Result pages fetched at the same time
    pub max_concurrent_pages: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("deeds/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 3,
            retry_delay_ms: 2000,
            delay_between_requests_ms: 0,
            max_concurrent_pages: 1,
        }
    }
}

/// Whole-run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Overall deadline for one scrape in seconds; 0 disables it
    pub deadline_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { deadline_secs: 600 }
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON Lines file to write; stdout when unset
    pub path: Option<PathBuf>,
}

/// Where the results grid lives in the page markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    /// Element id of the results `<table>`
    pub grid_id: String,
    /// Classes of the `<tr>` elements holding records
    pub row_classes: Vec<String>,
    /// Class of the pager `<tr>`
    pub pager_class: String,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            grid_id: "ctl00_cphMainContent_gvSearchResults".to_string(),
            row_classes: vec!["gridRow".to_string(), "gridAltRow".to_string()],
            pager_class: "gridPager".to_string(),
        }
    }
}
