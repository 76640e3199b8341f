//! Configuration loading from TOML files
//!
//! Config file is selected via the `--config <path>` command line argument,
//! default `config/dev.toml`. Every section is optional.

use crate::domain::step::StepSequence;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend proxy base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path prefix of the scheduling endpoints
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay, doubled on every retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8787/api".to_string()
}

fn default_endpoint() -> String {
    "/alteg".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Wizard step names in order
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,
    /// Allow selecting several services in one booking
    #[serde(default)]
    pub multi_service: bool,
    /// SMS reminder lead time in hours (0 = none)
    #[serde(default)]
    pub notify_by_sms_hours: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self { steps: default_steps(), multi_service: false, notify_by_sms_hours: 0 }
    }
}

fn default_steps() -> Vec<String> {
    ["service", "staff", "time", "confirmation"].iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing local persistent storage
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

fn default_storage_path() -> String {
    "data/local_storage.json".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_endpoint: String,
    api_timeout_ms: u64,
    api_max_retries: u32,
    api_retry_delay_ms: u64,
    steps: StepSequence,
    multi_service: bool,
    notify_by_sms_hours: u32,
    storage_path: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            api_endpoint: default_endpoint(),
            api_timeout_ms: default_timeout_ms(),
            api_max_retries: default_max_retries(),
            api_retry_delay_ms: default_retry_delay_ms(),
            steps: StepSequence::standard(),
            multi_service: false,
            notify_by_sms_hours: 0,
            storage_path: default_storage_path(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("Failed to parse config")?;
        Self::from_toml(toml_config)
    }

    fn from_toml(toml_config: TomlConfig) -> anyhow::Result<Self> {
        let steps = StepSequence::from_names(&toml_config.booking.steps)
            .context("Invalid [booking].steps")?;

        Ok(Self {
            api_base_url: toml_config.api.base_url.trim_end_matches('/').to_string(),
            api_endpoint: toml_config.api.endpoint,
            api_timeout_ms: toml_config.api.timeout_ms,
            api_max_retries: toml_config.api.max_retries,
            api_retry_delay_ms: toml_config.api.retry_delay_ms,
            steps,
            multi_service: toml_config.booking.multi_service,
            notify_by_sms_hours: toml_config.booking.notify_by_sms_hours,
            storage_path: toml_config.storage.path,
            config_file: "inline".to_string(),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let mut config = Self::from_toml(toml_config)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.config_file = path.display().to_string();
        Ok(config)
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), path = %path, "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Full URL of a scheduling endpoint path such as `/services`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.api_base_url, self.api_endpoint, path)
    }

    // Getters for all config fields
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn api_timeout_ms(&self) -> u64 {
        self.api_timeout_ms
    }

    pub fn api_max_retries(&self) -> u32 {
        self.api_max_retries
    }

    pub fn api_retry_delay_ms(&self) -> u64 {
        self.api_retry_delay_ms
    }

    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    pub fn multi_service(&self) -> bool {
        self.multi_service
    }

    pub fn notify_by_sms_hours(&self) -> u32 {
        self.notify_by_sms_hours
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point the client at another backend
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Builder method to tune retry behaviour
    pub fn with_retry(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.api_max_retries = max_retries;
        self.api_retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn with_steps(mut self, steps: StepSequence) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_storage_path(mut self, path: &str) -> Self {
        self.storage_path = path.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::BookingStep;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:8787/api");
        assert_eq!(config.api_endpoint(), "/alteg");
        assert_eq!(config.api_max_retries(), 3);
        assert_eq!(config.api_retry_delay_ms(), 1000);
        assert_eq!(config.steps().len(), 4);
        assert!(!config.multi_service());
    }

    #[test]
    fn test_api_url() {
        let config = Config::default().with_api_base_url("http://127.0.0.1:9000/api/");
        assert_eq!(config.api_url("/services"), "http://127.0.0.1:9000/api/alteg/services");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.api_timeout_ms(), 30_000);
        assert_eq!(config.storage_path(), "data/local_storage.json");
        assert_eq!(config.steps().first(), BookingStep::Service);
    }

    #[test]
    fn test_steps_from_toml() {
        let config = Config::from_toml_str(
            r#"
[booking]
steps = ["service", "staff", "date", "time", "confirmation"]
multi_service = true
"#,
        )
        .unwrap();
        assert!(config.steps().contains(BookingStep::Date));
        assert!(config.multi_service());
    }

    #[test]
    fn test_invalid_steps_rejected() {
        let err = Config::from_toml_str(
            r#"
[booking]
steps = ["staff", "confirmation"]
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("first step must be 'service'"));
    }
}
