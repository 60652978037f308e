//! Configuration and settings management
//!
//! Loads pipeline settings from config files and environment variables and
//! defines the datastore constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// data.gov.il CKAN `datastore_search` endpoint
pub const DATASTORE_SEARCH_URL: &str = "https://data.gov.il/api/3/action/datastore_search";
/// Resource holding the private and commercial vehicle registry
pub const VEHICLE_RESOURCE_ID: &str = "053cea08-09bc-40ec-8f7a-156f0677aff3";
/// Resource holding disability parking permits
pub const DISABILITY_RESOURCE_ID: &str = "c8b9f9c8-4612-4068-934f-d4acd2e3c06e";
/// User agent sent with every datastore request
pub const USER_AGENT: &str = concat!("PlateBot/", env!("CARGO_PKG_VERSION"));

/// Cache namespace for vehicle registry lookups
pub const VEHICLE_CACHE_NAMESPACE: &str = "vehicle";
/// Cache namespace for disability permit lookups
pub const DISABILITY_CACHE_NAMESPACE: &str = "disability";

/// Initial backoff for retried messaging-platform calls
pub const TRANSPORT_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for retried messaging-platform calls
pub const TRANSPORT_MAX_BACKOFF_MS: u64 = 4_000;
/// Attempts for retried messaging-platform calls
pub const TRANSPORT_MAX_RETRIES: usize = 3;

/// Build the layered configuration source shared by all settings structs.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed environment, plain environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Settings for the request processing pipeline
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineSettings {
    /// Trailing rate-limit window in milliseconds
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    /// Maximum requests per identity inside the window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: usize,

    /// Datastore request timeout in milliseconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,
    /// Total attempts made for one datastore request
    #[serde(default = "default_api_retry_attempts")]
    pub api_retry_attempts: u32,
    /// Base delay of the linear retry backoff in milliseconds
    #[serde(default = "default_api_retry_base_delay_ms")]
    pub api_retry_base_delay_ms: u64,
    /// Maximum number of records requested per query
    #[serde(default = "default_api_result_limit")]
    pub api_result_limit: u32,
    /// Datastore endpoint
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Vehicle registry resource identifier
    #[serde(default = "default_vehicle_resource_id")]
    pub vehicle_resource_id: String,
    /// Disability permit resource identifier
    #[serde(default = "default_disability_resource_id")]
    pub disability_resource_id: String,

    /// Result cache time-to-live in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Maximum number of cached results
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
    /// Interval of the expired-entry sweep in milliseconds
    #[serde(default = "default_cache_cleanup_interval_ms")]
    pub cache_cleanup_interval_ms: u64,
}

const fn default_rate_limit_window_ms() -> u64 {
    60_000
}

const fn default_rate_limit_max_requests() -> usize {
    10
}

const fn default_api_timeout() -> u64 {
    5_000
}

const fn default_api_retry_attempts() -> u32 {
    3
}

const fn default_api_retry_base_delay_ms() -> u64 {
    1_000
}

const fn default_api_result_limit() -> u32 {
    10
}

fn default_api_base_url() -> String {
    DATASTORE_SEARCH_URL.to_string()
}

fn default_vehicle_resource_id() -> String {
    VEHICLE_RESOURCE_ID.to_string()
}

fn default_disability_resource_id() -> String {
    DISABILITY_RESOURCE_ID.to_string()
}

const fn default_cache_ttl_ms() -> u64 {
    300_000
}

const fn default_cache_max_size() -> usize {
    500
}

const fn default_cache_cleanup_interval_ms() -> u64 {
    60_000
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            api_timeout: default_api_timeout(),
            api_retry_attempts: default_api_retry_attempts(),
            api_retry_base_delay_ms: default_api_retry_base_delay_ms(),
            api_result_limit: default_api_result_limit(),
            api_base_url: default_api_base_url(),
            vehicle_resource_id: default_vehicle_resource_id(),
            disability_resource_id: default_disability_resource_id(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_size: default_cache_max_size(),
            cache_cleanup_interval_ms: default_cache_cleanup_interval_ms(),
        }
    }
}

impl PipelineSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use platebot_core::config::PipelineSettings;
    ///
    /// let settings = PipelineSettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Rate-limit window as a `Duration`
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Datastore request timeout as a `Duration`
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout)
    }

    /// Retry backoff base delay as a `Duration`
    #[must_use]
    pub const fn api_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.api_retry_base_delay_ms)
    }

    /// Cache time-to-live as a `Duration`
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Cache sweep interval as a `Duration`
    #[must_use]
    pub const fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cache_cleanup_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Single test so environment mutations cannot race each other
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::remove_var("RATE_LIMIT_MAX_REQUESTS");
        env::remove_var("API_TIMEOUT");

        let settings = PipelineSettings::new()?;
        assert_eq!(settings.rate_limit_max_requests, 10);
        assert_eq!(settings.api_timeout, 5_000);
        assert_eq!(settings.vehicle_resource_id, VEHICLE_RESOURCE_ID);

        env::set_var("RATE_LIMIT_MAX_REQUESTS", "25");
        env::set_var("API_TIMEOUT", "1500");

        let settings = PipelineSettings::new()?;
        assert_eq!(settings.rate_limit_max_requests, 25);
        assert_eq!(settings.api_timeout(), Duration::from_millis(1500));

        env::remove_var("RATE_LIMIT_MAX_REQUESTS");
        env::remove_var("API_TIMEOUT");

        // Empty values are treated as unset
        env::set_var("API_TIMEOUT", "");
        let settings = PipelineSettings::new()?;
        assert_eq!(settings.api_timeout, 5_000);
        env::remove_var("API_TIMEOUT");
        Ok(())
    }

    #[test]
    fn test_defaults_match_serde_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(300));
        assert_eq!(settings.cache_max_size, 500);
        assert_eq!(settings.api_retry_attempts, 3);
        assert_eq!(settings.api_base_url, DATASTORE_SEARCH_URL);
    }
}
