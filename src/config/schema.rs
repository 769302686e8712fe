//! Configuration schema definitions.
//!
//! `GuardConfig` is the root of the host configuration file. `FilterConfig` is the part
//! the inspection pipeline consumes; it is also accepted on its own as a JSON plugin
//! configuration, which is why its keys are camelCase.

use std::time::Duration;

use serde::Deserialize;

use crate::config::duration;
use crate::config::loader::ConfigError;

/// Root configuration for the guard proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Where allowed requests are forwarded.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Inspection policy. Mandatory.
    pub filters: FilterConfig,

    /// Shared counter store access policy.
    #[serde(default)]
    pub store: StoreConfig,

    /// Request size limits enforced by the host.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GuardConfig {
    /// Build a config with default host sections around the given filter policy.
    pub fn with_filters(filters: FilterConfig) -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            filters,
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream the proxy forwards allowed requests to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Inspection policy shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Keywords that mark a request as a likely SQL injection.
    pub sql_keywords: Vec<String>,

    /// Requests allowed per client address within one window.
    pub rate_limit_requests: u64,

    /// Length of the rate limit window.
    #[serde(deserialize_with = "duration::deserialize")]
    pub rate_limit_interval: Duration,
}

impl FilterConfig {
    /// Parse a filter-only JSON plugin configuration.
    ///
    /// Keywords are lower-cased and the result is validated.
    pub fn from_json(data: &[u8]) -> Result<Self, ConfigError> {
        if data.is_empty() {
            return Err(ConfigError::Empty);
        }
        let config: FilterConfig = serde_json::from_slice(data).map_err(ConfigError::Json)?;
        let config = config.normalized();
        crate::config::validation::validate_filters(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Lower-case every keyword so matching only has to lower-case the haystack.
    pub fn normalized(mut self) -> Self {
        for keyword in &mut self.sql_keywords {
            *keyword = keyword.to_lowercase();
        }
        self
    }
}

/// What the rate limiter does once every compare-and-set attempt lost a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Let the request through uncounted.
    #[default]
    Allow,
    /// Reject the request with 429.
    Deny,
}

/// Shared counter store access policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Attempts of the read-decide-write cycle before giving up.
    pub max_attempts: u32,

    /// Base delay between attempts, in microseconds.
    pub base_delay_us: u64,

    /// Maximum delay between attempts, in microseconds.
    pub max_delay_us: u64,

    /// Outcome once all attempts are exhausted.
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_us: 50,
            max_delay_us: 500,
            on_exhausted: ExhaustionPolicy::Allow,
        }
    }
}

/// Request limits enforced by the host before inspection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
