//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges. Every error is collected
//! rather than stopping at the first.

use std::net::SocketAddr;

use crate::config::schema::{FilterConfig, GuardConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("sqlKeywords[{0}] is empty")]
    EmptyKeyword(usize),
    #[error("rateLimitInterval must be greater than zero")]
    ZeroInterval,
    #[error("store.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("store.base_delay_us ({base}) exceeds store.max_delay_us ({max})")]
    DelayRange { base: u64, max: u64 },
    #[error("{field} is not a socket address: {value}")]
    BadAddress { field: &'static str, value: String },
    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate the filter policy on its own.
pub fn validate_filters(filters: &FilterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_filters(filters, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the full host configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_filters(&config.filters, &mut errors);

    if config.store.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.store.base_delay_us > config.store.max_delay_us {
        errors.push(ValidationError::DelayRange {
            base: config.store.base_delay_us,
            max: config.store.max_delay_us,
        });
    }
    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    check_address("upstream.address", &config.upstream.address, &mut errors);
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_filters(filters: &FilterConfig, errors: &mut Vec<ValidationError>) {
    // An empty keyword would match every request.
    for (i, keyword) in filters.sql_keywords.iter().enumerate() {
        if keyword.trim().is_empty() {
            errors.push(ValidationError::EmptyKeyword(i));
        }
    }
    if filters.rate_limit_interval.is_zero() {
        errors.push(ValidationError::ZeroInterval);
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn filters() -> FilterConfig {
        FilterConfig {
            sql_keywords: vec!["union select".into()],
            rate_limit_requests: 3,
            rate_limit_interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn default_host_sections_are_valid() {
        assert!(validate_config(&GuardConfig::with_filters(filters())).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GuardConfig::with_filters(FilterConfig {
            sql_keywords: vec!["ok".into(), " ".into()],
            rate_limit_requests: 3,
            rate_limit_interval: Duration::ZERO,
        });
        config.store.max_attempts = 0;
        config.upstream.address = "not an address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::EmptyKeyword(1)));
        assert!(errors.contains(&ValidationError::ZeroInterval));
        assert!(errors.contains(&ValidationError::ZeroAttempts));
    }
}
