use crate::config::types::{
    ClassifierConfig, Config, FetchConfig, FetchStrategy, PollConfig, StorageConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_classifier_config(&config.classifier)?;
    validate_storage_config(&config.storage)?;
    validate_poll_config(&config.poll)?;
    Ok(())
}

/// Validates fetch configuration, including strategy credentials
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    validate_http_url("search-url", &config.search_url)?;

    if !(15..=30).contains(&config.timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 15 and 30, got {}",
            config.timeout_secs
        )));
    }

    if config.challenge_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "challenge-markers cannot contain empty entries".to_string(),
        ));
    }

    let strategy = config.strategy.as_str();
    match config.strategy {
        FetchStrategy::Direct => {}
        FetchStrategy::Bypass | FetchStrategy::Render => {
            let endpoint = required(strategy, "endpoint", &config.endpoint)?;
            validate_http_url("endpoint", endpoint)?;
        }
        FetchStrategy::Proxy => {
            let endpoint = required(strategy, "endpoint", &config.endpoint)?;
            validate_http_url("endpoint", endpoint)?;
            required(strategy, "api-key", &config.api_key)?;
        }
    }

    Ok(())
}

/// Returns the value of a credential the strategy cannot work without
fn required<'a>(
    strategy: &'static str,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingCredential { strategy, field }),
    }
}

/// Validates that every classifier pattern compiles
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.keywords.is_empty() {
        return Err(ConfigError::Validation(
            "classifier keywords cannot be empty".to_string(),
        ));
    }

    for pattern in config.keywords.iter().chain(Some(&config.single_issue)) {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates poll run configuration
fn validate_poll_config(config: &PollConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_series < 1 || config.max_concurrent_series > 16 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-series must be between 1 and 16, got {}",
            config.max_concurrent_series
        )));
    }

    if config.run_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run-timeout-secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses HTTP(S)
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
