use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides `fetch.api-key`
pub const API_KEY_ENV: &str = "TPB_POLLER_API_KEY";

/// Environment variable that overrides `storage.database-path`
pub const DATABASE_ENV: &str = "TPB_POLLER_DATABASE";

/// Loads and parses a configuration file from the given path
///
/// Secrets may be kept out of the file: `TPB_POLLER_API_KEY` and
/// `TPB_POLLER_DATABASE` take precedence over the corresponding keys.
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tpb_poller::config::load_config;
///
/// let config = load_config(Path::new("poller.toml")).unwrap();
/// println!("Strategy: {}", config.fetch.strategy.as_str());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parses configuration text, applying overrides from `lookup_env`
pub fn parse_config<F>(content: &str, lookup_env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;

    if let Some(key) = lookup_env(API_KEY_ENV).filter(|v| !v.is_empty()) {
        config.fetch.api_key = Some(key);
    }
    if let Some(path) = lookup_env(DATABASE_ENV).filter(|v| !v.is_empty()) {
        config.storage.database_path = path;
    }

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every poll run so a run can be traced back to its settings.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
