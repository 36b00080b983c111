//! TPB-Poller: watches a comics catalog for new collected editions
//!
//! This crate polls a catalog search page for every tracked series, picks the
//! first listed collected edition (TPB, hardcover, omnibus, ...) and records it
//! when it is genuinely new, clearing any dismissals the user made for that series.

pub mod classifier;
pub mod config;
pub mod fetch;
pub mod poller;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for TPB-Poller operations
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// Any of these aborts a run before a single series is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid classifier pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing credential '{field}' required by the '{strategy}' fetch strategy")]
    MissingCredential {
        strategy: &'static str,
        field: &'static str,
    },
}

/// Failure to retrieve a search page
///
/// These are distinct from "no edition listed": a fetch error means the
/// poller could not determine whether a release exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Blocked by the catalog site: {reason}")]
    Blocked { reason: String },

    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog unavailable: {reason}")]
    Unavailable { reason: String },
}

impl FetchError {
    /// Returns true if the site served a bot challenge or refused the request
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Result type alias for TPB-Poller operations
pub type Result<T> = std::result::Result<T, PollerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use classifier::{CandidateMatch, EditionClassifier};
pub use config::Config;
pub use fetch::{build_fetcher, Markup, PageFetcher};
pub use poller::{lookup_series, reconcile, PollOptions, PollSummary, Poller};
