//! Configuration module for TPB-Poller
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration that fails validation is fatal: no series is polled.
//!
//! # Example
//!
//! ```no_run
//! use tpb_poller::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("poller.toml")).unwrap();
//! println!("Polling with the {} strategy", config.fetch.strategy.as_str());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierConfig, Config, FetchConfig, FetchStrategy, PollConfig, StorageConfig,
};
pub(crate) use types::default_challenge_markers;

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, API_KEY_ENV,
    DATABASE_ENV,
};
