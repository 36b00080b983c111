//! Classification of search results into collected editions
//!
//! This module turns a search page into the qualifying match, if any:
//! - Extracting (title, link) candidates in document order
//! - Qualifying titles with the collected-edition heuristic
//! - Selecting the first qualifying candidate (first match, not best match)

mod parser;
mod policy;

pub use parser::extract_candidates;
pub use policy::EditionPolicy;

use crate::config::ClassifierConfig;
use crate::fetch::Markup;
use crate::ConfigError;
use serde::Serialize;

/// A listed edition that may become a stored edition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateMatch {
    pub title: String,
    pub link: String,
}

/// Picks the first collected edition listed on a search page
#[derive(Debug, Clone)]
pub struct EditionClassifier {
    policy: EditionPolicy,
}

impl EditionClassifier {
    pub fn new(policy: EditionPolicy) -> Self {
        Self { policy }
    }

    /// Compiles the configured keyword and single-issue patterns
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let policy = EditionPolicy::new(&config.keywords, &config.single_issue)
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self::new(policy))
    }

    pub fn policy(&self) -> &EditionPolicy {
        &self.policy
    }

    /// All candidates on the page, in document order
    pub fn candidates(&self, markup: &Markup) -> Vec<CandidateMatch> {
        extract_candidates(markup.as_str())
    }

    /// Returns the first candidate whose title qualifies
    ///
    /// Identical markup always yields the same answer.
    pub fn classify(&self, markup: &Markup) -> Option<CandidateMatch> {
        if markup.is_empty() {
            tracing::debug!("Empty page, nothing to classify");
            return None;
        }

        let candidates = self.candidates(markup);
        let total = candidates.len();

        for (checked, candidate) in candidates.into_iter().enumerate() {
            if self.policy.qualifies(&candidate.title) {
                tracing::debug!("[{}] {} qualifies", checked + 1, candidate.title);
                return Some(candidate);
            }
            tracing::debug!("[{}] {} skipped", checked + 1, candidate.title);
        }

        tracing::debug!("Checked {} results, no collected edition matched", total);
        None
    }
}
