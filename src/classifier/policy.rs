//! Collected-edition heuristic
//!
//! A title qualifies when it matches any keyword pattern and does not carry
//! a single-issue marker. The marker wins over keywords, so
//! `"Batman: Vol. 3 TPB #1 (2023)"` does not qualify.

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

/// Compiled keyword and single-issue patterns, all case-insensitive
#[derive(Debug, Clone)]
pub struct EditionPolicy {
    keywords: RegexSet,
    single_issue: Regex,
}

impl EditionPolicy {
    pub fn new<I, S>(keywords: I, single_issue: &str) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = RegexSetBuilder::new(keywords)
            .case_insensitive(true)
            .build()?;
        let single_issue = RegexBuilder::new(single_issue)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            keywords,
            single_issue,
        })
    }

    /// True if the title names a collected format
    pub fn is_collected_edition(&self, title: &str) -> bool {
        self.keywords.is_match(title)
    }

    /// True if the title looks like "Series #12 (cover variant)"
    pub fn is_single_issue(&self, title: &str) -> bool {
        self.single_issue.is_match(title)
    }

    pub fn qualifies(&self, title: &str) -> bool {
        !self.is_single_issue(title) && self.is_collected_edition(title)
    }
}
