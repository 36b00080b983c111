//! Bot-challenge detection
//!
//! Some strategies get an interstitial "checking your browser" page with a
//! 200 status instead of search results. Treating that page as an empty
//! result would look like "no release exists", so it is surfaced as
//! `FetchError::Blocked` instead.

use crate::fetch::Markup;
use crate::{FetchError, FetchResult};

/// Recognizes challenge pages by marker substrings
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    markers: Vec<String>,
}

impl ChallengeDetector {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    /// Returns the first marker present in `body`, if any
    pub fn find_marker(&self, body: &str) -> Option<&str> {
        self.markers
            .iter()
            .map(String::as_str)
            .find(|marker| body.contains(marker))
    }

    /// Turns a response body into markup unless it is a challenge page
    pub fn accept(&self, body: String) -> FetchResult<Markup> {
        match self.find_marker(&body) {
            Some(marker) => Err(FetchError::Blocked {
                reason: format!("challenge page detected (marker '{}')", marker),
            }),
            None => Ok(Markup::new(body)),
        }
    }
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self::new(crate::config::default_challenge_markers())
    }
}
