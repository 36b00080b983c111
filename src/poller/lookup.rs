//! Ad-hoc lookup of a single series
//!
//! Runs fetch and classification only. Nothing is read from or written to
//! the store.

use crate::classifier::{CandidateMatch, EditionClassifier};
use crate::fetch::{search_query, PageFetcher};
use serde::Serialize;

/// Answer to a lookup, serialized as `{found, tpb?, error?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpb: Option<CandidateMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResponse {
    fn found(candidate: CandidateMatch) -> Self {
        Self {
            found: true,
            tpb: Some(candidate),
            error: None,
        }
    }

    fn not_found() -> Self {
        Self {
            found: false,
            tpb: None,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            found: false,
            tpb: None,
            error: Some(error.into()),
        }
    }
}

/// Looks up the current collected edition for `name`
///
/// Fetch failures are reported in `error` rather than as "not found".
pub async fn lookup_series(
    fetcher: &dyn PageFetcher,
    classifier: &EditionClassifier,
    qualifier: &str,
    name: &str,
) -> LookupResponse {
    let name = name.trim();
    if name.is_empty() {
        return LookupResponse::failed("Series name is required");
    }

    let query = search_query(name, qualifier);
    tracing::info!("Looking up \"{}\" via {} fetch", query, fetcher.strategy().as_str());

    match fetcher.fetch(&query).await {
        Ok(markup) => match classifier.classify(&markup) {
            Some(candidate) => LookupResponse::found(candidate),
            None => LookupResponse::not_found(),
        },
        Err(e) => {
            tracing::warn!("Lookup fetch failed: {}", e);
            LookupResponse::failed(e.to_string())
        }
    }
}
