//! Reconciliation of a classified match against stored editions
//!
//! The order of store operations is fixed:
//! 1. look up editions with the same (series, title)
//! 2. insert the edition if none exists
//! 3. clear the series' dismissals
//!
//! A failure in step 3 is logged and swallowed; the edition stays inserted
//! and the stale dismissals survive until the next new edition.

use crate::classifier::CandidateMatch;
use crate::storage::{NewEdition, Storage, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What reconciliation did for one series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// A new edition was stored
    pub inserted: bool,
    pub edition_id: Option<i64>,
    pub dismissals_cleared: usize,
}

/// Records `candidate` for the series unless an edition with its title exists
///
/// Performs no network I/O. Running it twice with the same candidate inserts
/// at most one edition, and a duplicate leaves dismissals untouched.
///
/// # Returns
///
/// * `Ok(ReconcileOutcome)` - What was changed (nothing for `None` or a known title)
/// * `Err(StorageError)` - The lookup or the insert failed
pub fn reconcile<S: Storage + ?Sized>(
    storage: &mut S,
    series_id: i64,
    candidate: Option<&CandidateMatch>,
    now: DateTime<Utc>,
) -> StorageResult<ReconcileOutcome> {
    let candidate = match candidate {
        Some(candidate) => candidate,
        None => return Ok(ReconcileOutcome::default()),
    };

    let existing = storage.find_editions(series_id, &candidate.title)?;
    if !existing.is_empty() {
        tracing::info!("Already known: {}", candidate.title);
        return Ok(ReconcileOutcome::default());
    }

    let edition_id = storage.insert_edition(&NewEdition {
        series_id,
        title: &candidate.title,
        link: &candidate.link,
        discovered_at: now,
    })?;
    tracing::info!("Inserted new edition: {}", candidate.title);

    let dismissals_cleared = match storage.clear_dismissals(series_id) {
        Ok(cleared) => {
            if cleared > 0 {
                tracing::info!("Cleared {} dismissals", cleared);
            }
            cleared
        }
        Err(e) => {
            tracing::warn!("Failed to clear dismissals for series {}: {}", series_id, e);
            0
        }
    };

    Ok(ReconcileOutcome {
        inserted: true,
        edition_id: Some(edition_id),
        dismissals_cleared,
    })
}
