//! Discovery pipeline
//!
//! - `reconcile`: store a classified match if it is new
//! - `run`: the scheduled sweep over all tracked series
//! - `lookup`: stateless single-series query

mod lookup;
mod reconcile;
mod run;

pub use lookup::{lookup_series, LookupResponse};
pub use reconcile::{reconcile, ReconcileOutcome};
pub use run::{PollOptions, PollSummary, Poller, SeriesError};
