//! Poll run orchestration
//!
//! One run loads every tracked series and, for each, fetches the search page,
//! classifies it and reconciles the match. A failure at any stage is logged
//! and recorded against that series only; the series' last poll time is
//! updated whatever happened.

use crate::classifier::EditionClassifier;
use crate::config::Config;
use crate::fetch::{build_fetcher, search_query, PageFetcher};
use crate::poller::reconcile::reconcile;
use crate::storage::{RunTotals, SeriesRecord, Storage};
use crate::PollerError;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

/// Knobs for a poll run
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Term appended to each series name in the search query
    pub qualifier: String,
    /// Series processed at the same time
    pub max_concurrent_series: usize,
    /// Pause before a series takes over a slot another series just freed
    pub request_delay: Duration,
    /// Series not reached before this elapses keep their previous poll time
    pub run_timeout: Option<Duration>,
    /// Recorded with the run history
    pub config_hash: String,
}

impl PollOptions {
    pub fn from_config(config: &Config, config_hash: impl Into<String>) -> Self {
        Self {
            qualifier: config.fetch.qualifier.clone(),
            max_concurrent_series: config.poll.max_concurrent_series,
            request_delay: Duration::from_millis(config.poll.request_delay_ms),
            run_timeout: config.poll.run_timeout_secs.map(Duration::from_secs),
            config_hash: config_hash.into(),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            qualifier: "tpb".to_string(),
            max_concurrent_series: 1,
            request_delay: Duration::ZERO,
            run_timeout: None,
            config_hash: String::new(),
        }
    }
}

/// A series that could not be checked cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesError {
    pub series_id: i64,
    pub series: String,
    pub error: String,
}

/// Result of one poll run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    pub run_id: Option<i64>,
    /// Series processed, successfully or not
    pub checked: usize,
    /// New editions stored
    pub inserted: usize,
    /// Series left untouched because the run timed out
    pub skipped: usize,
    pub timed_out: bool,
    pub errors: Vec<SeriesError>,
}

impl PollSummary {
    fn record(&mut self, outcome: SeriesOutcome) {
        self.checked += 1;
        if outcome.inserted {
            self.inserted += 1;
        }
        if let Some(error) = outcome.error {
            self.errors.push(SeriesError {
                series_id: outcome.series_id,
                series: outcome.series,
                error,
            });
        }
    }

    fn totals(&self) -> RunTotals {
        RunTotals {
            checked: self.checked as u32,
            inserted: self.inserted as u32,
            errors: self.errors.len() as u32,
        }
    }
}

struct SeriesOutcome {
    series_id: i64,
    series: String,
    inserted: bool,
    error: Option<String>,
}

/// Runs the discovery pipeline over every tracked series
pub struct Poller<S: Storage> {
    storage: Arc<Mutex<S>>,
    fetcher: Arc<dyn PageFetcher>,
    classifier: EditionClassifier,
    options: PollOptions,
}

impl<S: Storage> Poller<S> {
    pub fn new(
        storage: Arc<Mutex<S>>,
        fetcher: Arc<dyn PageFetcher>,
        classifier: EditionClassifier,
        options: PollOptions,
    ) -> Self {
        Self {
            storage,
            fetcher,
            classifier,
            options,
        }
    }

    /// Builds a poller with the configured fetch strategy and classifier
    ///
    /// Fails with `PollerError::Config` when a strategy credential is absent.
    pub fn from_config(
        config: &Config,
        storage: Arc<Mutex<S>>,
        config_hash: impl Into<String>,
    ) -> Result<Self, PollerError> {
        let fetcher = build_fetcher(&config.fetch)?;
        let classifier = EditionClassifier::from_config(&config.classifier)?;
        Ok(Self::new(
            storage,
            fetcher,
            classifier,
            PollOptions::from_config(config, config_hash),
        ))
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one sweep over all tracked series
    ///
    /// # Returns
    ///
    /// * `Ok(PollSummary)` - The sweep finished (per-series errors are in the summary)
    /// * `Err(PollerError)` - The series list could not be loaded
    pub async fn run(&self) -> Result<PollSummary, PollerError> {
        let (series, run_id) = {
            let mut store = self.store();
            let series = store.list_series()?;
            let run_id = match store.create_run(&self.options.config_hash) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Failed to record poll run: {}", e);
                    None
                }
            };
            (series, run_id)
        };

        tracing::info!("Polling {} series", series.len());
        let start_time = std::time::Instant::now();
        let deadline = self.options.run_timeout.map(|t| Instant::now() + t);

        let mut summary = PollSummary {
            run_id,
            ..PollSummary::default()
        };

        {
            let slots = self.options.max_concurrent_series.max(1);
            let mut outcomes = stream::iter(series.iter().enumerate())
                .map(|(index, series)| self.poll_series(series, index >= slots))
                .buffer_unordered(slots);

            loop {
                let next = match deadline {
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline, outcomes.next()).await {
                            Ok(next) => next,
                            Err(_) => {
                                summary.timed_out = true;
                                break;
                            }
                        }
                    }
                    None => outcomes.next().await,
                };

                match next {
                    Some(outcome) => summary.record(outcome),
                    None => break,
                }
            }
        }

        summary.skipped = series.len() - summary.checked;
        if summary.timed_out {
            tracing::warn!(
                "Run timeout reached, {} series not polled this run",
                summary.skipped
            );
        }

        if let Some(run_id) = run_id {
            if let Err(e) = self.store().complete_run(run_id, summary.totals()) {
                tracing::warn!("Failed to record poll run completion: {}", e);
            }
        }

        tracing::info!(
            "Poll completed: {} checked, {} new editions, {} errors in {:?}",
            summary.checked,
            summary.inserted,
            summary.errors.len(),
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Processes one series inside its own span
    ///
    /// The request delay is taken before any work, so a run deadline that
    /// fires during it leaves the series untouched. Once the store has been
    /// updated the outcome is returned without another await.
    async fn poll_series(&self, series: &SeriesRecord, paced: bool) -> SeriesOutcome {
        if paced && !self.options.request_delay.is_zero() {
            tokio::time::sleep(self.options.request_delay).await;
        }

        let span = tracing::info_span!("series", series_id = series.id, series = %series.name);
        self.check_series(series).instrument(span).await
    }

    async fn check_series(&self, series: &SeriesRecord) -> SeriesOutcome {
        tracing::info!("Checking \"{}\"", series.name);

        let query = search_query(&series.name, &self.options.qualifier);
        let found = self
            .fetcher
            .fetch(&query)
            .await
            .map(|markup| self.classifier.classify(&markup));

        let mut errors = Vec::new();

        // Reconciliation and the poll timestamp share one critical section:
        // reconciliation is serialized across series and a cancelled run
        // never leaves one without the other.
        let inserted = {
            let mut store = self.store();

            let inserted = match found {
                Ok(candidate) => {
                    match &candidate {
                        Some(c) => tracing::info!("Found: {}", c.title),
                        None => tracing::info!("No collected edition found"),
                    }
                    match reconcile(&mut *store, series.id, candidate.as_ref(), Utc::now()) {
                        Ok(outcome) => outcome.inserted,
                        Err(e) => {
                            tracing::warn!("Store error: {}", e);
                            errors.push(e.to_string());
                            false
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Fetch failed: {}", e);
                    errors.push(e.to_string());
                    false
                }
            };

            if let Err(e) = store.touch_series(series.id, Utc::now()) {
                tracing::warn!("Failed to update last poll time: {}", e);
                errors.push(format!("Failed to update last poll time: {}", e));
            }

            inserted
        };

        SeriesOutcome {
            series_id: series.id,
            series: series.name.clone(),
            inserted,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }
}
