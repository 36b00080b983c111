//! Search page retrieval
//!
//! Every retrieval strategy implements [`PageFetcher`] and reports failures
//! with the same [`FetchError`] taxonomy. One strategy is chosen from the
//! configuration by [`build_fetcher`]; strategies are never chained.
//!
//! - `direct`: plain GET with browser-like headers
//! - `bypass`: request routed through a challenge-solving shim
//! - `render`: page rendered by a headless-browser service
//! - `proxy`: page fetched by a third-party rendering proxy

mod bypass;
mod challenge;
mod direct;
mod proxy;
mod render;

pub use bypass::BypassFetcher;
pub use challenge::ChallengeDetector;
pub use direct::DirectFetcher;
pub use proxy::ProxyFetcher;
pub use render::RenderFetcher;

use crate::config::{FetchConfig, FetchStrategy};
use crate::{ConfigError, FetchError, FetchResult, PollerError};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Raw markup of a search-results page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Retrieves the catalog's search-results page for a query
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Strategy this fetcher implements
    fn strategy(&self) -> FetchStrategy;

    /// Fetches the search page for `query`
    ///
    /// Returns `Blocked` for challenge pages and refusals, `Timeout` when the
    /// request outlives the configured timeout, `Network` for transport
    /// failures and `Unavailable` for any other non-success response.
    async fn fetch(&self, query: &str) -> FetchResult<Markup>;
}

/// Settings shared by every strategy
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Catalog search page; the query goes into the `s` parameter
    pub search_url: Url,
    /// Wall-clock bound for one retrieval
    pub timeout: Duration,
    pub detector: ChallengeDetector,
}

impl FetchSettings {
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            search_url: parse_url("search-url", &config.search_url)?,
            timeout: Duration::from_secs(config.timeout_secs),
            detector: ChallengeDetector::new(config.challenge_markers.clone()),
        })
    }

    /// Builds the catalog URL for a search query
    pub fn page_url(&self, query: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("s", query);
        url
    }
}

/// Builds the search query for a series: its name plus the qualifier term
pub fn search_query(series_name: &str, qualifier: &str) -> String {
    format!("{} {}", series_name.trim(), qualifier.trim())
        .trim()
        .to_string()
}

/// Builds the fetcher selected by `config.strategy`
///
/// # Returns
///
/// * `Ok(Arc<dyn PageFetcher>)` - The configured strategy
/// * `Err(PollerError)` - A required endpoint or credential is missing, or
///   the HTTP client could not be built
pub fn build_fetcher(config: &FetchConfig) -> Result<Arc<dyn PageFetcher>, PollerError> {
    build_fetcher_with_settings(config, FetchSettings::from_config(config)?)
}

/// Builds the fetcher selected by `config.strategy` around explicit settings
///
/// Endpoints and credentials still come from `config`; the search URL,
/// timeout and challenge markers come from `settings`.
pub fn build_fetcher_with_settings(
    config: &FetchConfig,
    settings: FetchSettings,
) -> Result<Arc<dyn PageFetcher>, PollerError> {
    let strategy = config.strategy.as_str();

    let endpoint = || -> Result<Url, ConfigError> {
        let raw = config
            .endpoint
            .as_deref()
            .ok_or(ConfigError::MissingCredential {
                strategy,
                field: "endpoint",
            })?;
        parse_url("endpoint", raw)
    };

    let fetcher: Arc<dyn PageFetcher> = match config.strategy {
        FetchStrategy::Direct => Arc::new(DirectFetcher::new(settings)?),
        FetchStrategy::Bypass => Arc::new(BypassFetcher::new(settings, endpoint()?)?),
        FetchStrategy::Render => Arc::new(RenderFetcher::new(
            settings,
            endpoint()?,
            config.api_key.clone(),
        )?),
        FetchStrategy::Proxy => {
            let api_key = config
                .api_key
                .clone()
                .ok_or(ConfigError::MissingCredential {
                    strategy,
                    field: "api-key",
                })?;
            Arc::new(ProxyFetcher::new(settings, endpoint()?, api_key)?)
        }
    };

    tracing::debug!("Using the {} fetch strategy", strategy);
    Ok(fetcher)
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, raw, e)))
}

/// Maps a non-success status to the fetch error taxonomy
///
/// 403 and 429 are how the catalog refuses bots; anything else means the
/// page could not be served.
pub(crate) fn check_status(status: StatusCode) -> FetchResult<()> {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::Blocked {
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    if !status.is_success() {
        return Err(FetchError::Unavailable {
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    Ok(())
}

/// Classifies a transport error
///
/// The URL is stripped so proxy API keys never reach the logs.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { after: timeout }
    } else if err.is_connect() {
        FetchError::Network(format!("Connection failed: {}", err.without_url()))
    } else {
        FetchError::Network(err.without_url().to_string())
    }
}

/// Reads a response whose body is the page markup
pub(crate) async fn read_markup(
    response: Response,
    settings: &FetchSettings,
) -> FetchResult<Markup> {
    check_status(response.status())?;

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, settings.timeout))?;

    let markup = settings.detector.accept(body)?;
    tracing::debug!("Got {} bytes of markup", markup.len());
    Ok(markup)
}
