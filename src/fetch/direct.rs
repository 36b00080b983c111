//! Direct retrieval with browser-like request headers

use crate::config::FetchStrategy;
use crate::fetch::{read_markup, transport_error, FetchSettings, Markup, PageFetcher};
use crate::FetchResult;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// User agent presented by the direct strategy
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches the search page with a single GET
pub struct DirectFetcher {
    client: Client,
    settings: FetchSettings,
}

impl DirectFetcher {
    /// Builds a fetcher whose client looks like a desktop browser
    pub fn new(settings: FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10).min(settings.timeout))
            .redirect(Policy::limited(5))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, settings })
    }
}

/// Headers a browser sends on a top-level navigation
///
/// Accept-Encoding is left to reqwest so responses are decompressed.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

#[async_trait]
impl PageFetcher for DirectFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Direct
    }

    async fn fetch(&self, query: &str) -> FetchResult<Markup> {
        let url = self.settings.page_url(query);
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        read_markup(response, &self.settings).await
    }
}
