//! Retrieval through a third-party rendering proxy
//!
//! `GET <endpoint>?api_key=<key>&url=<search url>&render=true` returns the
//! rendered page as the response body. The proxy relays the catalog's
//! refusals as 403/429, so the shared status mapping applies unchanged.

use crate::config::FetchStrategy;
use crate::fetch::{read_markup, transport_error, FetchSettings, Markup, PageFetcher};
use crate::FetchResult;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// Fetches the search page through a rendering proxy
pub struct ProxyFetcher {
    client: Client,
    endpoint: Url,
    api_key: String,
    settings: FetchSettings,
}

impl ProxyFetcher {
    pub fn new(
        settings: FetchSettings,
        endpoint: Url,
        api_key: String,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            settings,
        })
    }

    /// Builds the proxy request URL for a search query
    fn proxy_url(&self, query: &str) -> Url {
        let target = self.settings.page_url(query);
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", target.as_str())
            .append_pair("render", "true");
        url
    }
}

#[async_trait]
impl PageFetcher for ProxyFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Proxy
    }

    async fn fetch(&self, query: &str) -> FetchResult<Markup> {
        // The proxy URL carries the API key; only the target is logged
        tracing::debug!(
            "Fetching {} through rendering proxy",
            self.settings.page_url(query)
        );

        let response = self
            .client
            .get(self.proxy_url(query))
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        read_markup(response, &self.settings).await
    }
}
