//! Retrieval through a headless-browser rendering service
//!
//! The service loads the page in a headless browser, waits for the network
//! to go idle, and returns the rendered HTML as the response body.

use crate::config::FetchStrategy;
use crate::fetch::{read_markup, transport_error, FetchSettings, Markup, PageFetcher};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

/// Fetches the search page rendered by a headless browser
pub struct RenderFetcher {
    client: Client,
    endpoint: Url,
    settings: FetchSettings,
}

impl RenderFetcher {
    /// `token` is sent as the `token` query parameter when present
    pub fn new(
        settings: FetchSettings,
        mut endpoint: Url,
        token: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            endpoint.query_pairs_mut().append_pair("token", &token);
        }

        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }
}

#[async_trait]
impl PageFetcher for RenderFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Render
    }

    async fn fetch(&self, query: &str) -> FetchResult<Markup> {
        let target = self.settings.page_url(query);
        tracing::debug!("Rendering {} in headless browser", target);

        let request = RenderRequest {
            url: target.as_str(),
            goto_options: GotoOptions {
                wait_until: "networkidle2",
                timeout: self.settings.timeout.as_millis() as u64,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        // 401/403 here come from the rendering service, not the catalog
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unavailable {
                reason: format!("rendering service rejected the token (HTTP {})", status.as_u16()),
            });
        }

        read_markup(response, &self.settings).await
    }
}
