//! Retrieval through a challenge-solving shim
//!
//! The shim drives a real browser through the site's bot challenge and
//! returns the resulting page inside a JSON envelope:
//!
//! ```text
//! POST <endpoint>  {"cmd": "request.get", "url": "...", "maxTimeout": 30000}
//! 200              {"status": "ok", "message": "", "solution": {"status": 200, "response": "<html>..."}}
//! ```

use crate::config::FetchStrategy;
use crate::fetch::{check_status, transport_error, FetchSettings, Markup, PageFetcher};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Extra time the client waits past `maxTimeout` so the shim can report
/// its own challenge timeout
const SHIM_RESPONSE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShimRequest<'a> {
    cmd: &'static str,
    url: &'a str,
    max_timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ShimResponse {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<ShimSolution>,
}

#[derive(Debug, Deserialize)]
struct ShimSolution {
    status: u16,
    #[serde(default)]
    response: String,
}

/// Fetches the search page via a challenge-solving shim
pub struct BypassFetcher {
    client: Client,
    endpoint: Url,
    settings: FetchSettings,
    client_timeout: Duration,
}

impl BypassFetcher {
    /// The shim gets `settings.timeout` as `maxTimeout`; the client itself
    /// waits `SHIM_RESPONSE_MARGIN` longer
    pub fn new(settings: FetchSettings, endpoint: Url) -> Result<Self, reqwest::Error> {
        let client_timeout = settings.timeout + SHIM_RESPONSE_MARGIN;
        let client = Client::builder().timeout(client_timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            settings,
            client_timeout,
        })
    }

    /// Interprets the shim envelope
    fn unwrap_envelope(&self, envelope: ShimResponse) -> FetchResult<Markup> {
        if envelope.status != "ok" {
            let reason = format!("bypass shim reported '{}': {}", envelope.status, envelope.message);
            return if envelope.message.to_lowercase().contains("challenge") {
                Err(FetchError::Blocked { reason })
            } else {
                Err(FetchError::Unavailable { reason })
            };
        }

        let solution = envelope.solution.ok_or_else(|| FetchError::Unavailable {
            reason: "bypass shim returned no solution".to_string(),
        })?;

        let status = StatusCode::from_u16(solution.status).map_err(|_| FetchError::Unavailable {
            reason: format!("bypass shim returned invalid status {}", solution.status),
        })?;
        check_status(status)?;

        self.settings.detector.accept(solution.response)
    }
}

#[async_trait]
impl PageFetcher for BypassFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Bypass
    }

    async fn fetch(&self, query: &str) -> FetchResult<Markup> {
        let target = self.settings.page_url(query);
        tracing::debug!("Fetching {} through bypass shim", target);

        let request = ShimRequest {
            cmd: "request.get",
            url: target.as_str(),
            max_timeout: self.settings.timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.client_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.client_timeout))?;

        // The shim answers errors with a 500 and a JSON envelope explaining why
        match serde_json::from_str::<ShimResponse>(&body) {
            Ok(envelope) => self.unwrap_envelope(envelope),
            Err(e) => {
                check_status(status)?;
                Err(FetchError::Unavailable {
                    reason: format!("unreadable bypass shim response: {}", e),
                })
            }
        }
    }
}
