//! Fetch strategy tests
//!
//! Each strategy is pointed at a wiremock server standing in for the
//! catalog or for the service it delegates to.

use std::time::Duration;
use tpb_poller::config::{FetchConfig, FetchStrategy};
use tpb_poller::fetch::{build_fetcher_with_settings, FetchSettings};
use tpb_poller::{FetchError, PageFetcher};
use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_PAGE: &str = r#"<html><body>
    <article><h2 class="post-title"><a href="https://getcomics.org/other-comics/saga-vol-10-tpb/">Saga Vol. 10 TPB</a></h2></article>
    </body></html>"#;

const CHALLENGE_PAGE: &str =
    "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>";

/// Per-request timeout used in place of the configured one
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Creates a fetch configuration for the given strategy
fn fetch_config(strategy: FetchStrategy, search_url: &str, endpoint: Option<String>) -> FetchConfig {
    FetchConfig {
        strategy,
        search_url: search_url.to_string(),
        qualifier: "tpb".to_string(),
        timeout_secs: 15,
        endpoint,
        api_key: match strategy {
            FetchStrategy::Proxy => Some("test-key".to_string()),
            _ => None,
        },
        challenge_markers: vec!["Just a moment".to_string(), "cf_challenge".to_string()],
    }
}

/// Address of a local port nothing is listening on
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{}/", addr)
}

/// Builds the configured strategy with a short request timeout
fn fetcher(config: &FetchConfig) -> std::sync::Arc<dyn PageFetcher> {
    let mut settings = FetchSettings::from_config(config).expect("Invalid fetch settings");
    settings.timeout = REQUEST_TIMEOUT;
    build_fetcher_with_settings(config, settings).expect("Failed to build fetcher")
}

// ===== direct =====

async fn direct_server(response: ResponseTemplate) -> (MockServer, FetchConfig) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("s", "Saga tpb"))
        .and(header_exists("user-agent"))
        .respond_with(response)
        .mount(&server)
        .await;

    let config = fetch_config(FetchStrategy::Direct, &format!("{}/", server.uri()), None);
    (server, config)
}

#[tokio::test]
async fn test_direct_returns_markup() {
    let (_server, config) = direct_server(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE)).await;

    let markup = fetcher(&config).fetch("Saga tpb").await.unwrap();

    assert!(markup.as_str().contains("Saga Vol. 10 TPB"));
}

#[tokio::test]
async fn test_direct_challenge_page_is_blocked() {
    let (_server, config) =
        direct_server(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked(), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_direct_forbidden_is_blocked() {
    let (_server, config) = direct_server(ResponseTemplate::new(403)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked());
}

#[tokio::test]
async fn test_direct_rate_limited_is_blocked() {
    let (_server, config) = direct_server(ResponseTemplate::new(429)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked());
}

#[tokio::test]
async fn test_direct_server_error_is_unavailable() {
    let (_server, config) = direct_server(ResponseTemplate::new(503)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Unavailable { .. }));
}

#[tokio::test]
async fn test_direct_slow_response_times_out() {
    let (_server, config) = direct_server(
        ResponseTemplate::new(200)
            .set_body_string(RESULTS_PAGE)
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Timeout {
            after: REQUEST_TIMEOUT
        }
    );
}

#[tokio::test]
async fn test_direct_connection_refused_is_network_error() {
    let config = fetch_config(FetchStrategy::Direct, &closed_port_url(), None);
    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Network(_)), "unexpected error: {:?}", err);
}

// ===== bypass =====

async fn bypass_server(response: ResponseTemplate) -> (MockServer, FetchConfig) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1"))
        .and(body_partial_json(serde_json::json!({
            "cmd": "request.get",
            "url": "https://getcomics.org/?s=Saga+tpb",
            "maxTimeout": 1000,
        })))
        .respond_with(response)
        .mount(&server)
        .await;

    let config = fetch_config(
        FetchStrategy::Bypass,
        "https://getcomics.org/",
        Some(format!("{}/v1", server.uri())),
    );
    (server, config)
}

fn shim_envelope(status: &str, message: &str, solution: Option<(u16, &str)>) -> serde_json::Value {
    let mut envelope = serde_json::json!({ "status": status, "message": message });
    if let Some((code, body)) = solution {
        envelope["solution"] = serde_json::json!({ "status": code, "response": body });
    }
    envelope
}

#[tokio::test]
async fn test_bypass_returns_solution_markup() {
    let (_server, config) = bypass_server(
        ResponseTemplate::new(200).set_body_json(shim_envelope("ok", "", Some((200, RESULTS_PAGE)))),
    )
    .await;

    let markup = fetcher(&config).fetch("Saga tpb").await.unwrap();

    assert!(markup.as_str().contains("saga-vol-10-tpb"));
}

#[tokio::test]
async fn test_bypass_unsolved_challenge_is_blocked() {
    let (_server, config) = bypass_server(ResponseTemplate::new(500).set_body_json(shim_envelope(
        "error",
        "Error: Error solving the challenge. Timeout after 1.0 seconds.",
        None,
    )))
    .await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked(), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_bypass_challenge_timeout_reported_late_is_blocked() {
    // The shim answers only after its own maxTimeout has elapsed
    let (_server, config) = bypass_server(
        ResponseTemplate::new(500)
            .set_body_json(shim_envelope(
                "error",
                "Error: Error solving the challenge. Timeout after 1.0 seconds.",
                None,
            ))
            .set_delay(Duration::from_millis(1500)),
    )
    .await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked(), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_bypass_solution_with_challenge_markup_is_blocked() {
    let (_server, config) = bypass_server(
        ResponseTemplate::new(200).set_body_json(shim_envelope("ok", "", Some((200, CHALLENGE_PAGE)))),
    )
    .await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked());
}

#[tokio::test]
async fn test_bypass_shim_down_is_unavailable() {
    let (_server, config) =
        bypass_server(ResponseTemplate::new(502).set_body_string("Bad Gateway")).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Unavailable { .. }), "unexpected error: {:?}", err);
}

// ===== render =====

async fn render_server(response: ResponseTemplate) -> (MockServer, FetchConfig) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .and(query_param("token", "render-token"))
        .and(body_partial_json(serde_json::json!({
            "url": "https://getcomics.org/?s=Saga+tpb",
        })))
        .respond_with(response)
        .mount(&server)
        .await;

    let mut config = fetch_config(
        FetchStrategy::Render,
        "https://getcomics.org/",
        Some(format!("{}/content", server.uri())),
    );
    config.api_key = Some("render-token".to_string());
    (server, config)
}

#[tokio::test]
async fn test_render_returns_rendered_markup() {
    let (_server, config) = render_server(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE)).await;

    let markup = fetcher(&config).fetch("Saga tpb").await.unwrap();

    assert!(markup.as_str().contains("Saga Vol. 10 TPB"));
}

#[tokio::test]
async fn test_render_challenge_page_is_blocked() {
    let (_server, config) =
        render_server(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(err.is_blocked());
}

#[tokio::test]
async fn test_render_rejected_token_is_unavailable() {
    let (_server, config) = render_server(ResponseTemplate::new(401)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Unavailable { .. }), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_render_slow_service_times_out() {
    let (_server, config) = render_server(
        ResponseTemplate::new(200)
            .set_body_string(RESULTS_PAGE)
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
}

// ===== proxy =====

async fn proxy_server(response: ResponseTemplate) -> (MockServer, FetchConfig) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("url", "https://getcomics.org/?s=Saga+tpb"))
        .and(query_param("render", "true"))
        .respond_with(response)
        .mount(&server)
        .await;

    let config = fetch_config(
        FetchStrategy::Proxy,
        "https://getcomics.org/",
        Some(format!("{}/", server.uri())),
    );
    (server, config)
}

#[tokio::test]
async fn test_proxy_returns_markup() {
    let (_server, config) = proxy_server(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE)).await;

    let markup = fetcher(&config).fetch("Saga tpb").await.unwrap();

    assert!(markup.as_str().contains("Saga Vol. 10 TPB"));
}

#[tokio::test]
async fn test_proxy_server_error_is_unavailable() {
    let (_server, config) = proxy_server(ResponseTemplate::new(500)).await;

    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(matches!(err, FetchError::Unavailable { .. }));
}

#[tokio::test]
async fn test_proxy_error_does_not_leak_api_key() {
    let config = fetch_config(
        FetchStrategy::Proxy,
        "https://getcomics.org/",
        Some(closed_port_url()),
    );
    let err = fetcher(&config).fetch("Saga tpb").await.unwrap_err();

    assert!(!err.to_string().contains("test-key"));
}
