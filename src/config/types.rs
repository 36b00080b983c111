use serde::Deserialize;

/// Main configuration structure for TPB-Poller
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Page retrieval strategy
///
/// Exactly one strategy is active per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Plain GET with browser-like headers
    Direct,
    /// Request routed through a challenge-solving shim
    Bypass,
    /// Page rendered by a headless-browser service
    Render,
    /// Page fetched and rendered by a third-party proxy
    Proxy,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Bypass => "bypass",
            Self::Render => "render",
            Self::Proxy => "proxy",
        }
    }
}

/// Catalog retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Which retrieval strategy to use
    pub strategy: FetchStrategy,

    /// Catalog search page; the query is passed as the `s` parameter
    #[serde(rename = "search-url", default = "default_search_url")]
    pub search_url: String,

    /// Term appended to every series name to bias results toward collected editions
    #[serde(default = "default_qualifier")]
    pub qualifier: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shim, rendering service or proxy endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key or token for the endpoint
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Substrings that identify a bot-challenge page
    #[serde(rename = "challenge-markers", default = "default_challenge_markers")]
    pub challenge_markers: Vec<String>,
}

/// Collected-edition heuristic
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Case-insensitive patterns; a title matching any of them qualifies
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Case-insensitive pattern that marks a single issue and overrides keywords
    #[serde(rename = "single-issue", default = "default_single_issue")]
    pub single_issue: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            single_issue: default_single_issue(),
        }
    }
}

/// Persistent store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Poll run behavior
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Number of series processed at the same time
    #[serde(rename = "max-concurrent-series", default = "default_max_concurrent")]
    pub max_concurrent_series: usize,

    /// Pause after each series before its slot picks up the next one (milliseconds)
    #[serde(rename = "request-delay-ms", default)]
    pub request_delay_ms: u64,

    /// Abort the remaining series after this many seconds
    #[serde(rename = "run-timeout-secs", default)]
    pub run_timeout_secs: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_concurrent_series: default_max_concurrent(),
            request_delay_ms: 0,
            run_timeout_secs: None,
        }
    }
}

fn default_search_url() -> String {
    "https://getcomics.org/".to_string()
}

fn default_qualifier() -> String {
    "tpb".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    1
}

pub(crate) fn default_challenge_markers() -> Vec<String> {
    vec![
        "Just a moment".to_string(),
        "cf_challenge".to_string(),
        "cf-browser-verification".to_string(),
        "Attention Required! | Cloudflare".to_string(),
    ]
}

pub(crate) fn default_keywords() -> Vec<String> {
    [
        r"\btpb\b",
        r"trade\s*paperback",
        r"\bvol(?:ume)?\.?\s*\d+",
        r"hardcover",
        r"deluxe",
        r"collection",
        r"omnibus",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub(crate) fn default_single_issue() -> String {
    r"(?:^|\s)#\d+\s*\(".to_string()
}
