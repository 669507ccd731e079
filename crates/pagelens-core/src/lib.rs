use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("blocked: {0}")]
    Blocked(BlockReason),
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Stable snake_case label for the error class (used in JSON envelopes / exit codes).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => "invalid_input",
            Error::Blocked(_) => "blocked",
            Error::Transport(_) => "transport",
        }
    }

    /// True for failures raised before any network call was attempted.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a target was classified as blocking us.
///
/// 403/429 and content-level challenges are surfaced under the same `Error::Blocked`,
/// but stay distinguishable here for callers that treat rate limiting differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    Status { status: u16 },
    Challenge { trigger: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Status { status } => write!(f, "target responded with HTTP {status}"),
            BlockReason::Challenge { trigger } => {
                write!(f, "challenge page detected (trigger: {trigger:?})")
            }
        }
    }
}

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Per-call fetch limits. The core never reads these from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Upper bound for the whole attempt (connect + headers + body).
    pub timeout_ms: u64,
    /// Redirect hops followed before giving up.
    pub max_redirects: usize,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Validate a caller-supplied target URL.
///
/// Empty input is `InvalidInput`; anything that is not an absolute http(s) URL is `InvalidUrl`.
pub fn parse_target_url(raw: &str) -> Result<url::Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidInput("missing url".to_string()));
    }
    let url = url::Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidUrl(format!(
                "{raw}: unsupported scheme {other:?}"
            )))
        }
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(Error::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

/// Browser-like request headers for one target, built fresh per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProfile {
    pub url: String,
    pub host: String,
    /// Header name → value, in the order a browser would send them.
    pub headers: Vec<(String, String)>,
}

impl RequestProfile {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// True when the body hit `FetchOptions::max_bytes`.
    pub truncated: bool,
}

/// Result of exactly one fetch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Delivered(FetchedPage),
    Blocked { status: u16 },
    TransportError { message: String },
}

impl FetchOutcome {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchOutcome::Delivered(p) => Some(p.status),
            FetchOutcome::Blocked { status } => Some(*status),
            FetchOutcome::TransportError { .. } => None,
        }
    }

    /// Collapse into the pipeline error taxonomy.
    pub fn into_page(self) -> Result<FetchedPage> {
        match self {
            FetchOutcome::Delivered(p) => Ok(p),
            FetchOutcome::Blocked { status } => Err(Error::Blocked(BlockReason::Status { status })),
            FetchOutcome::TransportError { message } => Err(Error::Transport(message)),
        }
    }
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// One GET, no retries.
    ///
    /// `Err` is reserved for input that never reaches the network (bad URL);
    /// everything after the request leaves is reported through `FetchOutcome`.
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    /// `<script type="application/ld+json">`
    JsonLd,
    /// Next.js hydration payload (`script#__NEXT_DATA__`).
    NextData,
    /// Inline `window.__INITIAL_STATE__ = {...}` assignment.
    InitialState,
}

impl PayloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadSource::JsonLd => "json_ld",
            PayloadSource::NextData => "next_data",
            PayloadSource::InitialState => "initial_state",
        }
    }
}

/// One embedded JSON block, kept as the exact text that was parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub source: PayloadSource,
    pub data: Box<RawValue>,
}

impl StructuredPayload {
    /// Validate `text` as JSON and keep it verbatim (surrounding whitespace excluded).
    pub fn parse(source: PayloadSource, text: &str) -> serde_json::Result<Self> {
        let data: Box<RawValue> = serde_json::from_str(text.trim())?;
        Ok(Self { source, data })
    }

    pub fn json(&self) -> &str {
        self.data.get()
    }

    pub fn value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(self.data.get())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub url: String,
    pub final_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview_image_url: Option<String>,
    pub favicon_url: Option<String>,
    pub structured_payloads: Vec<StructuredPayload>,
    pub text_excerpt: String,
    pub text_truncated: bool,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeVerdict {
    pub is_challenge: bool,
    /// The trigger phrase that matched, when positive.
    pub trigger: Option<String>,
}

impl ChallengeVerdict {
    pub fn clear() -> Self {
        Self {
            is_challenge: false,
            trigger: None,
        }
    }

    pub fn matched(trigger: &str) -> Self {
        Self {
            is_challenge: true,
            trigger: Some(trigger.to_string()),
        }
    }
}
