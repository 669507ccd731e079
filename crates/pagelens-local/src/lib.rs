use pagelens_core::{FetchOptions, FetchOutcome, FetchedPage, PageFetcher, RequestProfile, Result};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub mod challenge;
pub mod extract;
pub mod headers;
pub mod links;
pub mod scrape;
pub mod search;
pub mod structured;

pub use extract::SummaryCfg;
pub use scrape::{scrape_page, scrape_page_with, ScrapeOptions};
pub use search::{search_web, search_web_with, SearchOptions};

/// How a response status is handled before any body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// < 500 and not a bot-protection code; includes 404 so callers can inspect error pages.
    Delivered,
    /// 403 / 429: bot-protection rejection. The body is not read.
    Blocked,
    /// >= 500.
    ServerError,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        403 | 429 => StatusClass::Blocked,
        s if s >= 500 => StatusClass::ServerError,
        _ => StatusClass::Delivered,
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        return "timeout".to_string();
    }
    if e.is_redirect() {
        return "too many redirects".to_string();
    }
    // reqwest's Display is only the outermost layer ("error sending request ..."); the
    // useful cause (DNS, refused, TLS) lives further down the source chain.
    let mut msg = e.to_string();
    let mut src = std::error::Error::source(e);
    while let Some(s) = src {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        src = s.source();
    }
    msg
}

fn transport(message: impl Into<String>) -> FetchOutcome {
    FetchOutcome::TransportError {
        message: message.into(),
    }
}

/// reqwest-backed [`PageFetcher`]: one GET with synthesized browser headers.
///
/// The HTTP client is built per call from that call's `FetchOptions`, so concurrent
/// fetches share nothing.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    locale: String,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_locale(headers::DEFAULT_LOCALE)
    }

    /// `Accept-Language` value sent with every request.
    pub fn with_locale(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
        }
    }

    fn build_client(opts: &FetchOptions) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(opts.max_redirects))
            .connect_timeout(opts.timeout().min(Duration::from_secs(10)))
            .timeout(opts.timeout())
            .build()
    }

    fn apply_headers(
        mut rb: reqwest::RequestBuilder,
        profile: &RequestProfile,
    ) -> reqwest::RequestBuilder {
        for (k, v) in &profile.headers {
            // The client derives Host per hop; a pinned value would follow redirects to other hosts.
            if k.eq_ignore_ascii_case("host") {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                rb = rb.header(name, value);
            }
        }
        rb
    }

    async fn fetch_once(&self, profile: &RequestProfile, opts: &FetchOptions) -> FetchOutcome {
        let client = match Self::build_client(opts) {
            Ok(c) => c,
            Err(e) => return transport(describe_transport_error(&e)),
        };
        let rb = Self::apply_headers(client.get(&profile.url), profile);
        let resp = match rb.send().await {
            Ok(r) => r,
            Err(e) => return transport(describe_transport_error(&e)),
        };

        let status = resp.status().as_u16();
        match classify_status(status) {
            StatusClass::Blocked => return FetchOutcome::Blocked { status },
            StatusClass::ServerError => {
                return transport(format!("server responded with HTTP {status}"))
            }
            StatusClass::Delivered => {}
        }

        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.as_str().to_string(), s.to_string());
            }
        }

        let max_bytes = usize::try_from(opts.max_bytes).unwrap_or(usize::MAX);
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => return transport(describe_transport_error(&e)),
            };
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        FetchOutcome::Delivered(FetchedPage {
            url: profile.url.clone(),
            final_url,
            status,
            content_type,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            truncated,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchOutcome> {
        let profile = headers::synthesize_headers_with(url, &self.locale, &mut rand::thread_rng())?;

        let t0 = Instant::now();
        // Outer deadline: covers client build, DNS and body streaming alike. Dropping the
        // inner future on expiry aborts the connection.
        let outcome = match tokio::time::timeout(opts.timeout(), self.fetch_once(&profile, opts)).await
        {
            Ok(o) => o,
            Err(_) => transport("timeout"),
        };
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        match &outcome {
            FetchOutcome::Delivered(p) => tracing::info!(
                url = %profile.url,
                status = p.status,
                bytes = p.body.len(),
                truncated = p.truncated,
                elapsed_ms,
                "fetched"
            ),
            FetchOutcome::Blocked { status } => {
                tracing::warn!(url = %profile.url, status, elapsed_ms, "blocked by target")
            }
            FetchOutcome::TransportError { message } => {
                tracing::warn!(url = %profile.url, error = %message, elapsed_ms, "fetch failed")
            }
        }
        Ok(outcome)
    }
}
