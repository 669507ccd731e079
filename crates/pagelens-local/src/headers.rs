//! Browser-impersonation request headers.
//!
//! Everything here is pure: the only input besides the URL is the RNG used to pick a
//! user-agent, so tests can seed it.

use pagelens_core::{parse_target_url, RequestProfile, Result};
use rand::seq::SliceRandom;
use rand::Rng;

pub const DEFAULT_LOCALE: &str = "en-US,en;q=0.9";
pub const REFERER: &str = "https://www.google.com/";

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
// Must stay in sync with the decoders enabled on the reqwest client (gzip, brotli, deflate).
const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Client hints a Chromium build sends alongside its user-agent.
#[derive(Debug, Clone, Copy)]
pub struct ClientHints {
    pub sec_ch_ua: &'static str,
    pub platform: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    pub client_hints: Option<ClientHints>,
}

const CHROME_HINTS: &str =
    r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#;
const EDGE_HINTS: &str =
    r#""Chromium";v="124", "Microsoft Edge";v="124", "Not-A.Brand";v="99""#;

/// Desktop browser identities. Firefox and Safari do not send client hints.
pub static DESKTOP_IDENTITIES: &[BrowserIdentity] = &[
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        client_hints: Some(ClientHints {
            sec_ch_ua: CHROME_HINTS,
            platform: r#""Windows""#,
        }),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        client_hints: Some(ClientHints {
            sec_ch_ua: CHROME_HINTS,
            platform: r#""macOS""#,
        }),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        client_hints: Some(ClientHints {
            sec_ch_ua: CHROME_HINTS,
            platform: r#""Linux""#,
        }),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        client_hints: Some(ClientHints {
            sec_ch_ua: EDGE_HINTS,
            platform: r#""Windows""#,
        }),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        client_hints: None,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
        client_hints: None,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        client_hints: None,
    },
];

/// Pick a desktop identity. Falls back to the first pool entry, never to an empty string.
pub fn pick_identity<R: Rng + ?Sized>(rng: &mut R) -> BrowserIdentity {
    DESKTOP_IDENTITIES
        .choose(rng)
        .copied()
        .unwrap_or(DESKTOP_IDENTITIES[0])
}

/// Build headers for `url` with the thread RNG and the default locale.
pub fn synthesize_headers(url: &str) -> Result<RequestProfile> {
    synthesize_headers_with(url, DEFAULT_LOCALE, &mut rand::thread_rng())
}

/// Build a browser-like header set for `url`.
///
/// Fails with `InvalidUrl` / `InvalidInput` before anything touches the network.
pub fn synthesize_headers_with<R: Rng + ?Sized>(
    url: &str,
    locale: &str,
    rng: &mut R,
) -> Result<RequestProfile> {
    let parsed = parse_target_url(url)?;
    let host_name = parsed.host_str().unwrap_or_default();
    // `port()` is None for the scheme's default port, which is exactly when browsers omit it.
    let host = match parsed.port() {
        Some(p) => format!("{host_name}:{p}"),
        None => host_name.to_string(),
    };
    let origin = format!("{}://{}", parsed.scheme(), host);
    let locale = match locale.trim() {
        "" => DEFAULT_LOCALE,
        l => l,
    };

    let identity = pick_identity(rng);
    let mut headers: Vec<(String, String)> = Vec::with_capacity(16);
    let mut push = |k: &str, v: &str| headers.push((k.to_string(), v.to_string()));

    push("Host", &host);
    if let Some(hints) = identity.client_hints {
        push("Sec-CH-UA", hints.sec_ch_ua);
        push("Sec-CH-UA-Mobile", "?0");
        push("Sec-CH-UA-Platform", hints.platform);
    }
    push("Upgrade-Insecure-Requests", "1");
    push("User-Agent", identity.user_agent);
    push("Accept", ACCEPT);
    push("Sec-Fetch-Site", "cross-site");
    push("Sec-Fetch-Mode", "navigate");
    push("Sec-Fetch-User", "?1");
    push("Sec-Fetch-Dest", "document");
    push("Referer", REFERER);
    push("Origin", &origin);
    push("Accept-Encoding", ACCEPT_ENCODING);
    push("Accept-Language", locale);
    push("Cache-Control", "max-age=0");

    Ok(RequestProfile {
        url: parsed.to_string(),
        host,
        headers,
    })
}
