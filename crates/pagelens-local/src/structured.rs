//! Embedded structured-data extraction.
//!
//! Each strategy is an independent [`Extractor`]; [`extract_structured`] concatenates their
//! output in a fixed order. A strategy never fails the page: payloads that do not parse are
//! logged at `debug` and dropped.

use once_cell::sync::Lazy;
use pagelens_core::{PayloadSource, StructuredPayload};
use regex::Regex;

/// Script bodies larger than this are not scanned for inline state.
pub const MAX_INLINE_SCRIPT_BYTES: usize = 1024 * 1024;

// Non-greedy up to the first `}` that closes the statement. Best effort: object literals that
// are not JSON (unquoted keys, trailing commas, functions) fail to parse and are skipped.
static INITIAL_STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(?:window\.)?__INITIAL_STATE__\s*=\s*(\{.*?\})\s*(?:;|</script>|$)")
        .expect("initial state pattern is valid")
});

pub trait Extractor: Send + Sync {
    fn source(&self) -> PayloadSource;
    fn extract(&self, doc: &html_scraper::Html) -> Vec<StructuredPayload>;
}

fn parse_candidate(source: PayloadSource, text: &str) -> Option<StructuredPayload> {
    match StructuredPayload::parse(source, text) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::debug!(source = source.as_str(), error = %e, "skipping unparsable payload");
            None
        }
    }
}

fn script_text(el: &html_scraper::ElementRef) -> String {
    el.text().collect::<String>()
}

/// Every `<script type="application/ld+json">` block (parameters such as `; charset=utf-8`
/// allowed), in document order.
pub struct JsonLd;

impl Extractor for JsonLd {
    fn source(&self) -> PayloadSource {
        PayloadSource::JsonLd
    }

    fn extract(&self, doc: &html_scraper::Html) -> Vec<StructuredPayload> {
        let sel = match html_scraper::Selector::parse(r#"script[type^="application/ld+json"]"#) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        doc.select(&sel)
            .filter_map(|el| parse_candidate(self.source(), &script_text(&el)))
            .collect()
    }
}

/// The Next.js hydration payload (`<script id="__NEXT_DATA__">`).
pub struct NextData;

impl Extractor for NextData {
    fn source(&self) -> PayloadSource {
        PayloadSource::NextData
    }

    fn extract(&self, doc: &html_scraper::Html) -> Vec<StructuredPayload> {
        let sel = match html_scraper::Selector::parse("script#__NEXT_DATA__") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        doc.select(&sel)
            .next()
            .and_then(|el| parse_candidate(self.source(), &script_text(&el)))
            .into_iter()
            .collect()
    }
}

/// `window.__INITIAL_STATE__ = {...};` inside any inline script. First parsable match wins.
pub struct InitialState;

impl Extractor for InitialState {
    fn source(&self) -> PayloadSource {
        PayloadSource::InitialState
    }

    fn extract(&self, doc: &html_scraper::Html) -> Vec<StructuredPayload> {
        let sel = match html_scraper::Selector::parse("script") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        for el in doc.select(&sel) {
            let body = script_text(&el);
            if body.len() > MAX_INLINE_SCRIPT_BYTES || !body.contains("__INITIAL_STATE__") {
                continue;
            }
            for cap in INITIAL_STATE_RE.captures_iter(&body) {
                let Some(m) = cap.get(1) else { continue };
                if let Some(p) = parse_candidate(self.source(), m.as_str()) {
                    return vec![p];
                }
            }
        }
        Vec::new()
    }
}

/// The strategies, in output order.
pub fn default_extractors() -> [&'static dyn Extractor; 3] {
    [&JsonLd, &NextData, &InitialState]
}

/// Run every strategy and concatenate the candidates. Never fails.
pub fn extract_structured(doc: &html_scraper::Html) -> Vec<StructuredPayload> {
    default_extractors()
        .iter()
        .flat_map(|x| x.extract(doc))
        .collect()
}
