//! DuckDuckGo HTML results: fetch the no-JS results page and read the ranked result blocks.

use crate::challenge::detect_challenge;
use crate::extract::{page_title, visible_text};
use crate::HttpFetcher;
use pagelens_core::{BlockReason, Error, FetchOptions, PageFetcher, Result, SearchResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
pub const MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub fetch: FetchOptions,
    /// Results page; the query is appended as `?q=`.
    pub endpoint: String,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_results: MAX_RESULTS,
        }
    }
}

/// Results-page URL for `query`.
pub fn results_url(endpoint: &str, query: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}q={}", urlencoding::encode(query))
}

pub async fn search_web(query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
    search_web_with(&HttpFetcher::new(), query, opts).await
}

pub async fn search_web_with<F: PageFetcher + ?Sized>(
    fetcher: &F,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidInput("missing query".to_string()));
    }
    let url = results_url(&opts.endpoint, query);
    let page = fetcher.fetch(&url, &opts.fetch).await?.into_page()?;

    let doc = html_scraper::Html::parse_document(&page.body);
    // The results title echoes the query, so a page that carries result blocks is never a
    // challenge page, whatever the query says.
    if !has_result_blocks(&doc) {
        let title = page_title(&doc).unwrap_or_default();
        if let Some(trigger) = detect_challenge(&page.body, &title).trigger {
            tracing::warn!(query, trigger = %trigger, "search challenge page");
            return Err(Error::Blocked(BlockReason::Challenge { trigger }));
        }
    }

    let results = parse_results_doc(&doc, &page.final_url, opts.max_results.min(MAX_RESULTS));
    tracing::info!(query, results = results.len(), "search");
    Ok(results)
}

/// Parse a results page. `page_url` is used to resolve relative icon URLs.
pub fn parse_results(html: &str, page_url: &str, max_results: usize) -> Vec<SearchResult> {
    parse_results_doc(
        &html_scraper::Html::parse_document(html),
        page_url,
        max_results,
    )
}

fn sel(s: &str) -> Option<html_scraper::Selector> {
    html_scraper::Selector::parse(s).ok()
}

fn has_result_blocks(doc: &html_scraper::Html) -> bool {
    sel(".result").is_some_and(|s| doc.select(&s).next().is_some())
}

fn parse_results_doc(
    doc: &html_scraper::Html,
    page_url: &str,
    max_results: usize,
) -> Vec<SearchResult> {
    let (Some(result_sel), Some(title_sel), Some(snippet_sel), Some(icon_sel)) = (
        sel(".result"),
        sel(".result__a"),
        sel(".result__snippet"),
        sel(".result__icon__img"),
    ) else {
        return Vec::new();
    };
    let base = url::Url::parse(page_url).ok();

    let mut out = Vec::new();
    for block in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        let Some(anchor) = block.select(&title_sel).next() else {
            continue;
        };
        let title = visible_text(anchor);
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if title.is_empty() || href.is_empty() {
            continue;
        }
        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(visible_text)
            .unwrap_or_default();
        let icon = block
            .select(&icon_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| normalize_icon(s, base.as_ref()));

        out.push(SearchResult {
            title,
            link: normalize_link(href),
            snippet,
            icon,
        });
    }
    out
}

fn normalize_icon(src: &str, base: Option<&url::Url>) -> String {
    if let Some(rest) = src.strip_prefix("//") {
        return format!("https://{rest}");
    }
    match base.and_then(|b| b.join(src).ok()) {
        Some(u) => u.to_string(),
        None => src.to_string(),
    }
}

/// Protocol-relative hrefs get `https:`; `/l/?uddg=<target>` redirect wrappers are unwrapped.
pub fn normalize_link(href: &str) -> String {
    let abs = match href.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => href.to_string(),
    };
    let parsed = url::Url::parse(&abs)
        .or_else(|_| url::Url::parse("https://duckduckgo.com/").and_then(|b| b.join(&abs)));
    if let Ok(u) = parsed {
        if u.path() == "/l/" {
            if let Some((_, target)) = u.query_pairs().find(|(k, _)| k == "uddg") {
                if !target.is_empty() {
                    return target.into_owned();
                }
            }
        }
    }
    abs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{extract::Query, routing::get, Router};
    use std::collections::HashMap;

    fn block(i: usize) -> String {
        format!(
            r#"<div class="result results_links web-result">
  <div class="result__body">
    <h2 class="result__title"><a class="result__a" href="https://site{i}.example/">Result {i}</a></h2>
    <a class="result__snippet" href="https://site{i}.example/">Snippet <b>{i}</b></a>
    <img class="result__icon__img" src="//external-content.duckduckgo.com/ip3/site{i}.example.ico">
  </div>
</div>"#
        )
    }

    fn page(blocks: &str) -> String {
        format!(
            r#"<html><head><title>q at DuckDuckGo</title></head><body><div id="links">{blocks}</div></body></html>"#
        )
    }

    #[test]
    fn keeps_first_ten_in_document_order() {
        let blocks: String = (0..15).map(block).collect();
        let got = parse_results(&page(&blocks), DEFAULT_ENDPOINT, MAX_RESULTS);
        assert_eq!(got.len(), 10);
        for (i, r) in got.iter().enumerate() {
            assert_eq!(r.title, format!("Result {i}"));
            assert_eq!(r.link, format!("https://site{i}.example/"));
            assert_eq!(r.snippet, format!("Snippet {i}"));
        }
        assert_eq!(
            got[0].icon.as_deref(),
            Some("https://external-content.duckduckgo.com/ip3/site0.example.ico")
        );
    }

    #[test]
    fn incomplete_blocks_are_skipped() {
        let html = page(
            r#"
<div class="result"><a class="result__a" href="https://a.example/">A</a></div>
<div class="result"><a class="result__a" href="">No link</a></div>
<div class="result"><a class="result__a" href="https://c.example/">   </a></div>
<div class="result"><span>no anchor at all</span></div>
<div class="result"><a class="result__a" href="https://e.example/">E</a>
  <img class="result__icon__img" src="/assets/icon.png"></div>"#,
        );
        let got = parse_results(&html, "https://html.duckduckgo.com/html/?q=x", MAX_RESULTS);
        let titles: Vec<&str> = got.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "E"]);
        assert_eq!(got[0].snippet, "");
        assert_eq!(got[0].link, "https://a.example/");
        assert_eq!(got[0].icon, None);
        assert_eq!(
            got[1].icon.as_deref(),
            Some("https://html.duckduckgo.com/assets/icon.png")
        );
    }

    #[test]
    fn redirect_wrappers_are_unwrapped() {
        assert_eq!(
            normalize_link("//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2Flearn&rut=abc"),
            "https://www.rust-lang.org/learn"
        );
        assert_eq!(
            normalize_link("/l/?uddg=https%3A%2F%2Fdocs.rs%2F"),
            "https://docs.rs/"
        );
        assert_eq!(normalize_link("//example.com/x"), "https://example.com/x");
        assert_eq!(normalize_link("https://example.com/l/"), "https://example.com/l/");
    }

    #[test]
    fn results_url_encodes_query() {
        assert_eq!(
            results_url(DEFAULT_ENDPOINT, "rust async & tokio"),
            "https://html.duckduckgo.com/html/?q=rust%20async%20%26%20tokio"
        );
        assert_eq!(
            results_url("http://127.0.0.1:1/html/?kl=us-en", "x"),
            "http://127.0.0.1:1/html/?kl=us-en&q=x"
        );
    }

    #[tokio::test]
    async fn empty_query_is_invalid_input() {
        let err = search_web("   ", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn searches_against_local_results_page() {
        let app = Router::new().route(
            "/html/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let query = q.get("q").cloned().unwrap_or_default();
                let blocks: String = (0..3).map(block).collect();
                axum::response::Html(page(&blocks).replace("q at", &format!("{query} at")))
            }),
        );
        let addr = serve(app).await;
        let opts = SearchOptions {
            endpoint: format!("http://{addr}/html/"),
            ..SearchOptions::default()
        };
        let got = search_web("rust lang", &opts).await.unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[2].link, "https://site2.example/");
    }

    #[tokio::test]
    async fn query_with_trigger_phrase_still_returns_results() {
        let app = Router::new().route(
            "/html/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let query = q.get("q").cloned().unwrap_or_default();
                axum::response::Html(format!(
                    r#"<html><head><title>{query} at DuckDuckGo</title></head><body>{}</body></html>"#,
                    block(0)
                ))
            }),
        );
        let addr = serve(app).await;
        let opts = SearchOptions {
            endpoint: format!("http://{addr}/html/"),
            ..SearchOptions::default()
        };
        for query in ["cloudflare workers", "just a moment meaning", "captcha solver"] {
            let got = search_web(query, &opts).await.unwrap();
            assert_eq!(got.len(), 1, "query={query}");
            assert_eq!(got[0].title, "Result 0");
        }
    }

    #[tokio::test]
    async fn challenge_results_page_is_blocked() {
        let app = Router::new().route(
            "/html/",
            get(|| async {
                axum::response::Html(
                    "<html><head><title>DuckDuckGo</title></head><body>Unusual traffic from your network. Please complete the captcha.</body></html>",
                )
            }),
        );
        let addr = serve(app).await;
        let opts = SearchOptions {
            endpoint: format!("http://{addr}/html/"),
            ..SearchOptions::default()
        };
        let err = search_web("anything", &opts).await.unwrap_err();
        match err {
            Error::Blocked(BlockReason::Challenge { trigger }) => {
                assert_eq!(trigger, "unusual traffic")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
