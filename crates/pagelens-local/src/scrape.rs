//! The page pipeline: fetch, challenge check, then metadata, structured data and summary
//! combined into one [`ExtractionRecord`].

use crate::challenge::detect_challenge;
use crate::extract::{extract_meta, page_title, summarize, SummaryCfg};
use crate::structured::extract_structured;
use crate::HttpFetcher;
use pagelens_core::{
    parse_target_url, BlockReason, Error, ExtractionRecord, FetchOptions, PageFetcher, Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    #[serde(default)]
    pub fetch: FetchOptions,
    #[serde(default)]
    pub summary: SummaryCfg,
}

/// Fetch `url` with a fresh [`HttpFetcher`] and extract it.
pub async fn scrape_page(url: &str, opts: &ScrapeOptions) -> Result<ExtractionRecord> {
    scrape_page_with(&HttpFetcher::new(), url, opts).await
}

/// Same as [`scrape_page`], with a caller-supplied fetcher.
///
/// Markup is only parsed for delivered, non-challenge pages; blocked and failed fetches
/// return before any extraction runs.
pub async fn scrape_page_with<F: PageFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    opts: &ScrapeOptions,
) -> Result<ExtractionRecord> {
    let target = parse_target_url(url)?;
    let page = fetcher.fetch(target.as_str(), &opts.fetch).await?.into_page()?;

    let doc = html_scraper::Html::parse_document(&page.body);
    let title = page_title(&doc).unwrap_or_default();
    let verdict = detect_challenge(&page.body, &title);
    if let Some(trigger) = verdict.trigger {
        tracing::warn!(url = %page.final_url, trigger = %trigger, "challenge page");
        return Err(Error::Blocked(BlockReason::Challenge { trigger }));
    }

    let meta = extract_meta(&doc, Some(&page.final_url));
    let structured_payloads = extract_structured(&doc);
    let summary = summarize(doc, &opts.summary);

    tracing::debug!(
        url = %page.final_url,
        payloads = structured_payloads.len(),
        links = summary.links.len(),
        text_truncated = summary.text_truncated,
        "extracted"
    );

    Ok(ExtractionRecord {
        url: page.url,
        final_url: page.final_url,
        title: meta.title,
        description: meta.description,
        preview_image_url: meta.preview_image_url,
        favicon_url: meta.favicon_url,
        structured_payloads,
        text_excerpt: summary.text_excerpt,
        text_truncated: summary.text_truncated,
        links: summary.links,
    })
}
