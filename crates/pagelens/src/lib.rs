//! Public facade crate for `pagelens`.
//!
//! Re-exports the backend-agnostic types/traits from `pagelens-core` and the two
//! pipeline entry points (`scrape_page`, `search_web`) from `pagelens-local`.

pub use pagelens_core::*;
pub use pagelens_local::{
    scrape_page, scrape_page_with, search_web, search_web_with, HttpFetcher, ScrapeOptions,
    SearchOptions, SummaryCfg,
};
