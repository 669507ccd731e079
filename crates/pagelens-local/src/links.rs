use crate::extract::visible_text;
use pagelens_core::PageLink;

/// Upper bound on links kept per page.
pub const MAX_LINKS: usize = 20;

/// True for hrefs that never lead to another document: empty, in-page fragments,
/// and `javascript:` pseudo-links.
pub fn is_navigable_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    // Browsers ignore leading whitespace and scheme case: "  JavaScript:void(0)".
    let lc = href.to_ascii_lowercase();
    !lc.starts_with("javascript:")
}

/// Anchors in document order as (visible text, href), at most `max_links`.
///
/// The href is kept as written (relative links stay relative); only fragment and
/// script pseudo-links are dropped.
pub fn extract_page_links(doc: &html_scraper::Html, max_links: usize) -> Vec<PageLink> {
    if max_links == 0 {
        return Vec::new();
    }
    let sel = match html_scraper::Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut out: Vec<PageLink> = Vec::new();
    for el in doc.select(&sel) {
        if out.len() >= max_links {
            break;
        }
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if !is_navigable_href(href) {
            continue;
        }
        out.push(PageLink {
            text: visible_text(el),
            href: href.to_string(),
        });
    }

    out
}
