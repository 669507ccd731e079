use crate::links::{extract_page_links, MAX_LINKS};
use pagelens_core::PageLink;
use serde::{Deserialize, Serialize};

/// Excerpt cap in characters. Callers rely on `text_excerpt.chars().count() <= this`.
pub const EXCERPT_MAX_CHARS: usize = 10_000;

/// Node kinds removed before any text is read.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "iframe", "noscript", "svg", "template",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCfg {
    pub max_chars: usize,
    pub max_links: usize,
    /// Also drop `<header>` regions (site chrome). On by default.
    pub strip_header: bool,
}

impl Default for SummaryCfg {
    fn default() -> Self {
        Self {
            max_chars: EXCERPT_MAX_CHARS,
            max_links: MAX_LINKS,
            strip_header: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageSummary {
    pub text_excerpt: String,
    pub text_truncated: bool,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview_image_url: Option<String>,
    pub favicon_url: Option<String>,
}

/// Elements whose boundaries separate words even when the markup has no whitespace.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol",
    "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

pub(crate) fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(el: html_scraper::ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            out.push_str(t);
        } else if let Some(child_el) = html_scraper::ElementRef::wrap(child) {
            let block = BLOCK_TAGS.contains(&child_el.value().name());
            if block {
                out.push(' ');
            }
            push_text(child_el, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// Rendered text of `el`: inline markup concatenates, block boundaries separate,
/// whitespace runs collapse.
pub(crate) fn visible_text(el: html_scraper::ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    norm_ws(&out)
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn truncate_to_chars(s: &str, max_chars: usize) -> (String, bool) {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (s[..byte_idx].to_string(), true),
        None => (s.to_string(), false),
    }
}

fn first_text(doc: &html_scraper::Html, selector: &str) -> Option<String> {
    let sel = html_scraper::Selector::parse(selector).ok()?;
    let el = doc.select(&sel).next()?;
    non_empty(visible_text(el))
}

fn first_attr(doc: &html_scraper::Html, selector: &str, attr: &str) -> Option<String> {
    let sel = html_scraper::Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Resolve `href` against the page URL; keep it verbatim if it cannot be resolved.
fn absolutize(href: String, base: Option<&url::Url>) -> String {
    match base.and_then(|b| b.join(&href).ok()) {
        Some(u) => u.to_string(),
        None => href,
    }
}

/// `<title>` text, falling back to `og:title`.
pub fn page_title(doc: &html_scraper::Html) -> Option<String> {
    first_text(doc, "head title")
        .or_else(|| first_attr(doc, r#"meta[property="og:title"]"#, "content"))
}

/// Title, description, preview image and favicon.
///
/// Image and favicon URLs are resolved against `base_url` when one is given.
pub fn extract_meta(doc: &html_scraper::Html, base_url: Option<&str>) -> PageMeta {
    let base = base_url.and_then(|u| url::Url::parse(u).ok());
    let description = first_attr(doc, r#"meta[name="description"]"#, "content")
        .or_else(|| first_attr(doc, r#"meta[property="og:description"]"#, "content"));
    let preview_image_url = first_attr(doc, r#"meta[property="og:image"]"#, "content")
        .map(|u| absolutize(u, base.as_ref()));
    let favicon_url = first_attr(doc, r#"link[rel="icon"]"#, "href")
        .or_else(|| first_attr(doc, r#"link[rel="shortcut icon"]"#, "href"))
        .map(|u| absolutize(u, base.as_ref()));

    PageMeta {
        title: page_title(doc),
        description,
        preview_image_url,
        favicon_url,
    }
}

fn noise_selector(cfg: &SummaryCfg) -> String {
    let mut tags: Vec<&str> = NOISE_TAGS.to_vec();
    if cfg.strip_header {
        tags.push("header");
    }
    tags.join(", ")
}

/// Bounded plain-text excerpt plus bounded link list.
///
/// Takes the document by value: noise nodes are detached from the tree first, so their
/// text can never reach the excerpt (or their anchors the link list).
pub fn summarize(mut doc: html_scraper::Html, cfg: &SummaryCfg) -> PageSummary {
    if let Ok(sel) = html_scraper::Selector::parse(&noise_selector(cfg)) {
        let noise: Vec<_> = doc.select(&sel).map(|el| el.id()).collect();
        for id in noise {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let text = match html_scraper::Selector::parse("body") {
        Ok(sel) => visible_text(doc.select(&sel).next().unwrap_or_else(|| doc.root_element())),
        Err(_) => String::new(),
    };
    let (text_excerpt, text_truncated) = truncate_to_chars(&text, cfg.max_chars);

    PageSummary {
        // The cut may land right after a collapsed space.
        text_excerpt: text_excerpt.trim_end().to_string(),
        text_truncated,
        links: extract_page_links(&doc, cfg.max_links),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(html: &str) -> html_scraper::Html {
        html_scraper::Html::parse_document(html)
    }

    #[test]
    fn script_text_never_leaks_into_excerpt() {
        let s = summarize(
            parse("<body><script>secret</script><p>visible text</p></body>"),
            &SummaryCfg::default(),
        );
        assert!(s.text_excerpt.contains("visible text"));
        assert!(!s.text_excerpt.contains("secret"));
    }

    #[test]
    fn inline_markup_does_not_split_words() {
        let s = summarize(
            parse(r#"<body><p>Hel<b>lo</b> world, <a href="/x">go</a>.</p></body>"#),
            &SummaryCfg::default(),
        );
        assert_eq!(s.text_excerpt, "Hello world, go.");
    }

    #[test]
    fn block_boundaries_separate_words() {
        let s = summarize(
            parse("<body><ul><li>one</li><li>two</li></ul><p>three</p>four<br>five</body>"),
            &SummaryCfg::default(),
        );
        assert_eq!(s.text_excerpt, "one two three four five");
    }

    #[test]
    fn noise_regions_are_removed() {
        let html = r#"<html><body>
          <header>SITE HEADER</header>
          <nav><a href="/menu">MENU</a></nav>
          <style>.x{color:red}</style>
          <noscript>ENABLE JS</noscript>
          <iframe src="/ad">AD</iframe>
          <svg><text>ICON</text></svg>
          <article><p>Real   content
             here.</p><a href="/more">More</a></article>
          <footer>FOOTER <a href="/legal">Legal</a></footer>
        </body></html>"#;
        let s = summarize(parse(html), &SummaryCfg::default());
        assert_eq!(s.text_excerpt, "Real content here. More");
        assert_eq!(s.links.len(), 1);
        assert_eq!(s.links[0].href, "/more");
    }

    #[test]
    fn header_is_kept_when_not_stripped() {
        let cfg = SummaryCfg {
            strip_header: false,
            ..SummaryCfg::default()
        };
        let s = summarize(
            parse("<body><header>Brand</header><p>Body</p></body>"),
            &cfg,
        );
        assert_eq!(s.text_excerpt, "Brand Body");
    }

    #[test]
    fn excerpt_is_truncated_on_char_boundary() {
        let body = format!("<body><p>{}</p></body>", "é".repeat(EXCERPT_MAX_CHARS + 50));
        let s = summarize(parse(&body), &SummaryCfg::default());
        assert!(s.text_truncated);
        assert_eq!(s.text_excerpt.chars().count(), EXCERPT_MAX_CHARS);
    }

    #[test]
    fn meta_prefers_title_tag_and_falls_back_to_open_graph() {
        let html = r#"<html><head>
          <title>  Page   Title </title>
          <meta property="og:title" content="OG Title">
          <meta property="og:description" content="OG desc">
          <meta property="og:image" content="/img/cover.png">
          <link rel="shortcut icon" href="/favicon.ico">
        </head><body></body></html>"#;
        let m = extract_meta(&parse(html), Some("https://example.com/a/b"));
        assert_eq!(m.title.as_deref(), Some("Page Title"));
        assert_eq!(m.description.as_deref(), Some("OG desc"));
        assert_eq!(
            m.preview_image_url.as_deref(),
            Some("https://example.com/img/cover.png")
        );
        assert_eq!(
            m.favicon_url.as_deref(),
            Some("https://example.com/favicon.ico")
        );

        let html = r#"<html><head>
          <meta property="og:title" content="Only OG">
          <meta name="description" content="Plain desc">
          <meta property="og:description" content="OG desc">
          <link rel="icon" href="https://cdn.example.net/i.png">
          <link rel="shortcut icon" href="/favicon.ico">
        </head></html>"#;
        let m = extract_meta(&parse(html), None);
        assert_eq!(m.title.as_deref(), Some("Only OG"));
        assert_eq!(m.description.as_deref(), Some("Plain desc"));
        assert_eq!(m.favicon_url.as_deref(), Some("https://cdn.example.net/i.png"));
        assert_eq!(m.preview_image_url, None);
    }

    #[test]
    fn empty_document_yields_empty_meta() {
        assert_eq!(extract_meta(&parse(""), None), PageMeta::default());
    }

    proptest! {
        #[test]
        fn excerpt_never_exceeds_cap(text in ".{0,400}", max_chars in 0usize..200) {
            let cfg = SummaryCfg { max_chars, ..SummaryCfg::default() };
            let html = format!("<body><p>{}</p></body>", text.replace('<', " "));
            let s = summarize(parse(&html), &cfg);
            prop_assert!(s.text_excerpt.chars().count() <= max_chars);
            prop_assert_eq!(s.text_excerpt.trim(), s.text_excerpt.as_str());
        }
    }
}
