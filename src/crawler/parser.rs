//! HTML parsing for link-extraction rules
//!
//! The engine never looks inside documents. This module is used by the
//! response rules that do: it pulls the title and outbound links from a page.

use scraper::{Html, Selector};
use url::Url;

use crate::url::resolve_link;

/// Title and links found on an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Absolute addresses of every followable link, in document order
    pub links: Vec<String>,
}

/// Parses an HTML document and extracts its title and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - everything `resolve_link` refuses (`tel:`, `mailto:`, `javascript:`,
///   `data:`, empty and fragment-only hrefs)
///
/// Relative links resolve against `<base href>` when the page declares one,
/// otherwise against `base_url`.
///
/// # Example
///
/// ```
/// use trawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let base = declared_base(&document, base_url).unwrap_or_else(|| base_url.clone());

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base),
    }
}

/// Extracts only the title of an HTML document
pub fn parse_title(html: &str) -> Option<String> {
    extract_title(&Html::parse_document(html))
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The first `<base href>`, resolved against the page address
fn declared_base(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    page_url.join(href.trim()).ok()
}

fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(base, h)) {
                links.push(link);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(base, h)) {
                links.push(link);
            }
        }
    }

    links
}
