use url::Url;

/// Schemes that never lead to a crawlable document
const SKIPPED_SCHEMES: &[&str] = &["tel:", "mailto:", "javascript:", "data:"];

/// Resolves an href found on a page to an absolute address
///
/// Returns None if the link should not be queued:
/// - empty or fragment-only hrefs
/// - `tel:`, `mailto:`, `javascript:` and `data:` links
/// - hrefs that cannot be resolved against the base
/// - anything that is not HTTP(S) after resolution
///
/// Already absolute links are kept as they are. The fragment is always
/// removed, since it never changes what the server returns.
///
/// # Arguments
///
/// * `base` - The URL of the page the link was found on
/// * `href` - The raw attribute value
///
/// # Examples
///
/// ```
/// use url::Url;
/// use trawl::url::resolve_link;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(resolve_link(&base, "intro").as_deref(), Some("https://example.com/docs/intro"));
/// assert_eq!(resolve_link(&base, "/about").as_deref(), Some("https://example.com/about"));
/// assert_eq!(resolve_link(&base, "tel:+123"), None);
/// ```
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);

    Some(resolved.to_string())
}
